use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts, Path},
    http::{
        HeaderMap, StatusCode,
        header::{HOST, REFERER},
        request::Parts,
    },
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use url::Url;

use crate::application::error::HttpError;
use crate::domain::locale::Locale;

pub const LOCALE_COOKIE: &str = "locale";
const LOCALE_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Fallback used when the request carries no usable `locale` cookie.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLocale(pub Locale);

/// The locale a request is served in: the cookie when valid, else the default.
#[derive(Debug, Clone, Copy)]
pub struct RequestLocale(pub Locale);

impl<S> FromRequestParts<S> for RequestLocale
where
    S: Send + Sync,
    DefaultLocale: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let DefaultLocale(default) = DefaultLocale::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self(resolve_locale(&jar, default)))
    }
}

pub(crate) fn resolve_locale(jar: &CookieJar, default: Locale) -> Locale {
    jar.get(LOCALE_COOKIE)
        .and_then(|cookie| cookie.value().parse().ok())
        .unwrap_or(default)
}

pub(super) async fn change_locale(
    jar: CookieJar,
    headers: HeaderMap,
    Path(raw): Path<String>,
) -> Response {
    let locale: Locale = match raw.parse() {
        Ok(locale) => locale,
        Err(_) => {
            return HttpError::new(
                "infra::http::locale::change_locale",
                StatusCode::BAD_REQUEST,
                "Unsupported locale",
                format!("unsupported locale `{raw}`"),
            )
            .into_response();
        }
    };

    let cookie = Cookie::build((LOCALE_COOKIE, locale.as_str()))
        .path("/")
        .max_age(Duration::days(LOCALE_COOKIE_MAX_AGE_DAYS))
        .same_site(SameSite::Lax)
        .http_only(true);

    let target = same_origin_return_path(&headers).unwrap_or_else(|| "/".to_string());
    (jar.add(cookie), Redirect::to(&target)).into_response()
}

/// Path and query of the `Referer` when it points back at this host.
fn same_origin_return_path(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(REFERER)?.to_str().ok()?;
    let host = headers.get(HOST)?.to_str().ok()?;
    let url = Url::parse(referer).ok()?;

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let authority = match (url.host_str(), url.port()) {
        (Some(name), Some(port)) => format!("{name}:{port}"),
        (Some(name), None) => name.to_string(),
        (None, _) => return None,
    };
    if !authority.eq_ignore_ascii_case(host) {
        return None;
    }

    let path = url.path();
    // "//host" would be read as a protocol-relative location.
    if !path.starts_with('/') || path.starts_with("//") {
        return None;
    }

    Some(match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(referer: &str, host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(referer).expect("referer"));
        headers.insert(HOST, HeaderValue::from_str(host).expect("host"));
        headers
    }

    #[test]
    fn same_origin_referer_keeps_path_and_query() {
        let headers = headers("http://localhost:3000/patterns/singleton?x=1", "localhost:3000");
        assert_eq!(
            same_origin_return_path(&headers).as_deref(),
            Some("/patterns/singleton?x=1")
        );
    }

    #[test]
    fn foreign_referer_is_ignored() {
        let headers = headers("https://evil.example/phish", "localhost:3000");
        assert_eq!(same_origin_return_path(&headers), None);
    }

    #[test]
    fn protocol_relative_path_is_ignored() {
        let headers = headers("http://localhost:3000//evil.example/", "localhost:3000");
        assert_eq!(same_origin_return_path(&headers), None);
    }

    #[test]
    fn missing_or_invalid_cookie_falls_back_to_default() {
        let jar = CookieJar::new();
        assert_eq!(resolve_locale(&jar, Locale::Zh), Locale::Zh);

        let jar = CookieJar::new().add(Cookie::new(LOCALE_COOKIE, "fr"));
        assert_eq!(resolve_locale(&jar, Locale::En), Locale::En);

        let jar = CookieJar::new().add(Cookie::new(LOCALE_COOKIE, "en"));
        assert_eq!(resolve_locale(&jar, Locale::Zh), Locale::En);
    }
}
