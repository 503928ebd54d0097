use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Path, State},
    http::{HeaderValue, StatusCode, header::LOCATION},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::catalog::{CatalogError, CatalogService},
    domain::locale::Locale,
    presentation::views::{
        IndexTemplate, LayoutChrome, LayoutContext, PatternIndexTemplate, PatternTemplate,
        render_not_found_response, render_template_response,
    },
};

use super::{
    HealthProbe, db_health_response,
    locale::{DefaultLocale, RequestLocale, change_locale},
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

#[derive(Clone)]
pub struct PublicState {
    pub catalog: Arc<CatalogService>,
    pub health: Arc<dyn HealthProbe>,
    pub default_locale: Locale,
}

impl FromRef<PublicState> for DefaultLocale {
    fn from_ref(state: &PublicState) -> Self {
        DefaultLocale(state.default_locale)
    }
}

pub fn build_public_router(state: PublicState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/patterns", get(pattern_index))
        .route("/patterns/{slug}", get(pattern_detail))
        .route("/categories", get(category_index))
        .route("/categories/{slug}", get(category_detail))
        .route("/change-locale/{locale}", get(change_locale))
        .route("/_health/db", get(public_health))
        .fallback(fallback_router)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn home(State(state): State<PublicState>, RequestLocale(locale): RequestLocale) -> Response {
    match state.catalog.home(locale).await {
        Ok(categories) => {
            let view = LayoutContext::new(LayoutChrome::new(locale), categories);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => catalog_error_to_response("infra::http::public::home", err, locale),
    }
}

async fn pattern_index(
    State(state): State<PublicState>,
    RequestLocale(locale): RequestLocale,
) -> Response {
    match state.catalog.pattern_index(locale).await {
        Ok(categories) => {
            let chrome = LayoutChrome::new(locale);
            let title = chrome.text.nav_patterns;
            let view = LayoutContext::new(chrome.with_title(title), categories);
            render_template_response(PatternIndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => catalog_error_to_response("infra::http::public::pattern_index", err, locale),
    }
}

async fn pattern_detail(
    State(state): State<PublicState>,
    RequestLocale(locale): RequestLocale,
    Path(slug): Path<String>,
) -> Response {
    match state.catalog.pattern_detail(&slug, locale).await {
        Ok(detail) => {
            let chrome = LayoutChrome::new(locale)
                .with_title(&detail.name)
                .with_mermaid(detail.body.contains_mermaid);
            let view = LayoutContext::new(chrome, detail);
            render_template_response(PatternTemplate { view }, StatusCode::OK)
        }
        Err(err) => catalog_error_to_response("infra::http::public::pattern_detail", err, locale),
    }
}

async fn category_index() -> Response {
    moved_permanently("/patterns")
}

async fn category_detail(
    State(state): State<PublicState>,
    RequestLocale(locale): RequestLocale,
    Path(slug): Path<String>,
) -> Response {
    match state.catalog.category_exists(&slug).await {
        Ok(true) => moved_permanently(&format!("/patterns#{slug}")),
        Ok(false) => render_not_found_response(LayoutChrome::new(locale)),
        Err(err) => catalog_error_to_response("infra::http::public::category_detail", err, locale),
    }
}

async fn public_health(State(state): State<PublicState>) -> Response {
    db_health_response(state.health.as_ref()).await
}

async fn fallback_router(RequestLocale(locale): RequestLocale) -> Response {
    render_not_found_response(LayoutChrome::new(locale))
}

// axum's `Redirect::permanent` answers 308; old category links expect 301.
fn moved_permanently(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

fn catalog_error_to_response(source: &'static str, err: CatalogError, locale: Locale) -> Response {
    match err {
        CatalogError::NotFound => render_not_found_response(LayoutChrome::new(locale)),
        CatalogError::Repo(err) => repo_error_to_http(source, err).into_response(),
    }
}
