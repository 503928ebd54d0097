use crate::application::catalog::{CategoryListing, PatternDetail};
use crate::application::error::{ErrorReport, HttpError};
use crate::domain::locale::Locale;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found(chrome.text);
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Interface labels for one locale.
pub struct UiText {
    pub site_title: &'static str,
    pub nav_home: &'static str,
    pub nav_patterns: &'static str,
    pub home_intro: &'static str,
    pub empty_catalogue: &'static str,
    pub empty_category: &'static str,
    pub category_label: &'static str,
    pub toc_heading: &'static str,
    pub related_heading: &'static str,
    pub pending_translation: &'static str,
    pub content_missing: &'static str,
    pub not_found_title: &'static str,
    pub not_found_message: &'static str,
    pub back_home: &'static str,
}

static ZH_TEXT: UiText = UiText {
    site_title: "设计模式手册",
    nav_home: "首页",
    nav_patterns: "全部模式",
    home_intro: "按类别浏览常见的软件设计模式。",
    empty_catalogue: "暂无已发布的模式。",
    empty_category: "该类别下暂无已发布的模式。",
    category_label: "类别",
    toc_heading: "目录",
    related_heading: "相关模式",
    pending_translation: "此内容尚未翻译，以下显示的是其他语言版本。",
    content_missing: "该模式的正文尚在撰写中。",
    not_found_title: "页面不存在",
    not_found_message: "你访问的页面不存在，请返回首页继续浏览。",
    back_home: "返回首页",
};

static EN_TEXT: UiText = UiText {
    site_title: "Pattern Book",
    nav_home: "Home",
    nav_patterns: "All patterns",
    home_intro: "Browse common software design patterns by category.",
    empty_catalogue: "No patterns have been published yet.",
    empty_category: "No published patterns in this category yet.",
    category_label: "Category",
    toc_heading: "Contents",
    related_heading: "Related patterns",
    pending_translation: "This content has not been translated yet; another language is shown below.",
    content_missing: "The write-up for this pattern is still being prepared.",
    not_found_title: "Page Not Found",
    not_found_message: "The page you requested does not exist. Try returning to the homepage to continue exploring.",
    back_home: "Back to home",
};

impl UiText {
    pub fn for_locale(locale: Locale) -> &'static UiText {
        match locale {
            Locale::Zh => &ZH_TEXT,
            Locale::En => &EN_TEXT,
        }
    }
}

#[derive(Clone)]
pub struct LocaleLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

/// Per-request page frame: active locale, labels and switch links.
#[derive(Clone)]
pub struct LayoutChrome {
    pub html_lang: &'static str,
    pub text: &'static UiText,
    pub page_title: String,
    pub locale_links: Vec<LocaleLink>,
    pub include_mermaid: bool,
}

impl LayoutChrome {
    pub fn new(locale: Locale) -> Self {
        let text = UiText::for_locale(locale);
        let locale_links = Locale::ALL
            .iter()
            .map(|candidate| LocaleLink {
                label: candidate.native_name(),
                href: format!("/change-locale/{candidate}"),
                active: *candidate == locale,
            })
            .collect();

        Self {
            html_lang: locale.html_lang(),
            text,
            page_title: text.site_title.to_string(),
            locale_links,
            include_mermaid: false,
        }
    }

    pub fn with_title(self, title: &str) -> Self {
        Self {
            page_title: format!("{title} · {}", self.text.site_title),
            ..self
        }
    }

    pub fn with_mermaid(self, include_mermaid: bool) -> Self {
        Self {
            include_mermaid,
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub chrome: LayoutChrome,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self { chrome, content }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<Vec<CategoryListing>>,
}

#[derive(Template)]
#[template(path = "patterns.html")]
pub struct PatternIndexTemplate {
    pub view: LayoutContext<Vec<CategoryListing>>,
}

#[derive(Template)]
#[template(path = "pattern.html")]
pub struct PatternTemplate {
    pub view: LayoutContext<PatternDetail>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found(text: &UiText) -> Self {
        Self {
            title: text.not_found_title.to_string(),
            message: text.not_found_message.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_marks_active_locale() {
        let chrome = LayoutChrome::new(Locale::En);
        assert_eq!(chrome.html_lang, "en");
        let active: Vec<_> = chrome
            .locale_links
            .iter()
            .filter(|link| link.active)
            .map(|link| link.href.as_str())
            .collect();
        assert_eq!(active, vec!["/change-locale/en"]);
    }

    #[test]
    fn not_found_page_renders_localized_copy() {
        let response = render_not_found_response(LayoutChrome::new(Locale::Zh));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
