use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str};
use url::Url;

use crate::domain::toc::Heading;

/// Assign heading ids in document order and mark external links.
pub(crate) fn post_process(html: &str, headings: &[Heading]) -> Result<String, String> {
    let anchors = Rc::new(
        headings
            .iter()
            .map(|heading| heading.anchor.clone())
            .collect::<Vec<_>>(),
    );
    let index = Rc::new(RefCell::new(0usize));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("h1, h2, h3, h4, h5, h6", {
                    let anchors = Rc::clone(&anchors);
                    let index = Rc::clone(&index);
                    move |el| {
                        let mut idx = index.borrow_mut();
                        if let Some(anchor) = anchors.get(*idx) {
                            el.set_attribute("id", anchor)?;
                        }
                        *idx += 1;
                        Ok(())
                    }
                }),
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href")
                        && is_external_http_url(&href)
                    {
                        let rel = merge_rel(el.get_attribute("rel"), &["noopener", "noreferrer"]);
                        el.set_attribute("rel", &rel)?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| err.to_string())
}

fn is_external_http_url(value: &str) -> bool {
    if value.starts_with("//") {
        return true;
    }
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn merge_rel(existing: Option<String>, required: &[&str]) -> String {
    let mut tokens: BTreeSet<String> = existing
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    for &token in required {
        tokens.insert(token.to_string());
    }
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}
