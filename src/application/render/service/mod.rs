mod config;
mod highlight;
mod mermaid;
mod postprocess;
mod rewrite;

use std::sync::Arc;

use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use once_cell::sync::Lazy;
use syntect::{html::ClassStyle, parsing::SyntaxSet};
use tracing::warn;

use crate::application::render::types::{RenderOutput, RenderService};
use crate::domain::toc::Heading;

use self::config::{build_sanitizer, default_options};
use postprocess::post_process;
use rewrite::{RewriteOutcome, collect_headings, document_key, rewrite_ast};

/// Default Comrak-based rendering pipeline with Syntect highlighting and Ammonia sanitisation.
pub struct ComrakRenderService {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
    sanitizer: ammonia::Builder<'static>,
}

impl ComrakRenderService {
    /// Construct a renderer with GFM tables, task lists, autolinks and
    /// strikethrough enabled and highlighting configured to emit `syntax-`
    /// prefixed CSS classes.
    fn new() -> Self {
        Self {
            options: default_options(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
            sanitizer: build_sanitizer(),
        }
    }

    /// Heading outline of `markdown`, using the same anchors `render` assigns.
    pub fn headings(&self, markdown: &str) -> Vec<Heading> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        collect_headings(root)
    }
}

static RENDER_SERVICE: Lazy<Arc<ComrakRenderService>> =
    Lazy::new(|| Arc::new(ComrakRenderService::new()));

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<ComrakRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

/// Render markdown to sanitised HTML with the shared renderer.
pub fn render_markdown(markdown: &str) -> String {
    RENDER_SERVICE.render(markdown).html
}

/// Heading outline of `markdown` with the shared renderer.
pub fn extract_headings(markdown: &str) -> Vec<Heading> {
    RENDER_SERVICE.headings(markdown)
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService for ComrakRenderService {
    fn render(&self, markdown: &str) -> RenderOutput {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let key = document_key(markdown);
        let outcome = rewrite_ast(root, &self.syntax_set, &self.class_style, &key);

        let rendered = render_html_stage(root, &self.options);
        let sanitized = self.sanitizer.clean(&rendered).to_string();
        let processed = post_process_stage(sanitized, &outcome.headings);
        let html = restore_stage(processed, &outcome);

        RenderOutput {
            html,
            headings: outcome.headings,
            contains_code: outcome.contains_code,
            contains_mermaid: outcome.contains_mermaid,
        }
    }
}

fn render_html_stage<'a>(root: &'a AstNode<'a>, options: &comrak::Options<'static>) -> String {
    let mut html = String::new();
    if let Err(err) = format_html(root, options, &mut html) {
        warn!(
            target = "application::render",
            error = %err,
            "HTML formatting reported an error"
        );
    }
    html
}

fn post_process_stage(html: String, headings: &[Heading]) -> String {
    match post_process(&html, headings) {
        Ok(processed) => processed,
        Err(err) => {
            warn!(
                target = "application::render",
                error = %err,
                "HTML post-processing failed; serving sanitised output"
            );
            html
        }
    }
}

fn restore_stage(html: String, outcome: &RewriteOutcome) -> String {
    outcome
        .mermaid_fragments
        .iter()
        .fold(html, |acc, fragment| {
            acc.replace(&fragment.placeholder_html(), &fragment.html)
        })
}
