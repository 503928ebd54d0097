use comrak::nodes::{AstNode, NodeValue};
use sha2::{Digest, Sha256};
use syntect::html::ClassStyle;
use syntect::parsing::SyntaxSet;

use crate::domain::{slug::AnchorSlugger, toc::Heading};

use super::{highlight, mermaid};

#[derive(Default)]
pub(crate) struct RewriteOutcome {
    pub(crate) contains_code: bool,
    pub(crate) contains_mermaid: bool,
    pub(crate) headings: Vec<Heading>,
    pub(crate) mermaid_fragments: Vec<MermaidFragment>,
}

/// A diagram container held back from sanitisation and swapped in last.
#[derive(Clone)]
pub(crate) struct MermaidFragment {
    pub(crate) placeholder: String,
    pub(crate) html: String,
}

impl MermaidFragment {
    /// The markup left in the document until restoration.
    pub(crate) fn placeholder_html(&self) -> String {
        format!("<div>{}</div>", self.placeholder)
    }
}

/// Replace fenced code blocks with highlighted HTML or Mermaid placeholders
/// and collect the heading outline.
///
/// `document_key` seeds the placeholder tokens so they depend only on the
/// input, keeping output byte-identical across runs.
pub(crate) fn rewrite_ast<'a>(
    root: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
    document_key: &str,
) -> RewriteOutcome {
    let mut walker = RewriteWalker::new(Some((syntax_set, class_style)), document_key);
    walker.visit_nodes(root);
    walker.outcome
}

/// Heading outline only; leaves the tree untouched.
pub(crate) fn collect_headings<'a>(root: &'a AstNode<'a>) -> Vec<Heading> {
    let mut walker = RewriteWalker::new(None, "");
    walker.visit_nodes(root);
    walker.outcome.headings
}

/// Placeholder prefix derived from the markdown source.
pub(crate) fn document_key(markdown: &str) -> String {
    let digest = Sha256::digest(markdown.as_bytes());
    hex::encode(&digest[..8])
}

struct RewriteWalker<'a> {
    highlighter: Option<(&'a SyntaxSet, &'a ClassStyle)>,
    document_key: &'a str,
    outcome: RewriteOutcome,
    slugger: AnchorSlugger,
}

impl<'a> RewriteWalker<'a> {
    fn new(highlighter: Option<(&'a SyntaxSet, &'a ClassStyle)>, document_key: &'a str) -> Self {
        Self {
            highlighter,
            document_key,
            outcome: RewriteOutcome::default(),
            slugger: AnchorSlugger::new(),
        }
    }

    fn visit_nodes(&mut self, node: &AstNode<'_>) {
        if let Some(level) = heading_level(node) {
            let text = collect_inline_text(node);
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
            let anchor = self.slugger.anchor_for(&normalized);
            self.outcome.headings.push(Heading {
                level,
                text: normalized,
                anchor,
            });
        }

        if let Some((syntax_set, class_style)) = self.highlighter
            && let Some((info, literal)) = extract_code_block(node)
        {
            let mut segments = info.split_whitespace();
            let language = segments.next().map(str::to_string);
            let meta = segments.collect::<Vec<_>>().join(" ");

            let html = if language.as_deref() == Some("mermaid") {
                self.mermaid_placeholder(&literal)
            } else {
                self.outcome.contains_code = true;
                let meta_ref = (!meta.is_empty()).then_some(meta.as_str());
                highlight::highlight_code(
                    language.as_deref(),
                    meta_ref,
                    &literal,
                    syntax_set,
                    class_style,
                )
            };

            let mut data = node.data.borrow_mut();
            data.value = NodeValue::Raw(html);
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.visit_nodes(next);
            child = next.next_sibling();
        }
    }

    fn mermaid_placeholder(&mut self, literal: &str) -> String {
        let fragment = MermaidFragment {
            placeholder: format!(
                "pb-mermaid-{}-{}",
                self.document_key,
                self.outcome.mermaid_fragments.len()
            ),
            html: mermaid::mermaid_container(literal),
        };
        let placeholder_html = fragment.placeholder_html();
        self.outcome.mermaid_fragments.push(fragment);
        self.outcome.contains_mermaid = true;
        placeholder_html
    }
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::HtmlInline(raw) => buffer.push_str(raw),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use comrak::{Arena, format_html, parse_document};

    fn syntax_and_style() -> (SyntaxSet, ClassStyle) {
        (
            SyntaxSet::load_defaults_newlines(),
            ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        )
    }

    #[test]
    fn rewrite_replaces_mermaid_with_placeholder() {
        let options = super::super::config::default_options();
        let arena = Arena::new();
        let markdown = "```mermaid\ngraph TD;A-->B;\n```";
        let root = parse_document(&arena, markdown, &options);
        let (syntax_set, class_style) = syntax_and_style();

        let outcome = rewrite_ast(root, &syntax_set, &class_style, "k");
        assert!(outcome.contains_mermaid);
        assert!(!outcome.contains_code);
        assert_eq!(outcome.mermaid_fragments.len(), 1);

        let mut html = String::new();
        format_html(root, &options, &mut html).expect("html");
        assert!(html.contains("<div>pb-mermaid-k-0</div>"));
        assert!(!html.contains("language-mermaid"));
    }

    #[test]
    fn mermaid_match_is_case_sensitive() {
        let options = super::super::config::default_options();
        let arena = Arena::new();
        let root = parse_document(&arena, "```Mermaid\ngraph TD\n```", &options);
        let (syntax_set, class_style) = syntax_and_style();

        let outcome = rewrite_ast(root, &syntax_set, &class_style, "k");
        assert!(!outcome.contains_mermaid);
        assert!(outcome.contains_code);
    }

    #[test]
    fn headings_collect_inline_code_and_anchors() {
        let options = super::super::config::default_options();
        let arena = Arena::new();
        let root = parse_document(&arena, "# Use `Box<T>`\n\n## Use `Box<T>`\n", &options);

        let headings = collect_headings(root);
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].text, "Use Box<T>");
        assert_eq!(headings[0].anchor, "use-box-t");
        assert_eq!(headings[1].anchor, "use-box-t-2");
    }
}
