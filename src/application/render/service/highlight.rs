use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::warn;

/// Highlight a fenced block into a classed `<pre><code>` fragment.
///
/// Unknown languages highlight as plain text. A highlighter failure degrades to
/// an escaped, unhighlighted block.
pub(crate) fn highlight_code(
    language: Option<&str>,
    meta: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> String {
    let requested = language.map(str::to_ascii_lowercase);
    let syntax = requested
        .as_deref()
        .and_then(|token| find_syntax(syntax_set, token));
    let (lang_token, syntax) = match (requested.as_deref(), syntax) {
        (Some(token), Some(syntax)) => (token, syntax),
        _ => ("text", syntax_set.find_syntax_plain_text()),
    };

    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, *class_style);

    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
            warn!(
                target = "application::render::highlight",
                language = lang_token,
                error = %err,
                "Syntax highlighting failed; emitting plain block"
            );
            return build_plain_code_block(lang_token, code);
        }
    }

    let highlighted = generator.finalize();
    let meta_attr = meta
        .filter(|m| !m.is_empty())
        .map(|m| format!(" data-meta=\"{}\"", escape_html(m)))
        .unwrap_or_default();

    format!(
        "<pre class=\"syntax-highlight syntax-lang-{lang_token}\" data-language=\"{lang_token}\"><code class=\"language-{lang_token} syntax-code\"{meta_attr}>{highlighted}</code></pre>"
    )
}

pub(crate) fn build_plain_code_block(language: &str, literal: &str) -> String {
    let language = escape_html(language);
    let mut escaped_code = escape_html(literal);
    if !escaped_code.ends_with('\n') {
        escaped_code.push('\n');
    }
    format!(
        "<pre class=\"syntax-highlight\" data-language=\"{language}\"><code class=\"language-{language}\">{escaped_code}</code></pre>"
    )
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    syntax_set
        .find_syntax_by_token(token)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_and_style() -> (SyntaxSet, ClassStyle) {
        (
            SyntaxSet::load_defaults_newlines(),
            ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        )
    }

    #[test]
    fn highlights_known_language_with_prefixed_classes() {
        let (syntax_set, class_style) = syntax_and_style();
        let html = highlight_code(
            Some("Rust"),
            None,
            "fn main() {}",
            &syntax_set,
            &class_style,
        );

        assert!(html.starts_with("<pre class=\"syntax-highlight syntax-lang-rust\""));
        assert!(html.contains("class=\"language-rust syntax-code\""));
        assert!(html.contains("syntax-"));
    }

    #[test]
    fn unknown_language_falls_back_to_plain_text() {
        let (syntax_set, class_style) = syntax_and_style();
        let html = highlight_code(
            Some("no-such-lang"),
            None,
            "<x> & y",
            &syntax_set,
            &class_style,
        );

        assert!(html.contains("language-text"));
        assert!(html.contains("&lt;x&gt;"));
    }

    #[test]
    fn plain_block_escapes_markup() {
        let html = build_plain_code_block("text", "<script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.ends_with("\n</code></pre>"));
    }
}
