use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

/// Parser and renderer options shared by rendering and heading extraction.
///
/// Raw HTML in the source is escaped rather than passed through, and comrak's
/// safe mode blanks `javascript:`, `vbscript:`, `file:` and non-image `data:`
/// link targets.
pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "blockquote", "br", "code", "del", "div", "em", "h1", "h2", "h3", "h4", "h5",
    "h6", "hr", "i", "img", "input", "kbd", "li", "ol", "p", "pre", "s", "section", "span",
    "strong", "sub", "sup", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

const GENERIC_ATTRIBUTES: &[&str] = &[
    "class",
    "id",
    "title",
    "lang",
    "dir",
    "role",
    "aria-hidden",
    "aria-label",
    "data-footnotes",
    "data-footnote-ref",
    "data-footnote-backref",
];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("img", &["alt", "title", "width", "height", "loading"]),
    ("pre", &["class", "data-language"]),
    ("code", &["class", "data-meta"]),
    ("th", &["align", "colspan", "rowspan", "scope"]),
    ("td", &["align", "colspan", "rowspan"]),
    ("input", &["type", "checked", "disabled", "class"]),
];

/// Allowlist applied to rendered bodies. Heading ids survive so outline
/// anchors resolve; mermaid containers are plain `div.mermaid`.
pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
        .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect::<HashSet<_>>())
        .url_schemes(HashSet::from(["http", "https", "mailto", "tel"]))
        // `rel` is added for external links only, during post-processing.
        .link_rel(None);

    for (tag, attributes) in TAG_ATTRIBUTES {
        builder.add_tag_attributes(*tag, attributes.iter().copied());
    }

    builder
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.r#unsafe = false;
    render.escape = true;
    render.sourcepos = false;
}
