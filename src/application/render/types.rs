use serde::{Deserialize, Serialize};

use crate::domain::toc::Heading;

/// Deterministic rendering result returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Sanitised HTML ready to embed in a page.
    pub html: String,
    /// Headings in document order; each anchor equals the `id` set on the
    /// matching heading element in `html`.
    pub headings: Vec<Heading>,
    /// Indicates whether the rendered HTML contains any highlighted code blocks.
    pub contains_code: bool,
    /// Indicates whether the rendered HTML contains Mermaid diagram containers.
    pub contains_mermaid: bool,
}

impl RenderOutput {
    pub fn empty() -> Self {
        Self {
            html: String::new(),
            headings: Vec::new(),
            contains_code: false,
            contains_mermaid: false,
        }
    }
}

/// Trait exposed by the rendering pipeline. Implementations must be pure,
/// deterministic and total: the same markdown always yields the same output
/// and malformed input still renders.
pub trait RenderService: Send + Sync {
    fn render(&self, markdown: &str) -> RenderOutput;
}
