//! Markdown rendering.
//!
//! The pipeline is pure: it accepts markdown, produces deterministic sanitised
//! HTML together with the document's heading outline, and never fails. Caching
//! of rendered bodies happens in the caller.

mod service;
mod types;

pub use service::{ComrakRenderService, extract_headings, render_markdown, render_service};
pub use types::{RenderOutput, RenderService};
