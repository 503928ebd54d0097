use serde::{Deserialize, Serialize};

/// One table-of-contents entry extracted from a Markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub anchor: String,
}

impl Heading {
    pub fn href(&self) -> String {
        format!("#{}", self.anchor)
    }
}
