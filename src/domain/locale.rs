//! Supported site languages and per-locale text values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A language the catalogue is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Zh,
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Zh, Locale::En];

    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Zh => "zh",
            Locale::En => "en",
        }
    }

    /// Value for the `lang` attribute of rendered pages.
    pub fn html_lang(self) -> &'static str {
        match self {
            Locale::Zh => "zh-CN",
            Locale::En => "en",
        }
    }

    /// Name of the language written in that language.
    pub fn native_name(self) -> &'static str {
        match self {
            Locale::Zh => "中文",
            Locale::En => "English",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported locale `{0}`")]
pub struct UnknownLocale(pub String);

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zh" => Ok(Locale::Zh),
            "en" => Ok(Locale::En),
            _ => Err(UnknownLocale(value.to_string())),
        }
    }
}

/// A `locale -> value` mapping for a single localizable field.
///
/// Lookups fall back to the caller-provided default locale and then to any
/// non-blank value, so a half-translated record still has something to show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<Locale, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, locale: Locale, value: impl Into<String>) -> Self {
        self.set(locale, value);
        self
    }

    /// Store a trimmed value; blank values remove the entry.
    pub fn set(&mut self, locale: Locale, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.0.remove(&locale);
        } else {
            self.0.insert(locale, trimmed.to_string());
        }
    }

    /// Exact value for `locale`, without fallback.
    pub fn exact(&self, locale: Locale) -> Option<&str> {
        self.0.get(&locale).map(String::as_str)
    }

    pub fn resolve(&self, locale: Locale, default: Locale) -> &str {
        self.exact(locale)
            .or_else(|| self.exact(default))
            .or_else(|| self.0.values().next().map(String::as_str))
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Locale, &str)> {
        self.0.iter().map(|(locale, value)| (*locale, value.as_str()))
    }
}

impl FromIterator<(Locale, String)> for LocalizedText {
    fn from_iter<T: IntoIterator<Item = (Locale, String)>>(iter: T) -> Self {
        let mut text = LocalizedText::new();
        for (locale, value) in iter {
            text.set(locale, value);
        }
        text
    }
}
