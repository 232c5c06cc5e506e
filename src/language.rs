//! Language hints passed by the caller.
//!
//! The hint only selects which offline model to load; no engine here does
//! language identification.

use std::fmt;

/// Languages the application ships voices and models for.
pub const KNOWN_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("hi", "Hindi"),
    ("mr", "Marathi"),
    ("kn", "Kannada"),
    ("ta", "Tamil"),
    ("ml", "Malayalam"),
    ("te", "Telugu"),
    ("bn", "Bengali"),
    ("pa", "Punjabi"),
    ("gu", "Gujarati"),
    ("or", "Odia"),
];

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    code: String,
}

impl Language {
    /// Accepts `hi`, `hi-IN`, `HI_in` and similar; the region part is dropped.
    pub fn parse(hint: &str) -> Self {
        let base = hint
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if base.is_empty() {
            return Self::default();
        }
        Self { code: base }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> Option<&'static str> {
        KNOWN_LANGUAGES
            .iter()
            .find(|(code, _)| *code == self.code)
            .map(|(_, name)| *name)
    }

    pub fn is_known(&self) -> bool {
        self.name().is_some()
    }

    /// Suffix used for per-language environment overrides, e.g. `HI`.
    pub fn env_suffix(&self) -> String {
        self.code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

impl Default for Language {
    fn default() -> Self {
        Self {
            code: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.code),
            None => f.write_str(&self.code),
        }
    }
}
