//! Application identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an installed application.
///
/// Wraps an opaque string such as a package name ("org.mozilla.firefox")
/// or a desktop entry id. Equality is exact string match; no case folding
/// or normalization is applied.
///
/// "No foreground application" is never represented by an empty `AppId`;
/// callers use `Option<AppId>` or a `ForegroundSignal` variant instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Creates a new AppId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace only.
    ///
    /// Blank identifiers are rejected at the protocol and CLI boundaries.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_exact_equality() {
        assert_eq!(AppId::new("com.example.chat"), AppId::from("com.example.chat"));
        assert_ne!(AppId::new("com.example.chat"), AppId::new("com.example.Chat"));
    }

    #[test]
    fn test_app_id_blank() {
        assert!(AppId::new("").is_blank());
        assert!(AppId::new("  ").is_blank());
        assert!(!AppId::new("firefox").is_blank());
    }

    #[test]
    fn test_app_id_serializes_transparently() {
        let json = serde_json::to_string(&AppId::new("firefox")).unwrap();
        assert_eq!(json, "\"firefox\"");
    }
}
