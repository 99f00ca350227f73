#![warn(missing_docs)]
//! `codeview-lang` - data-driven language configuration helpers for `codeview-core`.
//!
//! This crate intentionally stays lightweight and does **not** depend on the engine or on any
//! tokenizer. It provides the small data structures a host uses to pick a tokenizer mode for a
//! document: a [`ModeSpec`] (mode name + string options) and a [`MimeTable`] mapping MIME types
//! to specs.

use std::collections::BTreeMap;

/// Name of the fallback mode that produces no styles.
pub const NULL_MODE: &str = "null";

/// A request for a tokenizer mode: the registered mode name plus free-form options.
///
/// Options are plain strings so that hosts can load them from any configuration format; modes
/// interpret the keys they know about and ignore the rest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModeSpec {
    /// Registered mode name (e.g. `xml`, `json`, `null`).
    pub name: String,
    /// Mode-specific options (e.g. `html = "true"` for the markup mode).
    pub options: BTreeMap<String, String>,
}

impl ModeSpec {
    /// Create a spec for a mode without options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    /// Add an option and return the updated spec.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Look up an option value.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Interpret an option as a boolean (`true`/`1`/`yes`).
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.option(key), Some("true" | "1" | "yes"))
    }

    /// The fallback spec used when nothing else matches.
    pub fn null() -> Self {
        Self::new(NULL_MODE)
    }
}

/// MIME type to [`ModeSpec`] table.
///
/// Resolution follows a small set of rules:
///
/// 1. an exact registered MIME type wins;
/// 2. `type/subtype+xml` falls back to `application/xml`;
/// 3. `type/subtype+json` falls back to `application/json`;
/// 4. anything else is used whole, as a bare mode name (`"markdown"`, but also
///    `"application/vnd.api+json"`, whose subtype is not made of `[A-Za-z0-9_-]` only).
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    entries: BTreeMap<String, ModeSpec>,
}

impl MimeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-populated with the MIME types the bundled modes understand.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.define("text/plain", ModeSpec::null());
        table.define("application/json", ModeSpec::new("json"));
        table.define("application/ld+json", ModeSpec::new("json"));
        table.define("text/x-ini", ModeSpec::new("ini"));
        table.define("application/xml", ModeSpec::new("xml"));
        table.define("text/xml", ModeSpec::new("xml"));
        table.define("image/svg+xml", ModeSpec::new("xml"));
        table.define("text/html", ModeSpec::new("xml").with_option("html", "true"));
        table
    }

    /// Register (or replace) the spec for a MIME type.
    pub fn define(&mut self, mime: impl Into<String>, spec: ModeSpec) {
        self.entries.insert(mime.into(), spec);
    }

    /// Returns `true` if `mime` has an exact entry.
    pub fn contains(&self, mime: &str) -> bool {
        self.entries.contains_key(mime)
    }

    /// Number of registered MIME types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no MIME types are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a MIME type or mode name to a spec.
    pub fn resolve(&self, spec: &str) -> ModeSpec {
        if let Some(found) = self.entries.get(spec) {
            return found.clone();
        }
        if let Some(suffix) = structured_suffix(spec) {
            let fallback = match suffix {
                "xml" => "application/xml",
                "json" => "application/json",
                _ => "",
            };
            if let Some(found) = self.entries.get(fallback) {
                return found.clone();
            }
        }
        if spec.is_empty() {
            ModeSpec::null()
        } else {
            ModeSpec::new(spec)
        }
    }
}

/// Returns the `+suffix` of a `type/subtype+suffix` MIME string.
fn structured_suffix(mime: &str) -> Option<&str> {
    let (ty, rest) = mime.split_once('/')?;
    let (sub, suffix) = rest.rsplit_once('+')?;
    let word = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };
    (word(ty) && word(sub) && word(suffix)).then_some(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_mime_wins() {
        let table = MimeTable::with_defaults();
        let spec = table.resolve("text/html");
        assert_eq!(spec.name, "xml");
        assert!(spec.flag("html"));
    }

    #[test]
    fn test_structured_suffix_fallbacks() {
        let table = MimeTable::with_defaults();
        assert_eq!(table.resolve("application/atom+xml").name, "xml");
        // `.` is not a word character, so no suffix fallback applies.
        assert_eq!(table.resolve("application/vnd.api+json").name, "application/vnd.api+json");
        assert_eq!(table.resolve("application/geo+json").name, "json");
    }

    #[test]
    fn test_unknown_is_treated_as_mode_name() {
        let table = MimeTable::new();
        assert_eq!(table.resolve("markdown").name, "markdown");
        assert_eq!(table.resolve("").name, NULL_MODE);
    }
}
