#![warn(missing_docs)]
//! `codeview-highlight-simple` - simple tokenizer modes for `codeview-core`.
//!
//! Two families are provided:
//!
//! - [`RegexMode`]: stateless, an ordered list of regex rules (JSON, INI and similar formats
//!   where a real parser would be overkill);
//! - [`MarkupMode`]: a small stateful HTML/XML tokenizer that tracks open elements for smart
//!   indentation.
//!
//! [`register_defaults`] installs them into a [`ModeRegistry`] under the names the default MIME
//! table of `codeview-lang` resolves to (`json`, `ini`, `xml`).

mod markup;
mod regex_mode;

pub use markup::{Inside, MarkupMode, MarkupState};
pub use regex_mode::{RegexMode, RegexRule, SimpleIniStyles, SimpleJsonStyles};

use codeview_core::{ModeHandle, ModeRegistry, StyleId};
use codeview_lang::ModeSpec;

// Default `StyleId` constants. These are only identifiers; the host maps them to colors.

/// Strings and quoted attribute values.
pub const SIMPLE_STYLE_STRING: StyleId = 0x0200_0001;
/// Numbers.
pub const SIMPLE_STYLE_NUMBER: StyleId = 0x0200_0002;
/// `true` / `false`.
pub const SIMPLE_STYLE_BOOLEAN: StyleId = 0x0200_0003;
/// `null`.
pub const SIMPLE_STYLE_NULL: StyleId = 0x0200_0004;
/// JSON object keys.
pub const SIMPLE_STYLE_PROPERTY: StyleId = 0x0200_0005;
/// INI `[section]` headers.
pub const SIMPLE_STYLE_SECTION: StyleId = 0x0200_0010;
/// INI keys.
pub const SIMPLE_STYLE_KEY: StyleId = 0x0200_0011;
/// Comments.
pub const SIMPLE_STYLE_COMMENT: StyleId = 0x0200_0012;
/// Markup tag delimiters and names.
pub const SIMPLE_STYLE_TAG: StyleId = 0x0200_0020;
/// Markup attribute names.
pub const SIMPLE_STYLE_ATTRIBUTE: StyleId = 0x0200_0021;
/// Doctypes, processing instructions and CDATA.
pub const SIMPLE_STYLE_META: StyleId = 0x0200_0022;
/// Character references (`&amp;`).
pub const SIMPLE_STYLE_ENTITY: StyleId = 0x0200_0023;

/// Register the bundled modes: `json`, `ini` and `xml` (with the `html` flag honoured).
///
/// ```rust
/// use codeview_core::ModeRegistry;
///
/// let mut registry = ModeRegistry::new();
/// codeview_highlight_simple::register_defaults(&mut registry).unwrap();
/// assert_eq!(registry.get_mode("application/json").name(), "json");
/// assert_eq!(registry.get_mode("text/html").name(), "xml");
/// ```
pub fn register_defaults(registry: &mut ModeRegistry) -> Result<(), regex::Error> {
    let json = RegexMode::json_default(SimpleJsonStyles::default())?;
    let ini = RegexMode::ini_default(SimpleIniStyles::default())?;
    registry.define_mode("json", move |_| ModeHandle::new(json.clone()));
    registry.define_mode("ini", move |_| ModeHandle::new(ini.clone()));
    registry.define_mode("xml", |spec: &ModeSpec| {
        if spec.flag("html") {
            ModeHandle::new(MarkupMode::html())
        } else {
            ModeHandle::new(MarkupMode::xml())
        }
    });
    tracing::debug!(registry = ?registry, "registered simple modes");
    Ok(())
}
