//! Source reformatting
//!
//! Beautifiers normalize the layout of markup, script and style text. They
//! are idempotent: running one over its own output returns the same text.
//! None of them change what the code means, and none of them can recover
//! names or structure lost to minification.

mod deobfuscate;
mod markup;
mod script;
mod style;

pub use deobfuscate::deobfuscate;

use thiserror::Error;

/// Failure to reformat one artifact
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("unterminated {what} starting on line {line}")]
    Unterminated { what: &'static str, line: usize },

    #[error("unbalanced '{found}' on line {line}")]
    Unbalanced { found: char, line: usize },

    #[error("unclosed '{0}' at end of input")]
    Unclosed(char),
}

/// The kind of text being reformatted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Markup,
    Script,
    Style,
}

impl SourceKind {
    /// Classifies a `Content-Type` header value
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if mime.contains("javascript") || mime.contains("ecmascript") {
            Some(Self::Script)
        } else if mime == "text/css" {
            Some(Self::Style)
        } else if mime.contains("html") {
            Some(Self::Markup)
        } else {
            None
        }
    }
}

/// Reformats `text` according to its kind
pub fn beautify(text: &str, kind: SourceKind) -> Result<String, TransformError> {
    match kind {
        SourceKind::Markup => Ok(markup::beautify_markup(text)),
        SourceKind::Script => script::beautify_script(text),
        SourceKind::Style => style::beautify_style(text),
    }
}
