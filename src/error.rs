//! Structured error types for the Quire layout engine.
//!
//! Fatal conditions abort the layout of one document. Non-fatal conditions
//! (a block too tall for any page) are reported as [`Diagnostic`]s next to
//! a successful result instead.

use serde::Serialize;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QuireError>;

/// The unified error type returned by all public Quire API functions.
#[derive(Debug, Error)]
pub enum QuireError {
    /// A block (or a style's parent) references a style that isn't registered.
    #[error("Unknown style '{style}'{}", block_suffix(.block))]
    UnknownStyle {
        style: String,
        /// Index of the offending block in the document, when known.
        block: Option<usize>,
    },

    /// The style sheet itself is malformed (for example an inheritance cycle).
    #[error("Invalid style sheet: {0}")]
    InvalidStyle(String),

    /// A block can't be measured: ragged table rows, bad column widths,
    /// or a non-positive available width.
    #[error("Invalid block at index {block}: {reason}")]
    InvalidBlock { block: usize, reason: String },

    /// The text-metrics or output-writer backend failed.
    #[error("Backend error: {0}")]
    Backend(String),

    /// JSON input failed to parse as a valid Quire document.
    #[error("Failed to parse document: {source}{}", hint_suffix(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn block_suffix(block: &Option<usize>) -> String {
    match block {
        Some(i) => format!(" (block {})", i),
        None => String::new(),
    }
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl QuireError {
    /// Attach a block index to an error raised without one.
    pub(crate) fn at_block(self, index: usize) -> Self {
        match self {
            QuireError::UnknownStyle { style, block: None } => QuireError::UnknownStyle {
                style,
                block: Some(index),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for QuireError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the Quire document schema. Check block types and field names.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        QuireError::Parse { source: e, hint }
    }
}

/// What went wrong in a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A block (or an unsplittable piece of one) is taller than an empty page.
    Overflow,
    /// Fixed table columns were wider than the available width and got scaled.
    ColumnsClipped,
}

/// A non-fatal condition found during layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub block_index: usize,
    pub page_index: usize,
    pub message: String,
}
