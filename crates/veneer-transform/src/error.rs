/// Error types for the transform layer

use std::path::PathBuf;
use thiserror::Error;
use veneer_syntax::Range;

/// An error produced while lowering a template, independent of anything the
/// host compiler later reports. These are collected per module and surfaced
/// to callers; they never abort processing of other modules.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct TransformError {
    pub kind: TransformErrorKind,
    pub message: String,
    /// The file the error points into (script or companion template)
    pub path: PathBuf,
    pub location: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// The template failed to parse; its module is reverted to input.
    TemplateSyntax,
    /// The template parsed but is attached to something unusable, such as an
    /// unnamed class.
    Structural,
}

impl TransformError {
    pub fn syntax(path: impl Into<PathBuf>, message: impl Into<String>, location: Range) -> Self {
        TransformError {
            kind: TransformErrorKind::TemplateSyntax,
            message: message.into(),
            path: path.into(),
            location,
        }
    }

    pub fn structural(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        location: Range,
    ) -> Self {
        TransformError {
            kind: TransformErrorKind::Structural,
            message: message.into(),
            path: path.into(),
            location,
        }
    }
}

/// An error raised during emission, in template-local coordinates. The
/// module assembler re-bases these and attaches the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitError {
    pub message: String,
    pub location: Option<Range>,
}
