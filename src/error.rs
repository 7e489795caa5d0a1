use std::fmt;

use thiserror::Error;

/// What kind of identifier failed to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Style,
    Footnote,
    Relationship,
    Image,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Style => "style",
            ReferenceKind::Footnote => "footnote",
            ReferenceKind::Relationship => "relationship",
            ReferenceKind::Image => "image",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A required part of the DOCX package is missing or unreadable.
    #[error("invalid DOCX package: {0}")]
    InvalidPackage(String),

    /// Unbalanced open/close while building an XHTML section.
    #[error("tag mismatch: expected </{}>, found </{found}>", expected.as_deref().unwrap_or("(none)"))]
    TagMismatch {
        expected: Option<String>,
        found: String,
    },

    #[error("unresolved {kind} reference: {id}")]
    UnresolvedReference { kind: ReferenceKind, id: String },
}

impl Error {
    pub(crate) fn unresolved(kind: ReferenceKind, id: impl Into<String>) -> Self {
        Error::UnresolvedReference {
            kind,
            id: id.into(),
        }
    }
}
