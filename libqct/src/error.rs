use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

use crate::{image::tiles::TileEncoding, validation::ValidationIssue};

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libqct` errors
pub enum Error {
    /// The input path does not exist
    #[error("file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input path exists but is not a regular file
    #[error("not a file: {}", .0.display())]
    InputNotAFile(PathBuf),

    /// The container ends before a section the decoder requires.
    /// Force mode never overrides this
    #[error("truncated container: {section} requires {required} bytes, file has {actual}")]
    Truncated {
        /// name of the section being read
        section: &'static str,
        /// bytes required to cover the section
        required: usize,
        /// bytes available
        actual: usize,
    },

    /// The container is structurally unreadable
    #[error("malformed container: {0}")]
    Malformed(String),

    /// One or more validation checks failed in strict mode
    #[error("validation failed ({}), use force mode to override", ValidationList(.0))]
    ValidationFailed(Vec<ValidationIssue>),

    /// The tile decoder cannot handle a tile encoding
    #[error("unsupported tile encoding {encoding} for tile ({column}, {row})")]
    UnsupportedTileEncoding {
        /// encoding classified from the first tile byte
        encoding: TileEncoding,
        /// tile column
        column: u32,
        /// tile row
        row: u32,
    },

    /// The file was force-decoded without a usable palette or tile index
    #[error("file carries no usable raster section")]
    NoRaster,

    /// I/O failure while reading the input
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad categories of [`Error`], as surfaced to users of the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// See [`Error::InputNotFound`]
    #[strum(serialize = "input not found")]
    InputNotFound,
    /// See [`Error::InputNotAFile`]
    #[strum(serialize = "input not a file")]
    InputNotAFile,
    /// See [`Error::Truncated`] and [`Error::Malformed`]
    #[strum(serialize = "truncated or malformed container")]
    TruncatedOrMalformedContainer,
    /// See [`Error::ValidationFailed`]
    #[strum(serialize = "validation failed")]
    ValidationFailed,
    /// Raster reconstruction failures and plain i/o
    #[strum(serialize = "raster or i/o failure")]
    Other,
}

impl Error {
    /// Returns the category of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound(_) => ErrorKind::InputNotFound,
            Self::InputNotAFile(_) => ErrorKind::InputNotAFile,
            Self::Truncated { .. } | Self::Malformed(_) => {
                ErrorKind::TruncatedOrMalformedContainer
            }
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::UnsupportedTileEncoding { .. } | Self::NoRaster | Self::Io(_) => ErrorKind::Other,
        }
    }
}

struct ValidationList<'a>(&'a [ValidationIssue]);

impl Display for ValidationList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}
