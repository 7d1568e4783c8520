use std::fmt::Display;

/// A check that a QCT container failed during decoding.
///
/// In strict mode any issue aborts the decode with
/// [`crate::Error::ValidationFailed`]; in force mode the issues are kept on the
/// decoded [`crate::QctFile`] (see [`crate::Validity::Forced`]).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationIssue {
    /// The magic number at offset 0 is not a known QCT signature
    BadSignature(u32),
    /// The format version is not one this crate knows
    UnknownVersion(u32),
    /// The header declares zero tiles in at least one direction
    EmptyTileGrid {
        /// width in tiles
        width: u32,
        /// height in tiles
        height: u32,
    },
    /// A georeferencing coefficient is NaN or infinite, usually a sign of a
    /// misaligned read
    NonFiniteCoefficient {
        /// coefficient name, e.g. `lat_xy`
        name: &'static str,
        /// the value read
        value: f64,
    },
    /// A header pointer points past the end of the file
    PointerOutOfRange {
        /// the header field holding the pointer
        field: &'static str,
        /// the pointer value
        offset: u32,
    },
    /// The file ends before the palette or the tile index
    RasterSectionTruncated {
        /// bytes required
        required: usize,
        /// bytes available
        actual: usize,
    },
    /// A tile index entry points past the end of the file
    TileOffsetOutOfRange {
        /// tile column
        column: u32,
        /// tile row
        row: u32,
        /// the offset read from the index
        offset: u32,
    },
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSignature(magic) => write!(f, "bad signature {magic:#010x}"),
            Self::UnknownVersion(version) => write!(f, "unknown format version {version:#x}"),
            Self::EmptyTileGrid { width, height } => {
                write!(f, "empty tile grid {width}x{height}")
            }
            Self::NonFiniteCoefficient { name, value } => {
                write!(f, "coefficient {name} is not finite ({value})")
            }
            Self::PointerOutOfRange { field, offset } => {
                write!(f, "{field} pointer {offset:#x} is outside the file")
            }
            Self::RasterSectionTruncated { required, actual } => write!(
                f,
                "raster section needs {required} bytes, file has {actual}"
            ),
            Self::TileOffsetOutOfRange {
                column,
                row,
                offset,
            } => write!(
                f,
                "tile ({column}, {row}) offset {offset:#x} is outside the file"
            ),
        }
    }
}
