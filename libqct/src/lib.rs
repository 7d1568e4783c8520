//! # libqct
//!
//!
//! This library decodes QCT ("Quick Chart") files, a raster map container used by consumer
//! topographic mapping software, and exposes their georeferencing.
//!
//! It aims to provide a minimal, low-level API to build exporters upon: the header and its
//! metadata strings, the palette and tile index, and the polynomial georeferencing engine
//! mapping pixels to WGS84 and back.
//!
//! ### Layout
//!
//! A QCT file is addressed by fixed offsets with no self-describing schema:
//!
//! | Offset   | Content                                          |
//! |----------|--------------------------------------------------|
//! | `0x0000` | header (see [`header::QctHeader`])               |
//! | `0x0060` | georeferencing coefficients, 4 × 10 `f64`        |
//! | `0x01A0` | palette, 256 × `u32`                             |
//! | `0x05A0` | interpolation matrix, 128 × 128 bytes (unused)   |
//! | `0x45A0` | tile index, one `u32` offset per 64 × 64 tile    |
//!
//! ### Limitations
//!
//! Tile decompression is not implemented here. Raster reconstruction goes through the
//! [`TileDecoder`] trait; [`UnsupportedTiles`] only classifies the encoding of a tile.
//!
//! ### Usage
//!
//! ```rust,no_run
//! use libqct::{georef::ImageCoordinates, ParseMode, QctFile};
//!
//! fn main() -> Result<(), libqct::Error> {
//!     let qct = QctFile::parse("map.qct", ParseMode::Strict)?;
//!     let top_left = qct.to_wgs84_coordinates(ImageCoordinates { x: 0.0, y: 0.0 });
//!     println!("{} {}", top_left.latitude, top_left.longitude);
//!     Ok(())
//! }
//! ```
//!
//! Files failing validation (bad signature, non-finite coefficients, dangling pointers...)
//! can still be decoded with [`ParseMode::Force`]; the result is flagged through
//! [`QctFile::validity`]. Truncated files are always rejected.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

mod error;
/// Georeferencing coefficients and the coordinate transforms
pub mod georef;
/// The QCT header and its metadata
pub mod header;
/// Decoding of QCT files and their raster
pub mod image;
mod validation;

pub use error::{Error, ErrorKind};
pub use self::image::{
    ParseMode, QctFile, Raster, TileDecoder, TileEncoding, TilePosition, UnsupportedTiles,
    Validity,
};
pub use validation::ValidationIssue;
