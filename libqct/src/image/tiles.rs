use std::fmt::Display;

use nom::{multi::count, number::complete::le_u32, IResult};
use tracing::{debug, trace};

use crate::{validation::ValidationIssue, Error};

/// Side length of a tile in pixels
pub const TILE_SIZE: u32 = 64;
/// Pixels per tile
pub const TILE_PIXELS: usize = (TILE_SIZE * TILE_SIZE) as usize;
/// Offset of the tile index in a QCT file, after the palette and the
/// 128×128 interpolation matrix
pub const TILE_INDEX_OFFSET: usize = 0x45A0;

/// Position of a tile in the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePosition {
    /// tile column
    pub column: u32,
    /// tile row
    pub row: u32,
}

/// Compression scheme of a single tile, given by its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEncoding {
    /// Huffman coded (first byte 0 or 255)
    Huffman,
    /// Run-length coded over a sub-palette of `colors` entries (first byte 1..=127)
    RunLength {
        /// sub-palette size
        colors: u8,
    },
    /// Pixel packed over a sub-palette of `256 - first byte` entries (first byte 128..=254)
    PixelPacked {
        /// sub-palette size
        colors: u16,
    },
}

impl TileEncoding {
    /// Classifies a tile from its first byte
    #[must_use]
    pub fn classify(first: u8) -> Self {
        match first {
            0 | 255 => Self::Huffman,
            1..=127 => Self::RunLength { colors: first },
            _ => Self::PixelPacked {
                colors: 256 - u16::from(first),
            },
        }
    }
}

impl Display for TileEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Huffman => write!(f, "huffman"),
            Self::RunLength { colors } => write!(f, "run-length ({colors} colors)"),
            Self::PixelPacked { colors } => write!(f, "pixel-packed ({colors} colors)"),
        }
    }
}

/// Decompresses a single tile into palette indexes.
///
/// The tile compression schemes are not part of this crate; implement this trait to plug
/// one in. Decoders are shared between export threads.
pub trait TileDecoder: Send + Sync {
    /// Decodes the tile starting at `encoded[0]` into `tile`, row by row
    ///
    /// # Errors
    ///
    /// Implementations return an error if the tile cannot be decoded
    fn decode_tile(
        &self,
        position: TilePosition,
        encoded: &[u8],
        tile: &mut [u8; TILE_PIXELS],
    ) -> Result<(), Error>;
}

/// A [`TileDecoder`] that decodes nothing and reports the encoding of the first tile it sees
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTiles;

impl TileDecoder for UnsupportedTiles {
    fn decode_tile(
        &self,
        position: TilePosition,
        encoded: &[u8],
        _tile: &mut [u8; TILE_PIXELS],
    ) -> Result<(), Error> {
        let first = encoded
            .first()
            .ok_or_else(|| Error::Malformed(format!("empty tile at {position:?}")))?;
        Err(Error::UnsupportedTileEncoding {
            encoding: TileEncoding::classify(*first),
            column: position.column,
            row: position.row,
        })
    }
}

/// File offsets of every tile, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileIndex {
    width: u32,
    height: u32,
    offsets: Vec<u32>,
}

impl TileIndex {
    /// Reads the tile index of a `width × height` tile grid.
    ///
    /// Returns `None` with an issue if the index itself does not fit in the file. Offsets
    /// past the end of the file are recorded as issues, the index is still returned.
    pub(crate) fn parse(
        bytes: &[u8],
        width: u32,
        height: u32,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Self> {
        let tiles = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        let required = tiles
            .checked_mul(4)
            .and_then(|len| len.checked_add(TILE_INDEX_OFFSET))
            .unwrap_or(usize::MAX);
        let Some(input) = bytes.get(TILE_INDEX_OFFSET..required) else {
            issues.push(ValidationIssue::RasterSectionTruncated {
                required,
                actual: bytes.len(),
            });
            return None;
        };
        let (_, offsets) = index_entries(input, tiles).ok()?;
        debug!("Index len: {}", offsets.len());

        let index = Self {
            width,
            height,
            offsets,
        };
        for (position, offset) in index.iter() {
            if usize::try_from(offset).map_or(true, |o| o >= bytes.len()) {
                trace!(?position, offset, "tile offset out of range");
                issues.push(ValidationIssue::TileOffsetOutOfRange {
                    column: position.column,
                    row: position.row,
                    offset,
                });
            }
        }
        Some(index)
    }

    /// Grid width in tiles
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Iterates over every tile position with its file offset, row by row
    pub fn iter(&self) -> impl Iterator<Item = (TilePosition, u32)> + '_ {
        let width = self.width.max(1);
        (0u32..).zip(&self.offsets).map(move |(i, &offset)| {
            (
                TilePosition {
                    column: i % width,
                    row: i / width,
                },
                offset,
            )
        })
    }
}

fn index_entries(input: &[u8], tiles: usize) -> IResult<&[u8], Vec<u32>> {
    count(le_u32, tiles)(input)
}
