#![allow(clippy::module_name_repetitions)]

pub(crate) mod decoder;
pub(crate) mod palette;
pub(crate) mod raster;
pub(crate) mod tiles;

pub use decoder::{ParseMode, Validity};
pub use palette::Palette;
pub use raster::Raster;
pub use tiles::{
    TileDecoder, TileEncoding, TileIndex, TilePosition, UnsupportedTiles, TILE_PIXELS, TILE_SIZE,
};

use crate::{
    georef::{DatumShift, Georef, ImageCoordinates, Wgs84Coordinates},
    header::QctHeader,
    Error,
};
use decoder::Decoder;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// A decoded QCT file.
///
/// Immutable once parsed; it can be shared by reference between threads.
#[derive(Debug, PartialEq)]
pub struct QctFile {
    path: PathBuf,
    validity: Validity,
    header: QctHeader,
    georef: Georef,
    palette: Option<Palette>,
    tiles: Option<TileIndex>,
    bytes: Vec<u8>,
}

impl QctFile {
    /// Reads and decodes a QCT file
    ///
    /// # Errors
    ///
    /// - [`Error::InputNotFound`] if `path` does not exist
    /// - [`Error::InputNotAFile`] if `path` is not a regular file
    /// - [`Error::Truncated`]/[`Error::Malformed`] if the container is unreadable, in either mode
    /// - [`Error::ValidationFailed`] if a check fails in [`ParseMode::Strict`]
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn parse(path: impl AsRef<Path>, mode: ParseMode) -> Result<Self, Error> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::InputNotFound(path.to_owned()),
            _ => Error::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(Error::InputNotAFile(path.to_owned()));
        }
        let bytes = fs::read(path)?;
        debug!("read {} bytes", bytes.len());
        Self::from_bytes(path, bytes, mode)
    }

    /// Decodes a QCT file already held in memory. `path` only identifies the file
    ///
    /// # Errors
    ///
    /// See [`Self::parse`]
    pub fn from_bytes(
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
        mode: ParseMode,
    ) -> Result<Self, Error> {
        let decoded = Decoder::new(&bytes, mode).run()?;
        let qct = Self {
            path: path.into(),
            validity: decoded.validity,
            header: decoded.header,
            georef: decoded.georef,
            palette: decoded.palette,
            tiles: decoded.tiles,
            bytes,
        };
        info!(
            "Decoded {} ({mode}): {}x{} pixels",
            qct.path.display(),
            qct.width(),
            qct.height()
        );
        Ok(qct)
    }

    /// Path the file was read from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether every validation check passed
    #[must_use]
    pub const fn validity(&self) -> &Validity {
        &self.validity
    }

    /// Returns `true` if the file was decoded in [`ParseMode::Force`] past failed checks
    #[must_use]
    pub const fn is_force_decoded(&self) -> bool {
        matches!(self.validity, Validity::Forced(_))
    }

    /// Returns a reference to the [`QctHeader`]
    #[must_use]
    pub const fn header(&self) -> &QctHeader {
        &self.header
    }

    /// Returns the georeferencing engine
    #[must_use]
    pub const fn georef(&self) -> &Georef {
        &self.georef
    }

    /// The datum shift stored in the file, zero if absent
    #[must_use]
    pub fn datum_shift(&self) -> DatumShift {
        self.header.datum_shift()
    }

    /// Returns the image width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.header.width_tiles.saturating_mul(TILE_SIZE)
    }

    /// Returns the image height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.header.height_tiles.saturating_mul(TILE_SIZE)
    }

    /// Pixel → WGS84 with the file's own datum shift
    #[must_use]
    pub fn to_wgs84_coordinates(&self, image: ImageCoordinates) -> Wgs84Coordinates {
        self.georef.to_wgs84_coordinates(image, &self.datum_shift())
    }

    /// WGS84 → pixel with the file's own datum shift
    #[must_use]
    pub fn to_image_coordinates(&self, wgs84: Wgs84Coordinates) -> ImageCoordinates {
        self.georef.to_image_coordinates(wgs84, &self.datum_shift())
    }

    /// Geographic corners of the raster: top-left, top-right, bottom-right, bottom-left
    #[must_use]
    pub fn corners(&self) -> [Wgs84Coordinates; 4] {
        self.georef
            .corners(self.width(), self.height(), &self.datum_shift())
    }

    /// Returns the palette, if the file has one
    #[must_use]
    pub const fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Returns the tile index, if the file has one
    #[must_use]
    pub const fn tile_index(&self) -> Option<&TileIndex> {
        self.tiles.as_ref()
    }

    /// Reconstructs the raster, decompressing every tile with `decoder`
    ///
    /// # Errors
    ///
    /// - [`Error::NoRaster`] if the file was force-decoded without palette or tile index
    /// - [`Error::Malformed`] if a tile offset is outside the file
    /// - any error returned by `decoder`
    pub fn raster(&self, decoder: &dyn TileDecoder) -> Result<Raster, Error> {
        let (Some(palette), Some(tiles)) = (&self.palette, &self.tiles) else {
            return Err(Error::NoRaster);
        };
        let mut raster = Raster::empty(self.width(), self.height(), palette.clone());
        let mut tile = [0; TILE_PIXELS];
        for (position, offset) in tiles.iter() {
            let encoded = usize::try_from(offset)
                .ok()
                .and_then(|offset| self.bytes.get(offset..))
                .filter(|encoded| !encoded.is_empty())
                .ok_or_else(|| {
                    Error::Malformed(format!("tile {position:?} offset {offset:#x} is outside the file"))
                })?;
            tile.fill(0);
            decoder.decode_tile(position, encoded, &mut tile)?;
            raster.put_tile(position.column, position.row, &tile);
        }
        debug!("Reconstructed {}x{} raster", raster.width(), raster.height());
        Ok(raster)
    }
}
