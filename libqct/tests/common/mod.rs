#![allow(dead_code)]

use libqct::{
    georef::{DatumShift, GeorefCoefficients},
    header::MAGIC_MAP,
    Error, TileDecoder, TilePosition,
};

pub const PALETTE_OFFSET: usize = 0x1A0;
pub const TILE_INDEX_OFFSET: usize = 0x45A0;

/// Synthesises QCT files byte by byte
#[derive(Debug, Clone)]
pub struct QctFixture {
    pub magic: u32,
    pub version: u32,
    pub width_tiles: u32,
    pub height_tiles: u32,
    pub coefficients: GeorefCoefficients,
    pub datum_shift: Option<DatumShift>,
    pub title: Option<&'static str>,
    /// one byte per tile, row-major; `None` stops the file after the coefficients
    pub tiles: Option<Vec<u8>>,
}

impl Default for QctFixture {
    fn default() -> Self {
        Self {
            magic: MAGIC_MAP,
            version: 2,
            width_tiles: 2,
            height_tiles: 1,
            coefficients: GeorefCoefficients {
                lon: -6.5,
                lon_x: 1e-4,
                lat: 57.5,
                lat_y: -1e-4,
                eas: 65_000.0,
                eas_x: 10_000.0,
                nor: 575_000.0,
                nor_y: -10_000.0,
                ..Default::default()
            },
            datum_shift: None,
            title: Some("Test chart"),
            tiles: Some(vec![3, 200]),
        }
    }
}

impl QctFixture {
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; GeorefCoefficients::BYTE_OFFSET];
        put_u32(&mut bytes, 0x00, self.magic);
        put_u32(&mut bytes, 0x04, self.version);
        put_u32(&mut bytes, 0x08, self.width_tiles);
        put_u32(&mut bytes, 0x0C, self.height_tiles);
        for (_, value) in self.coefficients.named_terms() {
            bytes.extend_from_slice(&value.to_ne_bytes());
        }
        let Some(tiles) = &self.tiles else {
            return bytes;
        };

        // grey palette
        for i in 0..=255u32 {
            bytes.extend_from_slice(&(i << 16 | i << 8 | i).to_le_bytes());
        }
        bytes.resize(TILE_INDEX_OFFSET, 0);
        let data_start = TILE_INDEX_OFFSET + tiles.len() * 4;
        for i in 0..tiles.len() {
            bytes.extend_from_slice(&to_u32(data_start + i).to_le_bytes());
        }
        bytes.extend_from_slice(tiles);

        if let Some(title) = self.title {
            let ptr = to_u32(bytes.len());
            put_u32(&mut bytes, 0x10, ptr);
            bytes.extend_from_slice(title.as_bytes());
            bytes.push(0);
        }
        if let Some(shift) = self.datum_shift {
            let extended = to_u32(bytes.len());
            put_u32(&mut bytes, 0x54, extended);
            bytes.extend_from_slice(&0u32.to_le_bytes());
            bytes.extend_from_slice(&(extended + 12).to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
            bytes.extend_from_slice(&shift.north.to_ne_bytes());
            bytes.extend_from_slice(&shift.east.to_ne_bytes());
        }
        bytes
    }
}

fn put_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).expect("fixture too large")
}

/// Fills each tile with the palette index stored in its first byte
pub struct SolidTiles;

impl TileDecoder for SolidTiles {
    fn decode_tile(
        &self,
        _position: TilePosition,
        encoded: &[u8],
        tile: &mut [u8; libqct::image::TILE_PIXELS],
    ) -> Result<(), Error> {
        tile.fill(encoded[0]);
        Ok(())
    }
}
