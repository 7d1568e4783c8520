#![allow(dead_code)]

use std::path::{Path, PathBuf};

use libqct::{
    georef::{GeorefCoefficients, Wgs84Coordinates},
    header::MAGIC_MAP,
    image::TILE_PIXELS,
    Error, ParseMode, QctFile, TileDecoder, TilePosition,
};
use mktemp::Temp;

const TILE_INDEX_OFFSET: usize = 0x45A0;

/// Linear georeferencing over the Highlands, one ten-thousandth of a degree per pixel
pub fn linear_coefficients() -> GeorefCoefficients {
    GeorefCoefficients {
        lon: -6.5,
        lon_x: 1e-4,
        lat: 57.5,
        lat_y: -1e-4,
        eas: 65_000.0,
        eas_x: 10_000.0,
        nor: 575_000.0,
        nor_y: -10_000.0,
        ..Default::default()
    }
}

/// A 2 × 1 tile map whose tiles hold a single byte each: 3, then 200.
/// The palette is grey, so pixel index `i` is colour `[i, i, i]`
pub fn map(coefficients: GeorefCoefficients, outline: &[Wgs84Coordinates]) -> QctFile {
    let tiles = [3u8, 200];
    let mut bytes = vec![0u8; GeorefCoefficients::BYTE_OFFSET];
    put_u32(&mut bytes, 0x00, MAGIC_MAP);
    put_u32(&mut bytes, 0x04, 2);
    put_u32(&mut bytes, 0x08, 2);
    put_u32(&mut bytes, 0x0C, 1);
    for (_, value) in coefficients.named_terms() {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }
    for i in 0..=255u32 {
        bytes.extend_from_slice(&(i << 16 | i << 8 | i).to_le_bytes());
    }
    bytes.resize(TILE_INDEX_OFFSET, 0);
    let data_start = TILE_INDEX_OFFSET + tiles.len() * 4;
    for i in 0..tiles.len() {
        bytes.extend_from_slice(&to_u32(data_start + i).to_le_bytes());
    }
    bytes.extend_from_slice(&tiles);

    let title = to_u32(bytes.len());
    put_u32(&mut bytes, 0x10, title);
    bytes.extend_from_slice(b"Glen Affric\0");

    if !outline.is_empty() {
        let at = to_u32(bytes.len());
        put_u32(&mut bytes, 0x58, to_u32(outline.len()));
        put_u32(&mut bytes, 0x5C, at);
        for point in outline {
            bytes.extend_from_slice(&point.latitude.to_ne_bytes());
            bytes.extend_from_slice(&point.longitude.to_ne_bytes());
        }
    }
    QctFile::from_bytes("glen_affric.qct", bytes, ParseMode::Strict).expect("fixture is valid")
}

fn put_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).expect("fixture too large")
}

pub fn path_in(dir: &Temp, name: &str) -> PathBuf {
    let dir: &Path = dir.as_ref();
    dir.join(name)
}

/// Fills each tile with the palette index stored in its first byte
pub struct SolidTiles;

impl TileDecoder for SolidTiles {
    fn decode_tile(
        &self,
        _position: TilePosition,
        encoded: &[u8],
        tile: &mut [u8; TILE_PIXELS],
    ) -> Result<(), Error> {
        tile.fill(encoded[0]);
        Ok(())
    }
}
