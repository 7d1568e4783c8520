use image::RgbImage;

use super::{palette::Palette, tiles::TILE_SIZE};

/// Decoded raster of a QCT file: palette indexes plus the palette they refer to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// The width of the image
    width: u32,
    /// The height of the image
    height: u32,
    /// Image pixels
    pixels: Vec<u8>,
    palette: Palette,
}

impl Raster {
    /// Creates an all-zero raster
    #[must_use]
    pub(crate) fn empty(width: u32, height: u32, palette: Palette) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
            palette,
        }
    }

    /// Returns the width of the image
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel indexes of the image
    #[must_use]
    pub fn pixel_indices(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the palette
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Copies a decoded tile into place
    pub(crate) fn put_tile(&mut self, column: u32, row: u32, tile: &[u8]) {
        let size = TILE_SIZE as usize;
        let (x0, y0) = ((column * TILE_SIZE) as usize, (row * TILE_SIZE) as usize);
        let width = self.width as usize;
        for (ty, tile_row) in tile.chunks_exact(size).enumerate() {
            let y = y0 + ty;
            if y >= self.height as usize || x0 >= width {
                break;
            }
            let len = size.min(width - x0);
            let start = y * width + x0;
            self.pixels[start..start + len].copy_from_slice(&tile_row[..len]);
        }
    }

    /// Returns an iterator over the colours the pixel indexes correspond to
    pub fn rgb_pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.pixels.iter().map(|&i| self.palette.color(i))
    }

    /// Converts the raster into an RGB image
    #[must_use]
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.rgb_pixels().flatten().collect())
    }
}
