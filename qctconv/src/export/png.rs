use std::{fs::File, io::BufWriter, path::Path, sync::Arc};

use image::{codecs::png::PngEncoder, ImageEncoder, RgbImage};
use libqct::{QctFile, TileDecoder};
use tracing::{debug, info};

use super::{ExportError, ExportFormat, Exporter};

/// Writes the raster as an RGB PNG
#[derive(Clone)]
pub struct PngExporter {
    tiles: Arc<dyn TileDecoder>,
}

impl PngExporter {
    /// Creates a new [`PngExporter`] decompressing tiles with `tiles`
    #[must_use]
    pub fn new(tiles: Arc<dyn TileDecoder>) -> Self {
        Self { tiles }
    }
}

impl Exporter for PngExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Png
    }

    fn export(&self, qct: &QctFile, destination: &Path) -> Result<(), ExportError> {
        let image = rgb_image(qct, self.tiles.as_ref())?;
        let output = BufWriter::new(File::create(destination)?);

        info!("Writing palette image to {}", destination.display());
        PngEncoder::new(output).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(())
    }
}

/// Reconstructs the raster of `qct` and applies its palette
pub(super) fn rgb_image(qct: &QctFile, tiles: &dyn TileDecoder) -> Result<RgbImage, ExportError> {
    let raster = qct.raster(tiles)?;
    if raster.width() == 0 || raster.height() == 0 {
        return Err(ExportError::InvalidRaster(format!(
            "raster has zero dimensions ({}x{})",
            raster.width(),
            raster.height()
        )));
    }
    debug!("Applying palette to {}x{} raster", raster.width(), raster.height());
    raster
        .to_rgb_image()
        .ok_or_else(|| ExportError::InvalidRaster("pixel count does not match dimensions".into()))
}
