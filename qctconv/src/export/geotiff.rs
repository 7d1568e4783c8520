use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
    sync::Arc,
};

use bon::Builder;
use libqct::{georef::GeorefCoefficients, QctFile, TileDecoder};
use tiff::{
    encoder::{colortype::RGB8, DirectoryEncoder, TiffEncoder, TiffKind},
    tags::Tag,
};
use tracing::{debug, info};

use super::{png::rgb_image, ExportError, ExportFormat, Exporter};

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;

// GeoKey values
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const GCS_WGS_84: u16 = 4326;

/// Default number of ground control points per axis
pub const DEFAULT_GCP_GRID: u32 = 5;

/// How the pixel → WGS84 polynomial is expressed in GeoTIFF tags
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, strum::Display, clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
pub enum GeorefMethod {
    /// [`Self::Linear`] when the polynomial has no higher order terms, [`Self::Gcp`] otherwise
    #[default]
    Automatic,
    /// Tie points sampled from the polynomial on a grid
    Gcp,
    /// A single affine transform; higher order terms are dropped
    Linear,
}

impl GeorefMethod {
    /// Resolves [`Self::Automatic`] against the coefficients of a file
    #[must_use]
    pub fn resolve(self, coefficients: &GeorefCoefficients) -> Self {
        match self {
            Self::Automatic if coefficients.is_affine() => Self::Linear,
            Self::Automatic => Self::Gcp,
            method => method,
        }
    }
}

/// Options of the [`GeoTiffExporter`]
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoTiffOptions {
    /// Georeferencing tags to emit
    #[builder(default)]
    pub method: GeorefMethod,
    /// Ground control points per axis for [`GeorefMethod::Gcp`], at least 2
    #[builder(default = DEFAULT_GCP_GRID)]
    pub gcp_grid: u32,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            method: GeorefMethod::default(),
            gcp_grid: DEFAULT_GCP_GRID,
        }
    }
}

/// Writes the raster as an RGB GeoTIFF in WGS84
#[derive(Clone)]
pub struct GeoTiffExporter {
    tiles: Arc<dyn TileDecoder>,
    options: GeoTiffOptions,
}

impl GeoTiffExporter {
    /// Creates a new [`GeoTiffExporter`] decompressing tiles with `tiles`
    #[must_use]
    pub fn new(tiles: Arc<dyn TileDecoder>, options: GeoTiffOptions) -> Self {
        Self { tiles, options }
    }
}

impl Exporter for GeoTiffExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::GeoTiff
    }

    fn export(&self, qct: &QctFile, destination: &Path) -> Result<(), ExportError> {
        let image = rgb_image(qct, self.tiles.as_ref())?;
        let tags = GeoTags::new(qct, self.options);
        let writer = BufWriter::new(File::create(destination)?);

        info!("Writing GeoTIFF to {}", destination.display());
        let mut encoder = TiffEncoder::new(writer)?;
        let mut tiff = encoder.new_image::<RGB8>(image.width(), image.height())?;
        tags.write(tiff.encoder())?;
        tiff.write_data(image.as_raw())?;
        Ok(())
    }
}

/// Georeferencing tags of one file
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GeoTags {
    /// Row-major 4 × 4 model transformation matrix
    Transformation([f64; 16]),
    /// `(I, J, K, X, Y, Z)` sextuplets
    Tiepoints(Vec<f64>),
}

impl GeoTags {
    pub(crate) fn new(qct: &QctFile, options: GeoTiffOptions) -> Self {
        let georef = qct.georef();
        let shift = qct.datum_shift();
        let method = options.method.resolve(&georef.coefficients);
        debug!("georeferencing with method {method} (requested {})", options.method);
        match method {
            GeorefMethod::Gcp => Self::Tiepoints(
                georef
                    .ground_control_points(qct.width(), qct.height(), options.gcp_grid, &shift)
                    .iter()
                    .flat_map(|gcp| {
                        [
                            gcp.image.x,
                            gcp.image.y,
                            0.0,
                            gcp.wgs84.longitude,
                            gcp.wgs84.latitude,
                            0.0,
                        ]
                    })
                    .collect(),
            ),
            GeorefMethod::Linear | GeorefMethod::Automatic => {
                let t = georef.affine_approximation(&shift);
                #[rustfmt::skip]
                let matrix = [
                    t.a, t.b, 0.0, t.c,
                    t.d, t.e, 0.0, t.f,
                    0.0, 0.0, 0.0, 0.0,
                    0.0, 0.0, 0.0, 1.0,
                ];
                Self::Transformation(matrix)
            }
        }
    }

    fn write<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<W, K>,
    ) -> Result<(), ExportError> {
        match self {
            Self::Transformation(matrix) => {
                dir.write_tag(Tag::ModelTransformationTag, matrix.as_slice())?;
            }
            Self::Tiepoints(points) => {
                dir.write_tag(Tag::ModelTiepointTag, points.as_slice())?;
            }
        }
        dir.write_tag(Tag::GeoKeyDirectoryTag, geo_keys().as_slice())?;
        Ok(())
    }
}

/// GeoKey directory: version header, then `(key, location, count, value)` entries
#[rustfmt::skip]
pub(crate) const fn geo_keys() -> [u16; 16] {
    [
        1, 1, 0, 3,
        GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, GCS_WGS_84,
    ]
}
