//! Exporters for decoded QCT files and the orchestrator running them.
//!
//! Every requested format becomes one [`ExportJob`]. [`export_all`] starts all jobs together
//! on a rayon pool with one thread per job and joins them; a failing or panicking job never
//! stops its siblings, its error is simply recorded in its own [`ExportOutcome`].

use std::{
    any::Any,
    fmt, io,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use bon::Builder;
use libqct::{QctFile, TileDecoder};
use rayon::ThreadPoolBuilder;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

mod geotiff;
mod kml;
mod png;

pub use geotiff::{GeoTiffExporter, GeoTiffOptions, GeorefMethod, DEFAULT_GCP_GRID};
pub use kml::KmlExporter;
pub use png::PngExporter;

/// Output formats a QCT file can be exported to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ExportFormat {
    /// Georeferenced TIFF
    #[strum(serialize = "GeoTIFF")]
    GeoTiff,
    /// KML ground overlay
    #[strum(serialize = "KML")]
    Kml,
    /// Plain PNG image
    #[strum(serialize = "PNG")]
    Png,
}

/// Possible export errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExportError {
    /// Creating or writing the destination failed
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The PNG encoder failed
    #[error("png encoding failed: {0}")]
    Png(#[from] image::ImageError),

    /// The TIFF encoder failed
    #[error("tiff encoding failed: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Writing the KML document failed
    #[error("kml writing failed: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The raster could not be reconstructed from the file
    #[error("raster unavailable: {0}")]
    Decode(#[from] libqct::Error),

    /// The reconstructed raster does not fit the output format
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// The exporter panicked, or never reported back
    #[error("export aborted: {0}")]
    Aborted(String),
}

/// Writes a [`QctFile`] to a destination in one format
pub trait Exporter: Send + Sync {
    /// The format this exporter produces
    fn format(&self) -> ExportFormat;

    /// Writes `qct` to `destination`, replacing any existing file
    ///
    /// # Errors
    ///
    /// Any [`ExportError`]; the destination may be left partially written
    fn export(&self, qct: &QctFile, destination: &Path) -> Result<(), ExportError>;
}

/// One exporter bound to its destination
pub struct ExportJob {
    exporter: Box<dyn Exporter>,
    destination: PathBuf,
}

impl ExportJob {
    /// Creates a new [`ExportJob`]
    pub fn new(exporter: impl Exporter + 'static, destination: impl Into<PathBuf>) -> Self {
        Self {
            exporter: Box::new(exporter),
            destination: destination.into(),
        }
    }

    /// Format of the job's exporter
    #[must_use]
    pub fn format(&self) -> ExportFormat {
        self.exporter.format()
    }

    /// Where the job writes
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    #[instrument(skip_all, fields(format = %self.format(), destination = %self.destination.display()))]
    fn run(&self, qct: &QctFile) -> ExportOutcome {
        debug!("export started");
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.exporter.export(qct, &self.destination)
        }))
        .unwrap_or_else(|payload| Err(ExportError::Aborted(panic_message(&*payload))));
        match &result {
            Ok(()) => info!("Exported {}", self.destination.display()),
            Err(e) => warn!("Export to {} failed: {e}", self.destination.display()),
        }
        ExportOutcome {
            format: self.format(),
            destination: self.destination.clone(),
            result,
        }
    }
}

impl fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportJob")
            .field("format", &self.format())
            .field("destination", &self.destination)
            .finish()
    }
}

/// The result of one [`ExportJob`]
#[derive(Debug)]
pub struct ExportOutcome {
    /// exported format
    pub format: ExportFormat,
    /// destination of the job
    pub destination: PathBuf,
    /// what the exporter returned
    pub result: Result<(), ExportError>,
}

impl ExportOutcome {
    /// Returns `true` if the export succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "{} -> {}: ok", self.format, self.destination.display()),
            Err(e) => write!(
                f,
                "{} -> {}: failed: {e}",
                self.format,
                self.destination.display()
            ),
        }
    }
}

/// Destinations requested by the user, one optional path per format
#[derive(Builder, Default, Debug, Clone)]
pub struct ExportRequests {
    /// GeoTIFF destination
    #[builder(into)]
    pub geotiff: Option<PathBuf>,
    /// Options of the GeoTIFF exporter
    #[builder(default)]
    pub geotiff_options: GeoTiffOptions,
    /// KML destination
    #[builder(into)]
    pub kml: Option<PathBuf>,
    /// PNG destination
    #[builder(into)]
    pub png: Option<PathBuf>,
}

impl ExportRequests {
    /// One job per requested format, in the order GeoTIFF, KML, PNG.
    ///
    /// Unset or empty destinations start no job. `tiles` decompresses the raster for
    /// the formats that need it.
    #[must_use]
    pub fn into_jobs(self, tiles: &Arc<dyn TileDecoder>) -> Vec<ExportJob> {
        let mut jobs = Vec::with_capacity(3);
        if let Some(destination) = requested(self.geotiff) {
            jobs.push(ExportJob::new(
                GeoTiffExporter::new(Arc::clone(tiles), self.geotiff_options),
                destination,
            ));
        }
        if let Some(destination) = requested(self.kml) {
            jobs.push(ExportJob::new(KmlExporter, destination));
        }
        if let Some(destination) = requested(self.png) {
            jobs.push(ExportJob::new(PngExporter::new(Arc::clone(tiles)), destination));
        }
        debug!("{} export jobs requested", jobs.len());
        jobs
    }
}

fn requested(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Runs every job concurrently against the shared `qct` and waits for all of them.
///
/// Outcomes are returned in the order of `jobs`, whatever order the jobs finished in.
/// Each job gets a thread of its own, so jobs overlap even on a single core.
#[instrument(skip_all, fields(path = %qct.path().display(), jobs = jobs.len()))]
pub fn export_all(qct: &QctFile, jobs: &[ExportJob]) -> Vec<ExportOutcome> {
    if jobs.is_empty() {
        return Vec::new();
    }
    let mut slots: Vec<Option<ExportOutcome>> = jobs.iter().map(|_| None).collect();
    let mut fan_out = || {
        rayon::scope(|scope| {
            for (job, slot) in jobs.iter().zip(slots.iter_mut()) {
                scope.spawn(move |_| *slot = Some(job.run(qct)));
            }
        });
    };
    match ThreadPoolBuilder::new()
        .num_threads(jobs.len())
        .thread_name(|i| format!("qctconv-export-{i}"))
        .build()
    {
        Ok(pool) => pool.install(fan_out),
        Err(e) => {
            warn!("Could not start export threads ({e}), using the global pool");
            fan_out();
        }
    }

    jobs.iter()
        .zip(slots)
        .map(|(job, slot)| {
            slot.unwrap_or_else(|| ExportOutcome {
                format: job.format(),
                destination: job.destination.clone(),
                result: Err(ExportError::Aborted("job did not complete".into())),
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "exporter panicked".to_owned())
}

/// Summary of a set of [`ExportOutcome`]s
#[derive(Debug, Default)]
pub struct ExportReport {
    outcomes: Vec<ExportOutcome>,
}

impl ExportReport {
    /// Creates a new [`ExportReport`]
    #[must_use]
    pub const fn new(outcomes: Vec<ExportOutcome>) -> Self {
        Self { outcomes }
    }

    /// Every outcome, in request order
    #[must_use]
    pub fn outcomes(&self) -> &[ExportOutcome] {
        &self.outcomes
    }

    /// Outcomes of the jobs that failed
    pub fn failures(&self) -> impl Iterator<Item = &ExportOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Returns `true` if no job failed. An empty report succeeds
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ExportOutcome::is_success)
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            writeln!(f, "{outcome}")?;
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} of {} exports succeeded",
            self.outcomes.len() - failed,
            self.outcomes.len()
        )
    }
}
