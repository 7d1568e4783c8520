//! # qctconv
//!
//! Converts QCT raster maps to open formats: GeoTIFF, KML ground overlays and PNG.
//!
//! Decoding is delegated to [`libqct`]. The requested exports then run concurrently against
//! the decoded file, see [`export::export_all`].

use std::{path::Path, sync::Arc};

use libqct::{ParseMode, QctFile, TileDecoder, Validity};
use tracing::{debug, info, instrument, warn};

pub mod export;

use export::{export_all, ExportReport, ExportRequests};

/// Decodes `qct_file`, logging what it describes
///
/// # Errors
///
/// Any [`libqct::Error`]; nothing should be exported when decoding fails
#[instrument]
pub fn decode(qct_file: &Path, mode: ParseMode) -> Result<QctFile, libqct::Error> {
    let qct = QctFile::parse(qct_file, mode)?;
    debug!("Read qct from file");

    let header = qct.header();
    let metadata = &header.metadata;
    info!(
        "{} ({}x{} pixels, version {:#x})",
        metadata.title.as_deref().unwrap_or("untitled map"),
        qct.width(),
        qct.height(),
        header.version
    );
    for (label, value) in [
        ("name", &metadata.name),
        ("edition", &metadata.edition),
        ("scale", &metadata.scale),
        ("datum", &metadata.datum),
        ("projection", &metadata.projection),
        ("copyright", &metadata.copyright),
    ] {
        if let Some(value) = value {
            info!("{label}: {value}");
        }
    }
    let [top_left, _, bottom_right, _] = qct.corners();
    info!(
        "extent: ({}, {}) to ({}, {})",
        top_left.latitude, top_left.longitude, bottom_right.latitude, bottom_right.longitude
    );
    if let Validity::Forced(issues) = qct.validity() {
        warn!(
            "{} was force decoded past {} failed checks, exports may be wrong",
            qct_file.display(),
            issues.len()
        );
    }
    Ok(qct)
}

/// Runs every export in `requests` against `qct` and waits for all of them
#[instrument(skip(qct, tiles))]
pub fn run_exports(
    qct: &QctFile,
    requests: ExportRequests,
    tiles: &Arc<dyn TileDecoder>,
) -> ExportReport {
    let jobs = requests.into_jobs(tiles);
    if jobs.is_empty() {
        info!("No export requested");
    }
    let report = ExportReport::new(export_all(qct, &jobs));
    info!(
        "{} of {} exports succeeded",
        report.outcomes().len() - report.failures().count(),
        report.outcomes().len()
    );
    report
}
