use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::Parser;
use libqct::{ParseMode, TileDecoder, UnsupportedTiles};
use qctconv::{
    decode,
    export::{ExportRequests, GeoTiffOptions, GeorefMethod, DEFAULT_GCP_GRID},
    run_exports,
};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::EnvFilter;

#[cfg(not(debug_assertions))]
const DEFAULT_DEBUG_LEVEL: u8 = 1;
#[cfg(debug_assertions)]
const DEFAULT_DEBUG_LEVEL: u8 = 99;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, default_value_t = DEFAULT_DEBUG_LEVEL, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// The QCT map
    qct_file: PathBuf,

    /// Path to optional .kml export
    #[arg(long)]
    export_kml_path: Option<PathBuf>,

    /// Path to optional GeoTIFF (.tiff) export
    #[arg(long)]
    export_geotiff_path: Option<PathBuf>,

    /// Path to optional .png export
    #[arg(long)]
    export_png_path: Option<PathBuf>,

    /// Decode files failing validation checks
    #[arg(long)]
    force: bool,

    /// Georeferencing tags of the GeoTIFF export
    #[arg(long, value_enum, default_value_t = GeorefMethod::Automatic)]
    georef_method: GeorefMethod,

    /// Ground control points per axis of the GeoTIFF export
    #[arg(long, default_value_t = DEFAULT_GCP_GRID, value_parser = clap::value_parser!(u32).range(2..))]
    gcp_grid: u32,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .init();

    let mode = if cli.force {
        ParseMode::Force
    } else {
        ParseMode::Strict
    };
    let qct = decode(&cli.qct_file, mode)?;

    let requests = ExportRequests::builder()
        .maybe_geotiff(cli.export_geotiff_path)
        .geotiff_options(
            GeoTiffOptions::builder()
                .method(cli.georef_method)
                .gcp_grid(cli.gcp_grid)
                .build(),
        )
        .maybe_kml(cli.export_kml_path)
        .maybe_png(cli.export_png_path)
        .build();
    let tiles: Arc<dyn TileDecoder> = Arc::new(UnsupportedTiles);
    let report = run_exports(&qct, requests, &tiles);

    for outcome in report.outcomes() {
        println!("{outcome}");
    }
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
