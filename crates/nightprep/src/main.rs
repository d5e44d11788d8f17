//! nightprep: enhance a directory of night-time camera frames and write
//! a feature-tracking exclusion mask for each one.
//!
//! Every frame in `INPUT_FOLDER` is gamma-corrected, contrast-equalized
//! on lightness, denoised, and paired with a binary mask marking glare,
//! deep shadow, and the bottom of the frame:
//!
//! ```text
//! OUTPUT_FOLDER/processed_images/<id>.<ext>
//! OUTPUT_FOLDER/masks/<id>.png
//! ```
//!
//! # Usage
//!
//! ```text
//! nightprep [OPTIONS] <INPUT_FOLDER> <OUTPUT_FOLDER>
//! ```
//!
//! Logging goes to stderr through `tracing`; `RUST_LOG` overrides the
//! level chosen by `--verbose`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nightprep_io::{DirectorySource, DiskSink, RunOptions};
use nightprep_pipeline::{Enhancer, PipelineConfig, TileGrid};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Enhance night-time frames and build exclusion masks for visual
/// odometry.
#[derive(Parser)]
#[command(name = "nightprep", version, arg_required_else_help = true)]
struct Cli {
    /// Directory of input frames (jpg, jpeg, png, bmp).
    input_folder: PathBuf,

    /// Directory to write `processed_images/` and `masks/` into.
    output_folder: PathBuf,

    /// Gamma exponent; below 1.0 brightens.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_GAMMA)]
    gamma: f64,

    /// CLAHE clip limit (0 disables clipping).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_CLIP_LIMIT)]
    clahe_clip_limit: f32,

    /// CLAHE tile columns.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_TILE_GRID.columns)]
    clahe_tile_columns: u32,

    /// CLAHE tile rows.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_TILE_GRID.rows)]
    clahe_tile_rows: u32,

    /// Bilateral filter window diameter in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BILATERAL_DIAMETER)]
    bilateral_diameter: u32,

    /// Bilateral filter color sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BILATERAL_SIGMA_COLOR)]
    bilateral_sigma_color: f32,

    /// Bilateral filter spatial sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BILATERAL_SIGMA_SPACE)]
    bilateral_sigma_space: f32,

    /// Luminance at or above which a pixel counts as saturated.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SAT_THR)]
    sat_thr: u8,

    /// Luminance at or below which a pixel counts as deep shadow.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DARK_THR)]
    dark_thr: u8,

    /// Square dilation size for the saturated mask (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DILATE_BRIGHT_K)]
    dilate_bright_k: u32,

    /// Square dilation size for the shadow mask (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DILATE_DARK_K)]
    dilate_dark_k: u32,

    /// Fraction of rows at the bottom of each frame to exclude.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BOTTOM_EXCLUSION_FRACTION)]
    bottom_exclusion_fraction: f64,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Do not log per-frame times or the closing timing summary.
    #[arg(long)]
    no_timing: bool,

    /// Log a per-stage report for every frame (shown with --verbose).
    #[arg(long)]
    diagnostics: bool,

    /// Write every frame's stage timings and mask coverage to this file
    /// as JSON. Implies --diagnostics.
    #[arg(long, value_name = "PATH")]
    diagnostics_json: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        gamma: cli.gamma,
        clahe_clip_limit: cli.clahe_clip_limit,
        clahe_tile_grid: TileGrid::new(cli.clahe_tile_columns, cli.clahe_tile_rows),
        bilateral_diameter: cli.bilateral_diameter,
        bilateral_sigma_color: cli.bilateral_sigma_color,
        bilateral_sigma_space: cli.bilateral_sigma_space,
        sat_thr: cli.sat_thr,
        dark_thr: cli.dark_thr,
        dilate_bright_k: cli.dilate_bright_k,
        dilate_dark_k: cli.dilate_dark_k,
        bottom_exclusion_fraction: cli.bottom_exclusion_fraction,
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let enhancer = match Enhancer::new(config) {
        Ok(e) => e,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("config: {:?}", enhancer.config());

    let source = match DirectorySource::open(&cli.input_folder) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut sink = match DiskSink::create(&cli.output_folder) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("input: {}", cli.input_folder.display());
    info!("images -> {}", sink.layout().images_dir().display());
    info!("masks  -> {}", sink.layout().masks_dir().display());

    let options = RunOptions {
        timing: !cli.no_timing,
        diagnostics: cli.diagnostics || cli.diagnostics_json.is_some(),
    };
    let summary = match nightprep_io::run(&source, &mut sink, &enhancer, options) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref path) = cli.diagnostics_json {
        if let Err(e) = summary.write_diagnostics_json(path) {
            error!("{e}");
            return ExitCode::FAILURE;
        }
        info!("diagnostics -> {}", path.display());
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nightprep").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_is_an_error() {
        assert!(Cli::try_parse_from(["nightprep"]).is_err());
    }

    #[test]
    fn flag_defaults_match_pipeline_defaults() {
        let cli = parse(&["in", "out"]);
        assert_eq!(config_from_cli(&cli).unwrap(), PipelineConfig::default());
        assert!(!cli.no_timing);
        assert!(!cli.diagnostics);
        assert!(cli.diagnostics_json.is_none());
    }

    #[test]
    fn diagnostics_json_takes_a_path() {
        let cli = parse(&["in", "out", "--diagnostics-json", "report.json"]);
        assert_eq!(cli.diagnostics_json, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "in",
            "out",
            "--sat-thr",
            "245",
            "--clahe-tile-columns",
            "4",
            "--bottom-exclusion-fraction",
            "0.1",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.sat_thr, 245);
        assert_eq!(config.clahe_tile_grid, TileGrid::new(4, 8));
        assert!((config.bottom_exclusion_fraction - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn config_json_wins_over_flags() {
        let cli = parse(&["in", "out", "--sat-thr", "200", "--config-json", r#"{"dark_thr": 12}"#]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.dark_thr, 12);
        assert_eq!(config.sat_thr, PipelineConfig::DEFAULT_SAT_THR);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = parse(&["in", "out", "--config-json", "{not json"]);
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.contains("--config-json"), "got: {err}");
    }
}
