//! Command-line front end.
//!
//! ```text
//! fiber_cli map <POLYLINE> <FIBER> <CONFIG> <POLY_RADIUS> <OUTPUT>
//!     [--cache-pattern] [--report <PATH>]
//! fiber_cli tile <FIBER> <NUM_STRANDS> <Z_STEP_SIZE> <Z_STEP_NUM> <OUTPUT>
//! ```

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fiber_fabric::geom::TileParams;
use fiber_fabric::{ConversionPaths, ConvertOptions, convert_files, tile_file};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fiber_cli")]
#[command(about = "Map fiber-level yarn models onto fabric polylines", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach a fiber model to every strand of a polyline
    Map {
        /// Polyline file, one `x y z` point per line
        polyline: PathBuf,
        /// Base fiber pattern covering one period
        fiber: PathBuf,
        /// Yarn config (yarn_radius, z_step_size, z_step_num)
        config: PathBuf,
        /// Yarn radius the polyline is drawn for
        #[arg(allow_negative_numbers = true)]
        poly_radius: f64,
        /// Output fiber file
        output: PathBuf,
        /// Read the fiber pattern once instead of once per strand
        #[arg(long)]
        cache_pattern: bool,
        /// Write a JSON summary of the run
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Repeat a fiber pattern along its z axis
    Tile {
        /// Base fiber pattern covering one period
        fiber: PathBuf,
        /// Number of periods to emit
        num_strands: usize,
        /// Distance between z samples
        z_step_size: f64,
        /// Number of z samples per period
        z_step_num: f64,
        /// Output fiber file
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Map {
            polyline,
            fiber,
            config,
            poly_radius,
            output,
            cache_pattern,
            report,
        } => {
            log::info!(
                "attaching {} to {} (config {}, radius {poly_radius})",
                fiber.display(),
                polyline.display(),
                config.display()
            );
            log::info!("saving to {}", output.display());
            let paths = ConversionPaths {
                polyline: &polyline,
                fiber: &fiber,
                config: &config,
                output: &output,
            };
            let summary = convert_files(paths, poly_radius, ConvertOptions { cache_pattern })
                .map_err(|e| e.to_string())?;
            log::info!("{summary}");

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&summary)
                    .map_err(|e| format!("serialize report: {e}"))?;
                fs::write(&path, json).map_err(|e| format!("write {}: {e}", path.display()))?;
                eprintln!("wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Tile {
            fiber,
            num_strands,
            z_step_size,
            z_step_num,
            output,
        } => {
            log::info!(
                "duplicating {} into {num_strands} strands (step {z_step_size} x {z_step_num})",
                fiber.display()
            );
            let params = TileParams::new(z_step_size, z_step_num).map_err(|e| e.to_string())?;
            let points =
                tile_file(&fiber, num_strands, params, &output).map_err(|e| e.to_string())?;
            log::info!("wrote {points} points to {}", output.display());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("fiber_cli error: {err}");
        std::process::exit(1);
    }
}
