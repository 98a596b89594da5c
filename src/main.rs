use clap::{Parser, Subcommand};
use crf_roundtrip::codec::{BackendChoice, Crf, native_available};
use crf_roundtrip::compress::Compressor;
use crf_roundtrip::config::{self, RoundTripConfig};
use crf_roundtrip::{batch, node, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crf-roundtrip")]
#[command(about = "Round-trip images through a single-frame video encode at a chosen CRF")]
#[command(long_about = "\
Round-trip images through a single-frame video encode at a chosen CRF

Each input image is encoded as a one-frame video at the given Constant Rate
Factor and decoded straight back, so the output carries the same compression
artifacts a video model sees on its conditioning frames.

Backends:
  native   In-process AV1 (rav1e + rav1d), no external tools needed
  ffmpeg   Shells out to ffmpeg (default encoder libx265)
  auto     native when compiled in, otherwise ffmpeg

Config is read from --config, or ./crf-roundtrip.toml when present.
Run 'crf-roundtrip gen-config' to generate a documented config file.
Set RUST_LOG (e.g. RUST_LOG=debug) for detailed logs.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./crf-roundtrip.toml if it exists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend override
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendChoice>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Round-trip a batch of images and write the results as PNG
    Compress {
        /// Image files or directories (searched recursively)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(long, short)]
        out: PathBuf,

        /// Constant Rate Factor: 0 (best) to 51 (worst)
        #[arg(long, allow_hyphen_values = true)]
        crf: Option<i32>,
    },
    /// Show which backend would run and whether ffmpeg responds
    Check,
    /// Print the node registration descriptor as JSON
    Describe,
    /// Print a stock crf-roundtrip.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Compress { inputs, out, crf } => {
            let mut cfg = resolve_config(cli.config.as_deref(), cli.backend)?;
            if let Some(crf) = crf {
                cfg.crf = Crf::new(crf);
            }

            let sources = batch::collect_inputs(&inputs)?;
            let images = batch::load_batch(&sources)?;

            let compressor = Compressor::new(cfg.select_backend()?);
            let report = compressor.compress_with_report(&images, cfg.crf)?;
            let written = batch::write_batch(&report.images, &sources, &out)?;

            output::print_compress_output(
                compressor.backend_name(),
                cfg.crf,
                &sources,
                &written,
                &report,
            );
        }
        Command::Check => {
            let cfg = resolve_config(cli.config.as_deref(), cli.backend)?;
            let ffmpeg = cfg.ffmpeg_backend();
            let status = output::BackendStatus {
                selected: cfg
                    .select_backend()
                    .map(|b| b.name())
                    .map_err(|e| e.to_string()),
                native_compiled: native_available(),
                ffmpeg_program: ffmpeg.program().to_path_buf(),
                ffmpeg_available: ffmpeg.is_available(),
            };
            output::print_check_output(&status);
            if let Err(e) = status.selected {
                return Err(e.into());
            }
        }
        Command::Describe => {
            println!("{}", node::descriptor_json()?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file (explicit or from the working directory) and apply
/// the `--backend` override.
fn resolve_config(
    path: Option<&Path>,
    backend: Option<BackendChoice>,
) -> Result<RoundTripConfig, config::ConfigError> {
    let mut cfg = match path {
        Some(path) => {
            if !path.exists() {
                return Err(config::ConfigError::Validation(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            config::load_config(path)?
        }
        None => config::load_config(Path::new("."))?,
    };
    if let Some(backend) = backend {
        cfg.backend = backend;
    }
    Ok(cfg)
}
