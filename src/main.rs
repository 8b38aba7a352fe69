use anyhow::{bail, Context, Result};
use clap::Parser;
use pathlens::inspect::{inspect, InspectOptions, PickTarget};
use pathlens::{default_config_path, init_logging, ProcessCompiler, ViewerConfig, BUILD_DATE};
use pathlens_visualizer::Compiler;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

/// Inspect a G-code toolpath the way the viewer renders it.
#[derive(Parser, Debug)]
#[command(name = "pathlens", version, long_version = LONG_VERSION)]
struct Args {
    /// G-code file, or source file when --compiler is given
    input: PathBuf,

    /// Viewer config (.toml or .json); defaults to the user config if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command that reads source on stdin and writes G-code on stdout
    #[arg(long)]
    compiler: Option<String>,

    /// Hover at a screen coordinate
    #[arg(long, num_args = 2, value_names = ["X", "Y"], conflicts_with = "pick_segment")]
    pick: Option<Vec<f64>>,

    /// Hover over the start point of a segment
    #[arg(long)]
    pick_segment: Option<usize>,

    /// Scrub position in [0, 1]
    #[arg(long)]
    seek: Option<f64>,

    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    #[arg(long, default_value_t = 720.0)]
    height: f64,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn load_config(explicit: Option<&Path>) -> Result<ViewerConfig> {
    if let Some(path) = explicit {
        return ViewerConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => match ViewerConfig::load_from_file(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Ok(ViewerConfig::default())
            }
        },
        _ => Ok(ViewerConfig::default()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json)?;
    debug!("pathlens {} built {}", pathlens::VERSION, BUILD_DATE);

    if !(args.width > 0.0 && args.height > 0.0) {
        bail!("viewport must have a positive size, got {}x{}", args.width, args.height);
    }

    let config = load_config(args.config.as_deref())?;
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let compiler = match args.compiler.as_deref() {
        Some(command) => Some(
            ProcessCompiler::from_command_line(command)
                .with_context(|| format!("invalid compiler command '{}'", command))?,
        ),
        None => None,
    };

    let pick = match (args.pick.as_deref(), args.pick_segment) {
        (Some([x, y]), _) => Some(PickTarget::Screen { x: *x, y: *y }),
        (Some(other), _) => bail!("--pick takes two values, got {}", other.len()),
        (None, Some(index)) => Some(PickTarget::Segment(index)),
        (None, None) => None,
    };
    let options = InspectOptions {
        width: args.width,
        height: args.height,
        pick,
        seek: args.seek,
    };

    let report = inspect(
        config,
        compiler.as_ref().map(|c| c as &dyn Compiler),
        &bytes,
        &options,
    )
    .with_context(|| format!("failed to load {}", args.input.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
