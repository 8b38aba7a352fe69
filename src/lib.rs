//! # PathLens
//!
//! Core of an interactive 3D toolpath viewer:
//! - G-code parsing with modal state and circular arc expansion
//! - Instanced cylinder geometry batched per motion mode
//! - Distance-based level of detail and material-sorted draw ordering
//! - Ray-cast point picking with tooltip layout
//! - Debounced scrub seeking
//!
//! ## Architecture
//!
//! PathLens is organized as a workspace with multiple crates:
//!
//! 1. **pathlens-core** - Toolpath data model, bounds, error taxonomy
//! 2. **pathlens-settings** - Viewer configuration and persistence
//! 3. **pathlens-visualizer** - Parser, geometry, picking, session
//! 4. **pathlens** - Inspection binary that drives a headless session

pub mod compiler;
pub mod inspect;

pub use pathlens_core::{
    Bounds, CompileError, Error, LoadError, ModeCounts, MotionMode, ParseError, Point3,
    RenderError, Result, Segment,
};

pub use pathlens_settings::{default_config_path, ViewerConfig};

pub use pathlens_visualizer::{
    Camera, FrameStats, HeadlessBackend, ParsedToolpath, PointRecord, SessionState,
    ToolpathParser, ToolpathStats, ViewerSession, ViewportRect,
};

pub use compiler::ProcessCompiler;
pub use inspect::{InspectError, InspectOptions, InspectReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr so reports on stdout stay machine readable
/// - RUST_LOG environment variable support
/// - JSON lines instead of pretty output when `json` is set
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    if json {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_line_number(true)
            .pretty();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
