//! One-shot toolpath inspection
//!
//! Drives a [`ViewerSession`] on the headless backend the way a viewer
//! would for a single frame: load, fit the camera, optionally scrub and
//! hover, then draw once and collect what a UI would display.

use pathlens_core::LoadError;
use pathlens_settings::{ConfigError, ViewerConfig};
use pathlens_visualizer::visualizer::TooltipRect;
use pathlens_visualizer::{
    Camera, Compiler, FrameStats, HeadlessBackend, PointRecord, SeekUpdate, ToolpathStats,
    ViewerSession, ViewportRect,
};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InspectError {
    #[error("invalid viewer config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Where to hover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickTarget {
    Screen { x: f64, y: f64 },
    /// Start point of a segment, projected with the fitted camera
    Segment(usize),
}

#[derive(Debug, Clone)]
pub struct InspectOptions {
    pub width: f64,
    pub height: f64,
    pub pick: Option<PickTarget>,
    /// Scrub position in `[0, 1]`
    pub seek: Option<f64>,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            pick: None,
            seek: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PickReport {
    pub screen: (f64, f64),
    pub record: Option<PointRecord>,
    pub tooltip: Option<TooltipRect>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub stats: ToolpathStats,
    pub warnings: Vec<String>,
    pub frame: FrameStats,
    pub seek: Option<SeekUpdate>,
    /// Tool position at the seek index
    pub seek_point: Option<PointRecord>,
    pub pick: Option<PickReport>,
}

/// Load `text` (compiled first when a compiler is given) and render one frame.
pub fn inspect(
    config: ViewerConfig,
    compiler: Option<&dyn Compiler>,
    bytes: &[u8],
    options: &InspectOptions,
) -> Result<InspectReport, InspectError> {
    let started = Instant::now();
    let mut session = ViewerSession::new(config, HeadlessBackend::new())?;

    let stats = match compiler {
        Some(compiler) => {
            let source =
                pathlens_visualizer::ToolpathParser::decode(bytes).map_err(LoadError::from)?;
            session.load_source(compiler, source, started)?
        }
        None => session.load_bytes(bytes, started)?,
    };
    let warnings = session
        .toolpath()
        .map(|t| t.warnings.iter().map(|w| w.to_string()).collect())
        .unwrap_or_default();

    let mut camera = Camera::default();
    if let Some(toolpath) = session.toolpath() {
        camera.fit_to_bounds(&toolpath.bounds);
    }
    camera.update_aspect_ratio(options.width as f32, options.height as f32);
    let view = camera.view_state(ViewportRect::sized(options.width, options.height));

    let mut now = started;
    let seek = match options.seek {
        Some(position) => {
            session.seek(position, now);
            session.commit_seek()
        }
        None => None,
    };
    let seek_point = seek
        .and(session.seek_record())
        .map(|record| (**record).clone());

    let pick = match options.pick {
        Some(target) => {
            let screen = match target {
                PickTarget::Screen { x, y } => Some((x, y)),
                PickTarget::Segment(index) => session
                    .toolpath()
                    .and_then(|t| t.segments.get(index))
                    .and_then(|s| view.world_to_screen(s.start.to_dvec3())),
            };
            screen.map(|(x, y)| {
                debug!("Probing pick at ({:.1}, {:.1})", x, y);
                let record = session.pointer_moved(x, y, now, &view);
                PickReport {
                    screen: (x, y),
                    record: record.map(|r| (*r).clone()),
                    tooltip: session.tooltip().rect(),
                    lines: session.tooltip().lines().to_vec(),
                }
            })
        }
        None => None,
    };

    now += Duration::from_millis(1);
    let frame = session.frame(now, &view).map_err(LoadError::from)?;
    info!(
        "Inspection finished: {} draw calls, {} instances, took {:?}",
        frame.draw_calls,
        frame.instances_drawn,
        started.elapsed()
    );
    session.dispose();

    Ok(InspectReport {
        stats,
        warnings,
        frame,
        seek,
        seek_point,
        pick,
    })
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "Segments:      {} ({})", s.segment_count, s.mode_counts)?;
        writeln!(f, "Total length:  {:.3}", s.total_length)?;
        writeln!(f, "Rapid length:  {:.3}", s.rapid_length)?;
        writeln!(f, "Cut length:    {:.3}", s.cutting_length)?;
        if let Some(b) = &s.bounds {
            writeln!(f, "Bounds:        {} .. {}", b.min, b.max)?;
        }
        writeln!(
            f,
            "Frame:         LOD tier {}, {} draw calls, {} state changes ({} unsorted), {} instances",
            self.frame.lod_tier,
            self.frame.draw_calls,
            self.frame.state_changes,
            self.frame.unsorted_state_changes,
            self.frame.instances_drawn
        )?;
        if let Some(seek) = &self.seek {
            writeln!(f, "Seek:          {} segments shown ({})", seek.index, seek.counts)?;
        }
        if let Some(point) = &self.seek_point {
            writeln!(f, "Tool at:       {} ({})", point.display.coordinates, point.display.title)?;
        }
        if let Some(pick) = &self.pick {
            match &pick.record {
                Some(_) => {
                    writeln!(f, "Pick at ({:.1}, {:.1}):", pick.screen.0, pick.screen.1)?;
                    for line in &pick.lines {
                        writeln!(f, "  {}", line)?;
                    }
                }
                None => writeln!(
                    f,
                    "Pick at ({:.1}, {:.1}): nothing under cursor",
                    pick.screen.0, pick.screen.1
                )?,
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  {}", warning)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathlens_visualizer::PassthroughCompiler;

    const PROGRAM: &[u8] = b"G0 Z5\nG0 X10 Y10\nG1 Z-1 F300\nG1 X30 Y10\nG2 X40 Y20 I0 J10\nG1 X40 Y40 Q\n";

    #[test]
    fn test_inspect_reports_stats_and_frame() {
        let report = inspect(
            ViewerConfig::default(),
            None,
            PROGRAM,
            &InspectOptions::default(),
        )
        .unwrap();
        assert_eq!(report.stats.segment_count, 4 + 32 + 1);
        assert_eq!(report.frame.instances_drawn, report.stats.segment_count);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.to_string().contains("Segments:"));
    }

    #[test]
    fn test_inspect_pick_on_segment() {
        let options = InspectOptions {
            pick: Some(PickTarget::Segment(3)),
            ..InspectOptions::default()
        };
        let report = inspect(
            ViewerConfig::default(),
            Some(&PassthroughCompiler),
            PROGRAM,
            &options,
        )
        .unwrap();
        let pick = report.pick.unwrap();
        let record = pick.record.unwrap();
        assert_eq!(record.segment_index, 3);
        assert_eq!(record.raw_line.as_deref(), Some("G1 X30 Y10"));
        assert!(!pick.lines.is_empty());
        assert!(pick.tooltip.is_some());
    }

    #[test]
    fn test_inspect_seek_limits_frame() {
        let options = InspectOptions {
            seek: Some(0.0),
            ..InspectOptions::default()
        };
        let report = inspect(ViewerConfig::default(), None, PROGRAM, &options).unwrap();
        assert_eq!(report.seek.map(|s| s.index), Some(0));
        assert!(report.seek_point.is_none());
        assert_eq!(report.frame.instances_drawn, 0);
    }

    #[test]
    fn test_inspect_seek_reports_tool_position() {
        let options = InspectOptions {
            seek: Some(1.0),
            ..InspectOptions::default()
        };
        let report = inspect(ViewerConfig::default(), None, PROGRAM, &options).unwrap();
        let point = report.seek_point.as_ref().unwrap();
        assert_eq!(point.segment_index, report.stats.segment_count - 1);
        assert_eq!(point.raw_line.as_deref(), Some("G1 X40 Y40 Q"));
        assert!(report.to_string().contains("Tool at:"));
    }

    #[test]
    fn test_inspect_uses_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        let mut config = ViewerConfig::default();
        config.parser.arc_segments = 8;
        config.save_to_file(&path).unwrap();

        let loaded = ViewerConfig::load_from_file(&path).unwrap();
        let report = inspect(loaded, None, PROGRAM, &InspectOptions::default()).unwrap();
        assert_eq!(report.stats.segment_count, 4 + 8 + 1);
    }

    #[test]
    fn test_inspect_rejects_invalid_config() {
        let mut config = ViewerConfig::default();
        config.picking.cache_capacity = 0;
        let err = inspect(config, None, PROGRAM, &InspectOptions::default()).unwrap_err();
        assert!(matches!(err, InspectError::Config(_)));
    }

    #[test]
    fn test_inspect_empty_program() {
        let err = inspect(
            ViewerConfig::default(),
            None,
            b"; nothing\n",
            &InspectOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, InspectError::Load(LoadError::NothingToDisplay { lines: 1 }));
    }
}
