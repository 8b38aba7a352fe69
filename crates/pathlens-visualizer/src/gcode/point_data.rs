//! Point data extraction for inspection tooltips
//!
//! Re-parses a single source line for its numeric parameters and derives
//! arc figures for circular moves. Every field degrades to a placeholder
//! instead of failing, so a tooltip can always be produced.

use super::arc::ArcSpec;
use super::tokenizer::strip_comments;
use pathlens_core::constants::UNAVAILABLE;
use pathlens_core::{MotionMode, Point3};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;

/// Parameter letters recognised in a source line, in display order.
const PARAM_LETTERS: [char; 9] = ['X', 'Y', 'Z', 'I', 'J', 'K', 'R', 'F', 'S'];

fn param_patterns() -> &'static [(char, Regex)] {
    static PATTERNS: OnceLock<Vec<(char, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PARAM_LETTERS
            .iter()
            .filter_map(|&letter| {
                let pattern = format!(r"(?i)(?:^|[^A-Z]){}\s*([-+]?(?:\d+\.?\d*|\.\d+))", letter);
                match Regex::new(&pattern) {
                    Ok(regex) => Some((letter, regex)),
                    Err(e) => {
                        warn!("Skipping parameter {}: bad pattern: {}", letter, e);
                        None
                    }
                }
            })
            .collect()
    })
}

/// Start and end of the whole arc command a picked segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArcSpan {
    pub start: Point3,
    pub end: Point3,
}

/// Arc-derived values for display; absent fields could not be computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArcDisplayInfo {
    pub radius: Option<f64>,
    pub arc_length: Option<f64>,
    /// Signed sweep in radians, negative for clockwise
    pub sweep_angle: Option<f64>,
    pub center: Option<Point3>,
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub r: Option<f64>,
}

/// Ray-cast intersection data joined onto a record by the point detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PickHit {
    pub distance: f64,
    pub world_point: Point3,
}

/// Display-ready strings for a tooltip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayStrings {
    pub title: String,
    pub coordinates: String,
    pub command: String,
    pub arc: Option<String>,
    pub technical: String,
}

impl DisplayStrings {
    /// Tooltip lines, top to bottom.
    pub fn lines(&self) -> Vec<&str> {
        let mut lines = vec![
            self.title.as_str(),
            self.coordinates.as_str(),
            self.command.as_str(),
        ];
        if let Some(arc) = &self.arc {
            lines.push(arc.as_str());
        }
        lines.push(self.technical.as_str());
        lines
    }
}

/// Everything known about one picked toolpath point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRecord {
    pub segment_index: usize,
    pub coordinates: Point3,
    pub mode: MotionMode,
    pub source_line_index: usize,
    pub raw_line: Option<String>,
    pub parameters: BTreeMap<char, f64>,
    pub arc_info: Option<ArcDisplayInfo>,
    pub display: DisplayStrings,
    pub hit: Option<PickHit>,
}

impl PointRecord {
    pub fn parameter(&self, letter: char) -> Option<f64> {
        self.parameters.get(&letter.to_ascii_uppercase()).copied()
    }

    pub fn with_hit(mut self, hit: PickHit) -> Self {
        self.hit = Some(hit);
        self
    }
}

/// Builds [`PointRecord`]s from pick results.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointDataExtractor;

impl PointDataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Numeric parameters present on a single line, comments excluded.
    pub fn parse_parameters(&self, line: &str) -> BTreeMap<char, f64> {
        let cleaned = strip_comments(line);
        let mut params = BTreeMap::new();
        for (letter, regex) in param_patterns() {
            let value = regex
                .captures_iter(&cleaned)
                .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .last();
            if let Some(value) = value {
                params.insert(*letter, value);
            }
        }
        params
    }

    /// Build a record for a picked point.
    ///
    /// `arc_span` carries the endpoints of the full arc command when the
    /// segment came from arc expansion; without it only the radius can be
    /// derived.
    pub fn extract(
        &self,
        segment_index: usize,
        coordinates: Point3,
        mode: MotionMode,
        line_index: usize,
        raw_lines: &[String],
        arc_span: Option<ArcSpan>,
    ) -> PointRecord {
        let raw_line = raw_lines.get(line_index).cloned();
        let parameters = raw_line
            .as_deref()
            .map(|line| self.parse_parameters(line))
            .unwrap_or_default();

        let arc_info = mode
            .is_arc()
            .then(|| arc_display_info(&parameters, mode, arc_span));

        let display = DisplayStrings {
            title: format!("{} ({})", mode, mode.command_word()),
            coordinates: format_coordinates(coordinates),
            command: format_command(raw_line.as_deref(), mode, coordinates),
            arc: arc_info.as_ref().map(format_arc),
            technical: format_technical(line_index, raw_line.is_some(), segment_index, &parameters),
        };

        PointRecord {
            segment_index,
            coordinates,
            mode,
            source_line_index: line_index,
            raw_line,
            parameters,
            arc_info,
            display,
            hit: None,
        }
    }
}

fn arc_display_info(
    params: &BTreeMap<char, f64>,
    mode: MotionMode,
    span: Option<ArcSpan>,
) -> ArcDisplayInfo {
    let i = params.get(&'I').copied();
    let j = params.get(&'J').copied();
    let k = params.get(&'K').copied();
    let r = params.get(&'R').copied();
    let mut info = ArcDisplayInfo {
        i,
        j,
        k,
        r,
        ..Default::default()
    };

    let clockwise = mode == MotionMode::ArcCw;
    let spec = span.and_then(|span| {
        if i.is_some() || j.is_some() {
            ArcSpec::from_offsets(
                span.start,
                span.end,
                i.unwrap_or(0.0),
                j.unwrap_or(0.0),
                clockwise,
            )
            .ok()
        } else {
            r.and_then(|r| ArcSpec::from_radius(span.start, span.end, r, clockwise).ok())
        }
    });

    match spec {
        Some(spec) => {
            info.radius = Some(spec.radius);
            info.arc_length = Some(spec.length());
            info.sweep_angle = Some(spec.sweep_angle);
            info.center = Some(spec.center);
        }
        None => {
            info.radius = match (i, j, r) {
                (None, None, Some(r)) => Some(r.abs()),
                (None, None, None) => None,
                _ => Some(i.unwrap_or(0.0).hypot(j.unwrap_or(0.0))),
            };
        }
    }
    info
}

fn format_coordinates(p: Point3) -> String {
    if p.is_finite() {
        format!("X: {:.2}  Y: {:.2}  Z: {:.2}", p.x, p.y, p.z)
    } else {
        format!("Coordinates: {}", UNAVAILABLE)
    }
}

fn format_command(raw_line: Option<&str>, mode: MotionMode, p: Point3) -> String {
    match raw_line.map(str::trim).filter(|l| !l.is_empty()) {
        Some(line) => line.to_string(),
        None if p.is_finite() => format!(
            "{} X{:.3} Y{:.3} Z{:.3}",
            mode.command_word(),
            p.x,
            p.y,
            p.z
        ),
        None => format!("{} (source {})", mode.command_word(), UNAVAILABLE),
    }
}

fn format_arc(info: &ArcDisplayInfo) -> String {
    let num = |v: Option<f64>, unit: &str| match v {
        Some(v) => format!("{:.3}{}", v, unit),
        None => UNAVAILABLE.to_string(),
    };
    let mut s = format!(
        "Radius: {}  Length: {}  Sweep: {}",
        num(info.radius, ""),
        num(info.arc_length, ""),
        num(info.sweep_angle, " rad")
    );
    for (letter, value) in [('I', info.i), ('J', info.j), ('K', info.k), ('R', info.r)] {
        if let Some(v) = value {
            s.push_str(&format!("  {}{:.3}", letter, v));
        }
    }
    s
}

fn format_technical(
    line_index: usize,
    line_known: bool,
    segment_index: usize,
    params: &BTreeMap<char, f64>,
) -> String {
    let mut s = if line_known {
        format!("Line {} | Segment {}", line_index + 1, segment_index)
    } else {
        format!("Line {} | Segment {}", UNAVAILABLE, segment_index)
    };
    if let Some(f) = params.get(&'F') {
        s.push_str(&format!(" | F{}", f));
    }
    if let Some(sp) = params.get(&'S') {
        s.push_str(&format!(" | S{}", sp));
    }
    s
}
