//! Toolpath parser with modal state tracking
//!
//! Converts G-code text into an ordered list of straight segments. Motion
//! mode (G0-G3) and distance mode (G90/G91) are modal; axes that a line does
//! not mention keep their previous value. Arcs are expanded into polylines.
//!
//! Problems with individual lines never abort the parse: they are logged,
//! recorded as [`ParseWarning`]s, and the line is skipped.

use super::arc::{ArcError, ArcSpec};
use super::tokenizer::{tokenize, TokenizedLine};
use pathlens_core::constants::{DEFAULT_ARC_SEGMENTS, POINT_EPSILON};
use pathlens_core::{Bounds, ModeCounts, MotionMode, ParseError, Point3, Segment};
use pathlens_settings::ParserSettings;
use serde::Serialize;
use tracing::{debug, trace, warn};

/// Category of a recoverable per-line problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarningKind {
    /// A token that is not a letter followed by a number
    MalformedToken(String),
    /// Arc center or radius cannot produce a valid arc
    DegenerateArc(ArcError),
    /// Arc with neither I/J offsets nor an R radius
    MissingArcCenter,
}

/// A recoverable problem on one source line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    /// Zero-based source line index
    pub line_index: usize,
    pub kind: ParseWarningKind,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let line = self.line_index + 1;
        match &self.kind {
            ParseWarningKind::MalformedToken(token) => {
                write!(f, "line {}: ignoring malformed token '{}'", line, token)
            }
            ParseWarningKind::DegenerateArc(err) => {
                write!(f, "line {}: skipping arc, {}", line, err)
            }
            ParseWarningKind::MissingArcCenter => {
                write!(f, "line {}: skipping arc without I/J or R", line)
            }
        }
    }
}

/// Aggregate figures for a statistics panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolpathStats {
    pub segment_count: usize,
    pub mode_counts: ModeCounts,
    pub total_length: f64,
    pub rapid_length: f64,
    pub cutting_length: f64,
    pub bounds: Option<Bounds>,
    pub warning_count: usize,
}

/// Output of a parse.
#[derive(Debug, Clone, Default)]
pub struct ParsedToolpath {
    pub segments: Vec<Segment>,
    pub mode_counts: ModeCounts,
    /// `line_map[i]` is the source line of `segments[i]`
    pub line_map: Vec<usize>,
    /// Every source line, unmodified, indexed by source line index
    pub raw_lines: Vec<String>,
    pub warnings: Vec<ParseWarning>,
    pub bounds: Bounds,
    /// Position after the last line
    pub final_position: Point3,
}

impl ParsedToolpath {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn raw_line(&self, line_index: usize) -> Option<&str> {
        self.raw_lines.get(line_index).map(String::as_str)
    }

    pub fn stats(&self) -> ToolpathStats {
        let mut rapid_length = 0.0;
        let mut cutting_length = 0.0;
        for segment in &self.segments {
            if segment.mode.is_cutting() {
                cutting_length += segment.length();
            } else {
                rapid_length += segment.length();
            }
        }
        ToolpathStats {
            segment_count: self.segments.len(),
            mode_counts: self.mode_counts,
            total_length: rapid_length + cutting_length,
            rapid_length,
            cutting_length,
            bounds: self.bounds.is_valid().then_some(self.bounds),
            warning_count: self.warnings.len(),
        }
    }
}

/// Modal state carried from line to line.
#[derive(Debug, Clone, Copy)]
struct ModalState {
    mode: MotionMode,
    absolute: bool,
    position: Point3,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            mode: MotionMode::Linear,
            absolute: true,
            position: Point3::ZERO,
        }
    }
}

/// G-code toolpath parser
#[derive(Debug, Clone)]
pub struct ToolpathParser {
    arc_segments: u32,
    point_tolerance: f64,
}

impl Default for ToolpathParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolpathParser {
    pub fn new() -> Self {
        Self {
            arc_segments: DEFAULT_ARC_SEGMENTS,
            point_tolerance: POINT_EPSILON,
        }
    }

    pub fn with_settings(settings: &ParserSettings) -> Self {
        Self {
            arc_segments: settings.arc_segments.max(1),
            point_tolerance: settings.point_tolerance.max(0.0),
        }
    }

    pub fn arc_segments(&self) -> u32 {
        self.arc_segments
    }

    /// Check that raw bytes are text and borrow them as `&str`.
    pub fn decode(bytes: &[u8]) -> Result<&str, ParseError> {
        if let Some(offset) = bytes.iter().position(|b| *b == 0) {
            return Err(ParseError::BinaryData { offset });
        }
        std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })
    }

    /// Parse raw bytes, rejecting input that is not text.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParsedToolpath, ParseError> {
        Ok(self.parse(Self::decode(bytes)?))
    }

    /// Parse G-code text into segments.
    pub fn parse(&self, text: &str) -> ParsedToolpath {
        debug!("Starting toolpath parse, input size: {} bytes", text.len());

        let mut out = ParsedToolpath::default();
        let mut state = ModalState::default();

        for (line_index, line) in text.lines().enumerate() {
            out.raw_lines.push(line.to_string());

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let tokens = tokenize(trimmed);
            for token in &tokens.malformed {
                warn!("Line {}: malformed token '{}'", line_index + 1, token);
                out.warnings.push(ParseWarning {
                    line_index,
                    kind: ParseWarningKind::MalformedToken(token.clone()),
                });
            }

            self.parse_line(&tokens, line_index, &mut state, &mut out);
        }

        out.final_position = state.position;
        debug!(
            "Parse complete: {} segments ({}), {} warnings",
            out.segments.len(),
            out.mode_counts,
            out.warnings.len()
        );
        out
    }

    fn parse_line(
        &self,
        tokens: &TokenizedLine,
        line_index: usize,
        state: &mut ModalState,
        out: &mut ParsedToolpath,
    ) {
        let mut mode_token = None;
        for word in tokens.words.iter().filter(|w| w.letter == 'G') {
            match word.code() {
                Some(code @ 0..=3) => mode_token = MotionMode::from_gcode(code),
                Some(90) => state.absolute = true,
                Some(91) => state.absolute = false,
                _ => {}
            }
        }

        let has_axes = tokens.has('X') || tokens.has('Y') || tokens.has('Z');
        if let Some(mode) = mode_token {
            state.mode = mode;
        }
        if !has_axes {
            trace!("Line {}: no motion", line_index + 1);
            return;
        }

        let start = state.position;
        let target = self.resolve_target(tokens, state);

        match state.mode {
            MotionMode::Rapid | MotionMode::Linear => {
                if start.distance(target) > self.point_tolerance {
                    self.push_segment(out, Segment::new(start, target, state.mode, line_index));
                }
                state.position = target;
            }
            MotionMode::ArcCw | MotionMode::ArcCcw => {
                let clockwise = state.mode == MotionMode::ArcCw;
                match resolve_arc(tokens, start, target, clockwise, self.point_tolerance) {
                    Ok(arc) => {
                        trace!(
                            "Arc: from={}, to={}, center={}, radius={:.4}, sweep={:.4}",
                            start,
                            target,
                            arc.center,
                            arc.radius,
                            arc.sweep_angle
                        );
                        let points = arc.interpolate(self.arc_segments);
                        for pair in points.windows(2) {
                            if pair[0].distance(pair[1]) > self.point_tolerance {
                                self.push_segment(
                                    out,
                                    Segment::new(pair[0], pair[1], state.mode, line_index),
                                );
                            }
                        }
                        state.position = target;
                    }
                    Err(kind) => {
                        let warning = ParseWarning { line_index, kind };
                        warn!("{}", warning);
                        out.warnings.push(warning);
                    }
                }
            }
        }
    }

    fn resolve_target(&self, tokens: &TokenizedLine, state: &ModalState) -> Point3 {
        let pos = state.position;
        let axis = |letter: char, current: f64| match tokens.last(letter) {
            Some(v) if state.absolute => v,
            Some(v) => current + v,
            None => current,
        };
        Point3::new(axis('X', pos.x), axis('Y', pos.y), axis('Z', pos.z))
    }

    fn push_segment(&self, out: &mut ParsedToolpath, segment: Segment) {
        out.bounds.update(segment.start);
        out.bounds.update(segment.end);
        out.mode_counts.increment(segment.mode);
        out.line_map.push(segment.source_line_index);
        out.segments.push(segment);
    }
}

fn resolve_arc(
    tokens: &TokenizedLine,
    start: Point3,
    end: Point3,
    clockwise: bool,
    tolerance: f64,
) -> Result<ArcSpec, ParseWarningKind> {
    let i = tokens.last('I');
    let j = tokens.last('J');
    if i.is_some() || j.is_some() {
        return ArcSpec::from_offsets_within(
            start,
            end,
            i.unwrap_or(0.0),
            j.unwrap_or(0.0),
            clockwise,
            tolerance,
        )
        .map_err(ParseWarningKind::DegenerateArc);
    }
    match tokens.last('R') {
        Some(r) => {
            ArcSpec::from_radius(start, end, r, clockwise).map_err(ParseWarningKind::DegenerateArc)
        }
        None => Err(ParseWarningKind::MissingArcCenter),
    }
}
