//! Data models for toolpath geometry
//!
//! This module provides:
//! - Positions in machine units (`Point3`)
//! - Modal motion state (`MotionMode`)
//! - The atomic renderable/pickable unit of a toolpath (`Segment`)
//! - Per-mode segment tallies (`ModeCounts`)
//! - Axis-aligned bounds accumulation (`Bounds`)

mod bounds;

pub use bounds::Bounds;

use crate::constants::POINT_EPSILON;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion mode selected by the G0/G1/G2/G3 modal group.
///
/// The mode persists across lines until another mode word appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    /// Rapid positioning (G0)
    Rapid,
    /// Linear interpolation (G1)
    Linear,
    /// Clockwise arc (G2)
    ArcCw,
    /// Counter-clockwise arc (G3)
    ArcCcw,
}

impl MotionMode {
    /// All modes in G-code number order.
    pub const ALL: [MotionMode; 4] = [
        MotionMode::Rapid,
        MotionMode::Linear,
        MotionMode::ArcCw,
        MotionMode::ArcCcw,
    ];

    /// Map a G-code number (0-3) to a motion mode.
    pub fn from_gcode(number: u32) -> Option<Self> {
        match number {
            0 => Some(Self::Rapid),
            1 => Some(Self::Linear),
            2 => Some(Self::ArcCw),
            3 => Some(Self::ArcCcw),
            _ => None,
        }
    }

    /// Dense index, usable for per-mode arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Rapid => 0,
            Self::Linear => 1,
            Self::ArcCw => 2,
            Self::ArcCcw => 3,
        }
    }

    /// Canonical command word, e.g. `G2`.
    pub fn command_word(self) -> &'static str {
        match self {
            Self::Rapid => "G0",
            Self::Linear => "G1",
            Self::ArcCw => "G2",
            Self::ArcCcw => "G3",
        }
    }

    pub fn is_arc(self) -> bool {
        matches!(self, Self::ArcCw | Self::ArcCcw)
    }

    /// True for every mode that removes material.
    pub fn is_cutting(self) -> bool {
        !matches!(self, Self::Rapid)
    }

    /// Human-readable description of the mode
    pub fn description(self) -> &'static str {
        match self {
            Self::Rapid => "Rapid positioning (G0)",
            Self::Linear => "Linear interpolation (G1)",
            Self::ArcCw => "Clockwise arc (G2)",
            Self::ArcCcw => "Counter-clockwise arc (G3)",
        }
    }
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rapid => write!(f, "Rapid"),
            Self::Linear => write!(f, "Linear"),
            Self::ArcCw => write!(f, "Arc CW"),
            Self::ArcCcw => write!(f, "Arc CCW"),
        }
    }
}

/// A position in machine units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ZERO: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    pub fn distance(self, other: Point3) -> f64 {
        self.to_dvec3().distance(other.to_dvec3())
    }

    /// Linear interpolation, `t = 0` yields `self`.
    pub fn lerp(self, other: Point3, t: f64) -> Point3 {
        self.to_dvec3().lerp(other.to_dvec3(), t).into()
    }

    /// Component-wise comparison within an absolute tolerance.
    pub fn approx_eq(self, other: Point3, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<DVec3> for Point3 {
    fn from(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Point3> for DVec3 {
    fn from(p: Point3) -> Self {
        p.to_dvec3()
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// A straight 3D piece of the toolpath.
///
/// Immutable once created; the ordered sequence of segments is the toolpath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point3,
    pub end: Point3,
    pub mode: MotionMode,
    /// Zero-based index of the source line that produced this segment.
    pub source_line_index: usize,
}

impl Segment {
    pub fn new(start: Point3, end: Point3, mode: MotionMode, source_line_index: usize) -> Self {
        Self {
            start,
            end,
            mode,
            source_line_index,
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn midpoint(&self) -> Point3 {
        self.start.lerp(self.end, 0.5)
    }

    /// Unit direction from start to end, `None` for zero-length segments.
    pub fn direction(&self) -> Option<DVec3> {
        let delta = self.end.to_dvec3() - self.start.to_dvec3();
        if delta.length() <= POINT_EPSILON {
            None
        } else {
            Some(delta.normalize())
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.direction().is_none()
    }
}

/// Number of segments per motion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeCounts {
    counts: [usize; 4],
}

impl ModeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally a slice of segments.
    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut counts = Self::new();
        for segment in segments {
            counts.increment(segment.mode);
        }
        counts
    }

    #[inline]
    pub fn increment(&mut self, mode: MotionMode) {
        self.counts[mode.index()] += 1;
    }

    #[inline]
    pub fn get(&self, mode: MotionMode) -> usize {
        self.counts[mode.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(mode, count)` pairs in G-code number order.
    pub fn iter(&self) -> impl Iterator<Item = (MotionMode, usize)> + '_ {
        MotionMode::ALL.iter().map(move |mode| (*mode, self.get(*mode)))
    }
}

impl fmt::Display for ModeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "G0={}, G1={}, G2={}, G3={}",
            self.get(MotionMode::Rapid),
            self.get(MotionMode::Linear),
            self.get(MotionMode::ArcCw),
            self.get(MotionMode::ArcCcw)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_mode_from_gcode() {
        assert_eq!(MotionMode::from_gcode(0), Some(MotionMode::Rapid));
        assert_eq!(MotionMode::from_gcode(3), Some(MotionMode::ArcCcw));
        assert_eq!(MotionMode::from_gcode(4), None);
    }

    #[test]
    fn test_segment_direction_and_degenerate() {
        let seg = Segment::new(
            Point3::ZERO,
            Point3::new(0.0, 0.0, 2.0),
            MotionMode::Linear,
            0,
        );
        assert_eq!(seg.direction(), Some(DVec3::Z));
        assert_eq!(seg.length(), 2.0);
        assert_eq!(seg.midpoint(), Point3::new(0.0, 0.0, 1.0));

        let point = Segment::new(Point3::ZERO, Point3::ZERO, MotionMode::Rapid, 0);
        assert!(point.is_degenerate());
    }

    #[test]
    fn test_mode_counts() {
        let mut counts = ModeCounts::new();
        counts.increment(MotionMode::Linear);
        counts.increment(MotionMode::Linear);
        counts.increment(MotionMode::ArcCw);
        assert_eq!(counts.get(MotionMode::Linear), 2);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.to_string(), "G0=0, G1=2, G2=1, G3=0");
    }
}
