//! Shared constants for toolpath reconstruction and inspection.

/// Default number of straight sub-segments an arc is expanded into.
pub const DEFAULT_ARC_SEGMENTS: u32 = 32;

/// Distance below which two points are treated as the same position.
pub const POINT_EPSILON: f64 = 1e-9;

/// Relative slack allowed when a radius-format arc chord slightly exceeds the diameter.
pub const ARC_RADIUS_SLACK: f64 = 1e-7;

/// Padding applied to bounds when fitting the camera (fraction of extent).
pub const VIEW_PADDING: f64 = 0.05;

/// Placeholder shown whenever a display field cannot be produced.
pub const UNAVAILABLE: &str = "unavailable";
