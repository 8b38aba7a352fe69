//! Circular arc reconstruction in the XY plane
//!
//! Arcs are resolved from either center offsets (`I`/`J`, relative to the
//! start point) or a signed radius (`R`), then expanded into a polyline.
//! Z is interpolated linearly, which also covers helical moves.

use pathlens_core::constants::{ARC_RADIUS_SLACK, POINT_EPSILON};
use pathlens_core::Point3;
use std::f64::consts::TAU;
use thiserror::Error;

/// Why an arc could not be resolved.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ArcError {
    #[error("arc radius is zero")]
    ZeroRadius,

    #[error("radius arc start and end coincide, center is undefined")]
    ZeroChord,

    #[error("chord {chord:.4} is longer than the diameter {diameter:.4}")]
    ChordTooLong { chord: f64, diameter: f64 },

    #[error("arc geometry is not finite")]
    NonFinite,
}

/// A resolved arc, used only while expanding into segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSpec {
    /// Center in the XY plane; `z` holds the start height
    pub center: Point3,
    pub radius: f64,
    pub clockwise: bool,
    pub start_angle: f64,
    /// Negative for clockwise, positive for counter-clockwise
    pub sweep_angle: f64,
    pub start: Point3,
    pub end: Point3,
}

impl ArcSpec {
    /// Resolve from `I`/`J` offsets relative to `start`.
    ///
    /// Coincident start and end points describe a full circle.
    pub fn from_offsets(
        start: Point3,
        end: Point3,
        i: f64,
        j: f64,
        clockwise: bool,
    ) -> Result<Self, ArcError> {
        Self::from_offsets_within(start, end, i, j, clockwise, POINT_EPSILON)
    }

    /// Like [`ArcSpec::from_offsets`], treating an end point within
    /// `tolerance` of the start (in XY) as a full circle.
    pub fn from_offsets_within(
        start: Point3,
        end: Point3,
        i: f64,
        j: f64,
        clockwise: bool,
        tolerance: f64,
    ) -> Result<Self, ArcError> {
        let center = Point3::new(start.x + i, start.y + j, start.z);
        let radius = i.hypot(j);
        if !radius.is_finite() || !center.is_finite() || !end.is_finite() {
            return Err(ArcError::NonFinite);
        }
        if radius <= POINT_EPSILON {
            return Err(ArcError::ZeroRadius);
        }
        Ok(Self::from_center(
            start,
            end,
            center,
            radius,
            clockwise,
            tolerance.max(POINT_EPSILON),
        ))
    }

    /// Resolve from a signed radius.
    ///
    /// The center lies to the right of the start→end chord for a clockwise
    /// arc and to the left for a counter-clockwise arc when `radius > 0`,
    /// which selects the minor arc. A negative radius mirrors the center and
    /// selects the major arc.
    pub fn from_radius(
        start: Point3,
        end: Point3,
        radius: f64,
        clockwise: bool,
    ) -> Result<Self, ArcError> {
        if !radius.is_finite() || !start.is_finite() || !end.is_finite() {
            return Err(ArcError::NonFinite);
        }
        let r = radius.abs();
        if r <= POINT_EPSILON {
            return Err(ArcError::ZeroRadius);
        }

        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let chord = dx.hypot(dy);
        if chord <= POINT_EPSILON {
            return Err(ArcError::ZeroChord);
        }

        let half = chord / 2.0;
        if half > r * (1.0 + ARC_RADIUS_SLACK) {
            return Err(ArcError::ChordTooLong {
                chord,
                diameter: 2.0 * r,
            });
        }

        let h = (r * r - half * half).max(0.0).sqrt();
        let mut side = if clockwise { 1.0 } else { -1.0 };
        if radius < 0.0 {
            side = -side;
        }
        // (dy, -dx) points to the right of the direction of travel
        let cx = start.x + dx / 2.0 + side * h * dy / chord;
        let cy = start.y + dy / 2.0 - side * h * dx / chord;

        Ok(Self::from_center(
            start,
            end,
            Point3::new(cx, cy, start.z),
            r,
            clockwise,
            POINT_EPSILON,
        ))
    }

    fn from_center(
        start: Point3,
        end: Point3,
        center: Point3,
        radius: f64,
        clockwise: bool,
        tolerance: f64,
    ) -> Self {
        let start_angle = (start.y - center.y).atan2(start.x - center.x);
        let end_angle = (end.y - center.y).atan2(end.x - center.x);
        let mut sweep = end_angle - start_angle;

        // Rounding can leave the end of a full circle a hair to either side
        // of the start, so closeness decides and not the raw angle
        let closed = (end.x - start.x).hypot(end.y - start.y) <= tolerance;
        if closed {
            sweep = if clockwise { -TAU } else { TAU };
        } else if clockwise {
            if sweep >= 0.0 {
                sweep -= TAU;
            }
        } else if sweep <= 0.0 {
            sweep += TAU;
        }

        Self {
            center,
            radius,
            clockwise,
            start_angle,
            sweep_angle: sweep,
            start,
            end,
        }
    }

    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.sweep_angle
    }

    /// Planar arc length.
    pub fn planar_length(&self) -> f64 {
        self.sweep_angle.abs() * self.radius
    }

    /// Path length including the helical Z component.
    pub fn length(&self) -> f64 {
        self.planar_length().hypot(self.end.z - self.start.z)
    }

    /// Polyline with `segments + 1` points.
    ///
    /// The first and last points are exactly the declared start and end.
    pub fn interpolate(&self, segments: u32) -> Vec<Point3> {
        let n = segments.max(1);
        let mut points = Vec::with_capacity(n as usize + 1);
        points.push(self.start);
        for k in 1..n {
            let t = k as f64 / n as f64;
            let angle = self.start_angle + self.sweep_angle * t;
            points.push(Point3::new(
                self.center.x + self.radius * angle.cos(),
                self.center.y + self.radius * angle.sin(),
                self.start.z + (self.end.z - self.start.z) * t,
            ));
        }
        points.push(self.end);
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_offset_semicircle_clockwise() {
        let arc = ArcSpec::from_offsets(
            Point3::ZERO,
            Point3::new(10.0, 0.0, 0.0),
            5.0,
            0.0,
            true,
        )
        .unwrap();
        assert_eq!(arc.center, Point3::new(5.0, 0.0, 0.0));
        assert_eq!(arc.radius, 5.0);
        assert!((arc.sweep_angle + PI).abs() < EPS);

        // clockwise from (0,0) around (5,0) passes over the top
        let mid = arc.interpolate(2)[1];
        assert!(mid.approx_eq(Point3::new(5.0, 5.0, 0.0), 1e-9));
    }

    #[test]
    fn test_offset_full_circle() {
        let start = Point3::new(10.0, 0.0, 0.0);
        let cw = ArcSpec::from_offsets(start, start, -10.0, 0.0, true).unwrap();
        assert!((cw.sweep_angle + TAU).abs() < EPS);
        let ccw = ArcSpec::from_offsets(start, start, -10.0, 0.0, false).unwrap();
        assert!((ccw.sweep_angle - TAU).abs() < EPS);
        assert!((ccw.planar_length() - TAU * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearly_closed_circle_is_full_in_both_directions() {
        let start = Point3::new(0.3, 0.3, 0.0);
        // 0.1 + 0.2 lands just past 0.3
        let end = Point3::new(0.1 + 0.2, 0.1 + 0.2, 0.0);
        assert_ne!(start, end);
        for (a, b) in [(start, end), (end, start)] {
            let cw = ArcSpec::from_offsets(a, b, -1.0, 0.0, true).unwrap();
            assert!((cw.sweep_angle + TAU).abs() < EPS);
            let ccw = ArcSpec::from_offsets(a, b, -1.0, 0.0, false).unwrap();
            assert!((ccw.sweep_angle - TAU).abs() < EPS);
        }
    }

    #[test]
    fn test_radius_minor_and_major_arc() {
        let start = Point3::ZERO;
        let end = Point3::new(10.0, 0.0, 0.0);

        let minor = ArcSpec::from_radius(start, end, 10.0, true).unwrap();
        assert!(minor.center.y < 0.0);
        assert!(minor.sweep_angle.abs() < PI);

        let major = ArcSpec::from_radius(start, end, -10.0, true).unwrap();
        assert!(major.center.y > 0.0);
        assert!(major.sweep_angle.abs() > PI);
        assert!(major.sweep_angle < 0.0);

        let ccw_minor = ArcSpec::from_radius(start, end, 10.0, false).unwrap();
        assert!(ccw_minor.center.y > 0.0);
        assert!(ccw_minor.sweep_angle > 0.0 && ccw_minor.sweep_angle < PI);
    }

    #[test]
    fn test_radius_semicircle_center_on_chord() {
        let arc = ArcSpec::from_radius(Point3::ZERO, Point3::new(10.0, 0.0, 0.0), 5.0, true)
            .unwrap();
        assert!(arc.center.approx_eq(Point3::new(5.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_radius_chord_too_long() {
        let err = ArcSpec::from_radius(Point3::ZERO, Point3::new(100.0, 0.0, 0.0), 1.0, true)
            .unwrap_err();
        assert!(matches!(err, ArcError::ChordTooLong { .. }));
    }

    #[test]
    fn test_zero_radius_and_chord() {
        assert_eq!(
            ArcSpec::from_offsets(Point3::ZERO, Point3::new(1.0, 0.0, 0.0), 0.0, 0.0, true),
            Err(ArcError::ZeroRadius)
        );
        assert_eq!(
            ArcSpec::from_radius(Point3::ZERO, Point3::ZERO, 5.0, true),
            Err(ArcError::ZeroChord)
        );
    }

    #[test]
    fn test_helical_interpolation() {
        let arc = ArcSpec::from_offsets(
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(-10.0, 0.0, -4.0),
            -10.0,
            0.0,
            false,
        )
        .unwrap();
        let points = arc.interpolate(4);
        assert_eq!(points.len(), 5);
        assert_eq!(points[2].z, -2.0);
        assert_eq!(points[4], Point3::new(-10.0, 0.0, -4.0));
        assert!((arc.length() - (PI * 10.0).hypot(4.0)).abs() < 1e-9);
    }
}
