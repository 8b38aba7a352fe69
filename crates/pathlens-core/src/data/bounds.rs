use super::Point3;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Bounding box accumulator used while parsing toolpaths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3,
    pub max: Point3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new()
    }
}

impl Bounds {
    pub fn new() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    pub fn update(&mut self, p: Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
            // flat programs have min_z == max_z
            && self.min.z <= self.max.z
    }

    /// Center of the box, or the origin when nothing was accumulated.
    pub fn center(&self) -> Point3 {
        if !self.is_valid() {
            return Point3::ZERO;
        }
        self.min.lerp(self.max, 0.5)
    }

    pub fn size(&self) -> DVec3 {
        if !self.is_valid() {
            return DVec3::ZERO;
        }
        self.max.to_dvec3() - self.min.to_dvec3()
    }

    /// Expand each axis by `factor` of its extent (at least `min_padding`).
    pub fn padded(&self, factor: f64, min_padding: f64) -> Bounds {
        if !self.is_valid() {
            return *self;
        }
        let pad = (self.size() * factor).max(DVec3::splat(min_padding));
        Bounds {
            min: (self.min.to_dvec3() - pad).into(),
            max: (self.max.to_dvec3() + pad).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bounds_invalid() {
        let bounds = Bounds::new();
        assert!(!bounds.is_valid());
        assert_eq!(bounds.center(), Point3::ZERO);
    }

    #[test]
    fn test_flat_bounds_valid() {
        let mut bounds = Bounds::new();
        bounds.update(Point3::new(0.0, 0.0, 1.0));
        bounds.update(Point3::new(10.0, 4.0, 1.0));
        assert!(bounds.is_valid());
        assert_eq!(bounds.center(), Point3::new(5.0, 2.0, 1.0));

        let padded = bounds.padded(0.1, 0.5);
        assert_eq!(padded.min.z, 0.5);
        assert_eq!(padded.max.x, 11.0);
    }
}
