//! Distance-based level of detail
//!
//! The camera's distance to the toolpath's bounding center selects a tier.
//! Tier ranges are half open, `[min, max)`, so a distance exactly on a
//! boundary belongs to the farther tier.

use glam::DVec3;
use pathlens_settings::{LodSettings, LodTier};
use serde::Serialize;
use tracing::debug;

/// Result of one [`LodSystem::update`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LodUpdate {
    pub tier: usize,
    /// True only when the tier differs from the previous update
    pub changed: bool,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct LodSystem {
    tiers: Vec<LodTier>,
    active: Option<usize>,
    switches: u64,
}

impl LodSystem {
    /// Tiers are expected to be validated; an empty list falls back to the defaults.
    pub fn new(settings: &LodSettings) -> Self {
        let tiers = if settings.tiers.is_empty() {
            LodSettings::default().tiers
        } else {
            settings.tiers.clone()
        };
        Self {
            tiers,
            active: None,
            switches: 0,
        }
    }

    pub fn tiers(&self) -> &[LodTier] {
        &self.tiers
    }

    /// Tier for a distance. Negative or NaN distances map to the nearest tier.
    pub fn select_tier(&self, distance: f64) -> usize {
        if distance.is_nan() || distance < 0.0 {
            return 0;
        }
        self.tiers
            .iter()
            .position(|tier| tier.contains(distance))
            .unwrap_or(self.tiers.len().saturating_sub(1))
    }

    pub fn update(&mut self, camera_position: DVec3, model_center: DVec3) -> LodUpdate {
        let distance = camera_position.distance(model_center);
        let tier = self.select_tier(distance);
        let changed = self.active != Some(tier);
        if changed {
            debug!(
                "LOD tier {:?} -> {} at distance {:.1}",
                self.active, tier, distance
            );
            self.active = Some(tier);
            self.switches += 1;
        }
        LodUpdate {
            tier,
            changed,
            distance,
        }
    }

    pub fn active_tier(&self) -> Option<usize> {
        self.active
    }

    pub fn detail_fraction(&self, tier: usize) -> f64 {
        self.tiers.get(tier).map_or(1.0, |t| t.detail_fraction)
    }

    /// Number of tier changes since construction or the last reset.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Forget the active tier so the next update reapplies it.
    pub fn reset(&mut self) {
        self.active = None;
        self.switches = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> LodSystem {
        LodSystem::new(&LodSettings::default())
    }

    #[test]
    fn test_default_tier_boundaries() {
        let lod = system();
        assert_eq!(lod.select_tier(0.0), 0);
        assert_eq!(lod.select_tier(49.999), 0);
        assert_eq!(lod.select_tier(50.0), 1);
        assert_eq!(lod.select_tier(150.0), 2);
        assert_eq!(lod.select_tier(500.0), 3);
        assert_eq!(lod.select_tier(f64::INFINITY), 3);
        assert_eq!(lod.select_tier(-1.0), 0);
        assert_eq!(lod.select_tier(f64::NAN), 0);
    }

    #[test]
    fn test_update_only_changes_on_tier_switch() {
        let mut lod = system();
        let center = DVec3::ZERO;
        assert!(lod.update(DVec3::new(10.0, 0.0, 0.0), center).changed);
        assert!(!lod.update(DVec3::new(20.0, 0.0, 0.0), center).changed);
        let far = lod.update(DVec3::new(0.0, 0.0, 200.0), center);
        assert!(far.changed);
        assert_eq!(far.tier, 2);
        assert_eq!(lod.switches(), 2);
        assert_eq!(lod.detail_fraction(2), 0.3);
    }

    #[test]
    fn test_reset_reapplies() {
        let mut lod = system();
        lod.update(DVec3::ONE, DVec3::ZERO);
        lod.reset();
        assert!(lod.update(DVec3::ONE, DVec3::ZERO).changed);
    }
}
