//! Configuration for the toolpath viewer
//!
//! Configuration is organized into logical sections:
//! - Parser settings (arc resolution, point tolerance)
//! - Level-of-detail tiers
//! - Per-mode render styles (colors, opacity, tube radius)
//! - Picking, seeking and tooltip tunables
//!
//! Files are stored as JSON or TOML, chosen by extension.

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use pathlens_core::constants::{DEFAULT_ARC_SEGMENTS, POINT_EPSILON};
use pathlens_core::MotionMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Parser settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Number of straight sub-segments per expanded arc
    pub arc_segments: u32,
    /// Moves shorter than this are not emitted
    pub point_tolerance: f64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            arc_segments: DEFAULT_ARC_SEGMENTS,
            point_tolerance: POINT_EPSILON,
        }
    }
}

/// One distance band of the level-of-detail system.
///
/// `min_distance` is inclusive, `max_distance` exclusive; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodTier {
    pub min_distance: f64,
    #[serde(default)]
    pub max_distance: Option<f64>,
    /// Fraction of full geometric detail, in `(0, 1]`
    pub detail_fraction: f64,
}

impl LodTier {
    pub fn new(min_distance: f64, max_distance: Option<f64>, detail_fraction: f64) -> Self {
        Self {
            min_distance,
            max_distance,
            detail_fraction,
        }
    }

    /// Upper bound, `+inf` for the open-ended last tier.
    pub fn max(&self) -> f64 {
        self.max_distance.unwrap_or(f64::INFINITY)
    }

    pub fn contains(&self, distance: f64) -> bool {
        distance >= self.min_distance && distance < self.max()
    }
}

/// Level-of-detail settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    pub tiers: Vec<LodTier>,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            tiers: vec![
                LodTier::new(0.0, Some(50.0), 1.0),
                LodTier::new(50.0, Some(150.0), 0.7),
                LodTier::new(150.0, Some(500.0), 0.3),
                LodTier::new(500.0, None, 0.1),
            ],
        }
    }
}

impl LodSettings {
    /// Tiers must start at zero, be contiguous, and end open-ended.
    pub fn validate(&self) -> ConfigResult<()> {
        let Some(first) = self.tiers.first() else {
            return Err(ConfigError::InvalidLodTiers("no tiers defined".into()));
        };
        if first.min_distance != 0.0 {
            return Err(ConfigError::InvalidLodTiers(format!(
                "first tier must start at 0, found {}",
                first.min_distance
            )));
        }

        let last_index = self.tiers.len() - 1;
        for (i, tier) in self.tiers.iter().enumerate() {
            if !(tier.detail_fraction > 0.0 && tier.detail_fraction <= 1.0) {
                return Err(ConfigError::InvalidLodTiers(format!(
                    "tier {} detail fraction {} not in (0, 1]",
                    i, tier.detail_fraction
                )));
            }
            if i == last_index {
                if tier.max_distance.is_some() {
                    return Err(ConfigError::InvalidLodTiers(
                        "last tier must be unbounded".into(),
                    ));
                }
                continue;
            }
            let Some(max) = tier.max_distance else {
                return Err(ConfigError::InvalidLodTiers(format!(
                    "tier {} is unbounded but not last",
                    i
                )));
            };
            if max <= tier.min_distance {
                return Err(ConfigError::InvalidLodTiers(format!(
                    "tier {} has empty range [{}, {})",
                    i, tier.min_distance, max
                )));
            }
            let next = &self.tiers[i + 1];
            if next.min_distance != max {
                return Err(ConfigError::InvalidLodTiers(format!(
                    "tier {} ends at {} but tier {} starts at {}",
                    i,
                    max,
                    i + 1,
                    next.min_distance
                )));
            }
        }
        Ok(())
    }
}

/// Render style for one motion mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeStyle {
    /// RGB color, 0.0..=1.0
    pub color: [f32; 3],
    /// 0.0 = invisible, 1.0 = opaque
    pub opacity: f32,
    /// Tube radius in machine units
    pub radius: f64,
}

impl ModeStyle {
    pub fn rgba(&self) -> [f32; 4] {
        [self.color[0], self.color[1], self.color[2], self.opacity]
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

/// Per-mode render styles, looked up by motion mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeStyles {
    pub rapid: ModeStyle,
    pub linear: ModeStyle,
    pub arc_cw: ModeStyle,
    pub arc_ccw: ModeStyle,
    /// Radial resolution of the tube primitive at full detail
    pub base_radial_segments: u32,
}

impl Default for ModeStyles {
    fn default() -> Self {
        Self {
            rapid: ModeStyle {
                color: [0.95, 0.35, 0.25],
                opacity: 0.35,
                radius: 0.05,
            },
            linear: ModeStyle {
                color: [0.20, 0.60, 1.00],
                opacity: 1.0,
                radius: 0.1,
            },
            arc_cw: ModeStyle {
                color: [0.25, 0.85, 0.40],
                opacity: 1.0,
                radius: 0.1,
            },
            arc_ccw: ModeStyle {
                color: [0.95, 0.80, 0.20],
                opacity: 1.0,
                radius: 0.1,
            },
            base_radial_segments: 8,
        }
    }
}

impl ModeStyles {
    pub fn for_mode(&self, mode: MotionMode) -> &ModeStyle {
        match mode {
            MotionMode::Rapid => &self.rapid,
            MotionMode::Linear => &self.linear,
            MotionMode::ArcCw => &self.arc_cw,
            MotionMode::ArcCcw => &self.arc_ccw,
        }
    }
}

/// Point picking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickSettings {
    /// Queries closer together than this are dropped
    pub debounce_ms: u64,
    /// Lifetime of a cached query result
    pub cache_ttl_ms: u64,
    /// Cache size that triggers eviction
    pub cache_capacity: usize,
    /// Bucket size in normalized device coordinates
    pub quantization: f64,
    /// Radius of the invisible pick sphere at each segment start
    pub pick_radius: f64,
}

impl Default for PickSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 16,
            cache_ttl_ms: 100,
            cache_capacity: 64,
            quantization: 0.01,
            pick_radius: 0.5,
        }
    }
}

impl PickSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Scrub/seek settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekSettings {
    /// Quiet period after the last seek before the scene is recomputed
    pub debounce_ms: u64,
}

impl Default for SeekSettings {
    fn default() -> Self {
        Self { debounce_ms: 150 }
    }
}

impl SeekSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Tooltip layout settings, in screen pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipSettings {
    pub offset_x: f32,
    pub offset_y: f32,
    /// Minimum distance from the viewport edges
    pub margin: f32,
    pub char_width: f32,
    pub line_height: f32,
    pub padding: f32,
    pub max_width: f32,
    /// Delay before a tooltip hides after the pointer leaves the toolpath
    pub hide_delay_ms: u64,
}

impl TooltipSettings {
    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }
}

impl Default for TooltipSettings {
    fn default() -> Self {
        Self {
            offset_x: 15.0,
            offset_y: 15.0,
            margin: 10.0,
            char_width: 7.0,
            line_height: 16.0,
            padding: 8.0,
            max_width: 360.0,
            hide_delay_ms: 150,
        }
    }
}

/// Complete viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub parser: ParserSettings,
    pub lod: LodSettings,
    pub styles: ModeStyles,
    pub picking: PickSettings,
    pub seek: SeekSettings,
    pub tooltip: TooltipSettings,
}

impl ViewerConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into())
            }
        };

        config.validate()?;
        debug!("Loaded viewer config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into())
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.parser.arc_segments == 0 || self.parser.arc_segments > 4096 {
            return Err(out_of_range("parser.arc_segments", self.parser.arc_segments));
        }
        if !(self.parser.point_tolerance >= 0.0) {
            return Err(out_of_range(
                "parser.point_tolerance",
                self.parser.point_tolerance,
            ));
        }

        self.lod.validate()?;

        for mode in MotionMode::ALL {
            let style = self.styles.for_mode(mode);
            let word = mode.command_word();
            if !(0.0..=1.0).contains(&style.opacity) {
                return Err(out_of_range(
                    &format!("styles.{}.opacity", word),
                    style.opacity,
                ));
            }
            if !(style.radius > 0.0) {
                return Err(out_of_range(&format!("styles.{}.radius", word), style.radius));
            }
        }
        if self.styles.base_radial_segments < 3 {
            return Err(out_of_range(
                "styles.base_radial_segments",
                self.styles.base_radial_segments,
            ));
        }

        if self.picking.cache_ttl_ms == 0 {
            return Err(out_of_range("picking.cache_ttl_ms", 0));
        }
        if self.picking.cache_capacity == 0 {
            return Err(out_of_range("picking.cache_capacity", 0));
        }
        if !(self.picking.quantization > 0.0) {
            return Err(out_of_range(
                "picking.quantization",
                self.picking.quantization,
            ));
        }
        if !(self.picking.pick_radius > 0.0) {
            return Err(out_of_range("picking.pick_radius", self.picking.pick_radius));
        }

        if self.tooltip.margin < 0.0 {
            return Err(out_of_range("tooltip.margin", self.tooltip.margin));
        }
        if self.tooltip.max_width <= 0.0 {
            return Err(out_of_range("tooltip.max_width", self.tooltip.max_width));
        }

        Ok(())
    }
}

/// Default location of the viewer config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("pathlens").join("viewer.toml"))
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ViewerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_lod_tier_bounds() {
        let tier = LodTier::new(50.0, Some(150.0), 0.7);
        assert!(tier.contains(50.0));
        assert!(!tier.contains(150.0));
        assert!(LodTier::new(500.0, None, 0.1).contains(1e12));
    }

    #[test]
    fn test_lod_gap_rejected() {
        let lod = LodSettings {
            tiers: vec![
                LodTier::new(0.0, Some(10.0), 1.0),
                LodTier::new(20.0, None, 0.5),
            ],
        };
        assert!(matches!(
            lod.validate(),
            Err(ConfigError::InvalidLodTiers(_))
        ));
    }

    #[test]
    fn test_lod_bounded_last_tier_rejected() {
        let lod = LodSettings {
            tiers: vec![LodTier::new(0.0, Some(10.0), 1.0)],
        };
        assert!(lod.validate().is_err());
    }

    #[test]
    fn test_invalid_opacity_rejected() {
        let mut config = ViewerConfig::default();
        config.styles.rapid.opacity = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_style_lookup_by_mode() {
        let styles = ModeStyles::default();
        assert!(styles.for_mode(MotionMode::Rapid).is_transparent());
        assert!(!styles.for_mode(MotionMode::Linear).is_transparent());
        assert_eq!(styles.for_mode(MotionMode::ArcCw).rgba()[3], 1.0);
    }
}
