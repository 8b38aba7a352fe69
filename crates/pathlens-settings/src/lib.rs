//! PathLens Settings Crate
//!
//! Viewer configuration: level-of-detail tiers, per-mode render styles,
//! picking, seeking and tooltip tunables, and their JSON/TOML persistence.

pub mod config;
pub mod error;

pub use config::{
    default_config_path, LodSettings, LodTier, ModeStyle, ModeStyles, ParserSettings,
    PickSettings, SeekSettings, TooltipSettings, ViewerConfig,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
