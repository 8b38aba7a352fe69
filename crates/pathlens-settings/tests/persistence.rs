use pathlens_settings::{ConfigError, LodTier, SettingsError, ViewerConfig};
use tempfile::tempdir;

#[test]
fn test_toml_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("viewer.toml");

    let mut config = ViewerConfig::default();
    config.parser.arc_segments = 48;
    config.styles.rapid.opacity = 0.2;
    config.save_to_file(&path).unwrap();

    let loaded = ViewerConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.lod.tiers.last().unwrap().max_distance, None);
}

#[test]
fn test_json_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("viewer.json");

    let mut config = ViewerConfig::default();
    config.lod.tiers = vec![
        LodTier::new(0.0, Some(100.0), 1.0),
        LodTier::new(100.0, None, 0.25),
    ];
    config.save_to_file(&path).unwrap();

    let loaded = ViewerConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.lod.tiers.len(), 2);
    assert_eq!(loaded.lod.tiers[1].detail_fraction, 0.25);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("viewer.toml");
    std::fs::write(&path, "[seek]\ndebounce_ms = 300\n").unwrap();

    let loaded = ViewerConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.seek.debounce_ms, 300);
    assert_eq!(loaded.parser.arc_segments, 32);
    assert_eq!(loaded.lod.tiers.len(), 4);
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("viewer.yaml");
    let err = ViewerConfig::default().save_to_file(&path).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("viewer.toml");
    std::fs::write(&path, "[parser]\narc_segments = 0\n").unwrap();

    let err = ViewerConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Config(_)));
}
