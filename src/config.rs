use std::path::{Path, PathBuf};
use std::time::Duration;

#[allow(unused_imports)]
use log::{debug, warn};

use crate::atlas::{AtlasLayout, AtlasStore};
use crate::settings::UserSettings;

// Default values for configuration
// These serve as fallback values when the settings file leaves a field out
pub const DEFAULT_ASSET_SUBDIR: &str = "assets/Troggle";
pub const DEFAULT_BODY_ATLAS_FILE: &str = "switch-body.png";
pub const DEFAULT_BODY_COLUMNS: u32 = 5;
pub const DEFAULT_BODY_ROWS: u32 = 2;
pub const DEFAULT_SWITCH_ATLAS_FILE: &str = "Switch.png";
pub const DEFAULT_SWITCH_COLUMNS: u32 = 3;
pub const DEFAULT_SWITCH_ROWS: u32 = 2;
pub const DEFAULT_ANIMATION_INTERVAL_MS: u64 = 10;
pub const DEFAULT_ANIMATION_STEP_PX: i32 = 4;

/// Knob animation pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationConfig {
    pub interval: Duration,     // Timer period between steps
    pub step_px: i32,           // Pixels moved per step
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_ANIMATION_INTERVAL_MS),
            step_px: DEFAULT_ANIMATION_STEP_PX,
        }
    }
}

/// Runtime configuration resolved from user settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub asset_dir: PathBuf,
    pub body_atlas: AtlasLayout,
    pub switch_atlas: AtlasLayout,
    pub animation: AnimationConfig,
}

impl Config {
    pub fn from_settings(settings: &UserSettings) -> Self {
        let asset_dir = match &settings.asset_dir {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_asset_dir(),
        };

        let step_px = if settings.animation_step_px > 0 {
            settings.animation_step_px
        } else {
            warn!("Ignoring animation step {}, using {}", settings.animation_step_px, DEFAULT_ANIMATION_STEP_PX);
            DEFAULT_ANIMATION_STEP_PX
        };

        let interval_ms = if settings.animation_interval_ms > 0 {
            settings.animation_interval_ms
        } else {
            warn!("Ignoring animation interval {}ms, using {}ms", settings.animation_interval_ms, DEFAULT_ANIMATION_INTERVAL_MS);
            DEFAULT_ANIMATION_INTERVAL_MS
        };

        Self {
            body_atlas: AtlasLayout::new(
                asset_dir.join(&settings.body_atlas.file),
                settings.body_atlas.columns,
                settings.body_atlas.rows,
            ),
            switch_atlas: AtlasLayout::new(
                asset_dir.join(&settings.switch_atlas.file),
                settings.switch_atlas.columns,
                settings.switch_atlas.rows,
            ),
            asset_dir,
            animation: AnimationConfig {
                interval: Duration::from_millis(interval_ms),
                step_px,
            },
        }
    }

    /// Settings from the default location, resolved.
    pub fn load() -> Self {
        Self::from_settings(&UserSettings::load(None))
    }

    /// A fresh, not yet loaded, atlas store for this configuration.
    pub fn atlas_store(&self) -> AtlasStore {
        AtlasStore::new(self.body_atlas.clone(), self.switch_atlas.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(&UserSettings::default())
    }
}

/// Assets live next to the running executable.
pub fn default_asset_dir() -> PathBuf {
    let module_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    module_dir.join(DEFAULT_ASSET_SUBDIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_layout() {
        let config = Config::default();
        assert!(config.asset_dir.ends_with(DEFAULT_ASSET_SUBDIR));
        assert_eq!(config.body_atlas.path, config.asset_dir.join("switch-body.png"));
        assert_eq!((config.body_atlas.columns, config.body_atlas.rows), (5, 2));
        assert_eq!(config.switch_atlas.path, config.asset_dir.join("Switch.png"));
        assert_eq!((config.switch_atlas.columns, config.switch_atlas.rows), (3, 2));
        assert_eq!(config.animation, AnimationConfig::default());
        assert_eq!(config.animation.interval, Duration::from_millis(10));
        assert_eq!(config.animation.step_px, 4);
    }

    #[test]
    fn test_settings_override_and_sanitize() {
        let settings = UserSettings {
            asset_dir: Some("/opt/skins".to_string()),
            animation_step_px: 0,
            animation_interval_ms: 16,
            ..UserSettings::default()
        };
        let config = Config::from_settings(&settings);

        assert_eq!(config.asset_dir, PathBuf::from("/opt/skins"));
        assert_eq!(config.switch_atlas.path, PathBuf::from("/opt/skins/Switch.png"));
        assert_eq!(config.animation.step_px, DEFAULT_ANIMATION_STEP_PX);
        assert_eq!(config.animation.interval, Duration::from_millis(16));
    }
}
