use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use log::{debug, info, warn, error};

use crate::config::{
    DEFAULT_ANIMATION_INTERVAL_MS, DEFAULT_ANIMATION_STEP_PX, DEFAULT_BODY_ATLAS_FILE,
    DEFAULT_BODY_COLUMNS, DEFAULT_BODY_ROWS, DEFAULT_SWITCH_ATLAS_FILE, DEFAULT_SWITCH_COLUMNS,
    DEFAULT_SWITCH_ROWS,
};

/// File name and grid of one atlas sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasSettings {
    pub file: String,
    pub columns: u32,
    pub rows: u32,
}

/// User-specific settings that persist across sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Directory holding the atlas sheets; next to the executable when unset
    #[serde(default)]
    pub asset_dir: Option<String>,

    /// Body (track) sheet
    #[serde(default = "default_body_atlas")]
    pub body_atlas: AtlasSettings,

    /// Switch (knob) sheet
    #[serde(default = "default_switch_atlas")]
    pub switch_atlas: AtlasSettings,

    /// Milliseconds between animation steps
    #[serde(default = "default_animation_interval_ms")]
    pub animation_interval_ms: u64,

    /// Pixels the knob moves per step
    #[serde(default = "default_animation_step_px")]
    pub animation_step_px: i32,
}

fn default_body_atlas() -> AtlasSettings {
    AtlasSettings {
        file: DEFAULT_BODY_ATLAS_FILE.to_string(),
        columns: DEFAULT_BODY_COLUMNS,
        rows: DEFAULT_BODY_ROWS,
    }
}

fn default_switch_atlas() -> AtlasSettings {
    AtlasSettings {
        file: DEFAULT_SWITCH_ATLAS_FILE.to_string(),
        columns: DEFAULT_SWITCH_COLUMNS,
        rows: DEFAULT_SWITCH_ROWS,
    }
}

fn default_animation_interval_ms() -> u64 {
    DEFAULT_ANIMATION_INTERVAL_MS
}

fn default_animation_step_px() -> i32 {
    DEFAULT_ANIMATION_STEP_PX
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            asset_dir: None,
            body_atlas: default_body_atlas(),
            switch_atlas: default_switch_atlas(),
            animation_interval_ms: default_animation_interval_ms(),
            animation_step_px: default_animation_step_px(),
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/Troggle/settings.yaml
    /// On Linux: ~/.config/Troggle/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\Troggle\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("Troggle").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&str>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p);
                PathBuf::from(p)
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                error!("Failed to parse settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }),
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        let settings = serde_yaml::from_str::<UserSettings>(contents)?;
        debug!(
            "Settings: asset_dir={:?}, interval={}ms, step={}px",
            settings.asset_dir, settings.animation_interval_ms, settings.animation_step_px
        );
        Ok(settings)
    }

    /// Write the settings as a commented YAML file, creating the parent directory
    pub fn save(&self, custom_path: Option<&str>) -> Result<PathBuf, String> {
        let path = custom_path.map(PathBuf::from).unwrap_or_else(Self::settings_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        fs::write(&path, self.to_yaml_with_comments())
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        let asset_dir = match &self.asset_dir {
            Some(dir) => format!("{:?}", dir),
            None => "null".to_string(),
        };

        format!(
            r#"# Troggle Settings
# Loaded when the toggle host starts. Fields left out fall back to defaults.

# Directory containing the atlas sheets (null = assets/Troggle next to the executable)
asset_dir: {}

# Body sheet: one tile per body style, split into a columns x rows grid
body_atlas:
  file: {:?}
  columns: {}
  rows: {}

# Switch (knob) sheet: one tile per knob style
# The knob travels the width of tile 0 when switched on
switch_atlas:
  file: {:?}
  columns: {}
  rows: {}

# Milliseconds between knob animation steps
animation_interval_ms: {}

# Pixels the knob moves per step
animation_step_px: {}
"#,
            asset_dir,
            self.body_atlas.file,
            self.body_atlas.columns,
            self.body_atlas.rows,
            self.switch_atlas.file,
            self.switch_atlas.columns,
            self.switch_atlas.rows,
            self.animation_interval_ms,
            self.animation_step_px
        )
    }
}
