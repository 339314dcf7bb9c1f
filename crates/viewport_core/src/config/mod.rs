//! # Viewport Configuration
//!
//! Everything the viewport core treats as "external configuration": camera
//! defaults, controller tunables, the pointer chord table that maps button and
//! modifier combinations onto camera modes, picking box size and log level.
//!
//! Configurations load from and save to TOML or RON, chosen by file extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::{CameraChord, ControlMode, Modifiers, PointerButton};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Initial projection parameters for the two editor cameras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDefaults {
    /// Vertical field of view of the perspective camera, in degrees
    pub perspective_fov_degrees: f64,
    /// Near plane of the perspective camera
    pub perspective_near: f64,
    /// Far plane of the perspective camera
    pub perspective_far: f64,
    /// Visible width of the orthographic camera, in world units
    pub orthographic_field_size: f64,
    /// Near plane of the orthographic camera (may be negative)
    pub orthographic_near: f64,
    /// Far plane of the orthographic camera
    pub orthographic_far: f64,
}

impl Default for CameraDefaults {
    fn default() -> Self {
        Self {
            perspective_fov_degrees: 30.0,
            perspective_near: 1.0,
            perspective_far: 2000.0,
            orthographic_field_size: 100.0,
            orthographic_near: -100_000.0,
            orthographic_far: 100_000.0,
        }
    }
}

/// Tunables for the interactive camera controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Radians of orbit per pixel of drag
    pub rotate_speed: f64,
    /// Relative field size change per pixel for orthographic dolly
    pub orthographic_dolly_rate: f64,
    /// Fraction of the focus distance moved per pixel for perspective dolly
    pub perspective_dolly_rate: f64,
    /// Smallest orthographic field size dolly may reach
    pub min_field_size: f64,
    /// Scale applied to the fitted extents by frame-selection
    pub frame_margin: f64,
    /// Pixels of dolly per mouse wheel click
    pub wheel_dolly_step: f64,
    /// Pointer chords that start a camera mode
    pub chords: Vec<CameraChord>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.003,
            orthographic_dolly_rate: 0.002,
            perspective_dolly_rate: 0.001,
            min_field_size: 0.01,
            frame_margin: 1.1,
            wheel_dolly_step: 10.0,
            chords: default_chords(),
        }
    }
}

/// Alt-drag chords as used by most DCC tools, plus Ctrl+Alt for one-button mice
fn default_chords() -> Vec<CameraChord> {
    vec![
        CameraChord::new(PointerButton::Left, Modifiers::ALT, ControlMode::Rotate),
        CameraChord::new(PointerButton::Middle, Modifiers::ALT, ControlMode::Track),
        CameraChord::new(PointerButton::Right, Modifiers::ALT, ControlMode::Dolly),
        CameraChord::new(PointerButton::Middle, Modifiers::empty(), ControlMode::Track),
        CameraChord::new(PointerButton::Left, Modifiers::ALT | Modifiers::CTRL, ControlMode::Track),
        CameraChord::new(PointerButton::Left, Modifiers::ALT | Modifiers::META, ControlMode::Dolly),
    ]
}

/// Picking settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    /// Smallest pick rectangle side, in pixels
    pub min_selection_box: i32,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self { min_selection_box: 16 }
    }
}

/// # Complete Viewport Configuration
///
/// Top-level configuration handed to [`crate::SceneView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Log filter used by hosts that initialize logging from this config
    pub log_level: String,
    /// Camera defaults
    pub camera: CameraDefaults,
    /// Controller tunables and chords
    pub controller: ControllerConfig,
    /// Picking settings
    pub picking: PickingConfig,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            camera: CameraDefaults::default(),
            controller: ControllerConfig::default(),
            picking: PickingConfig::default(),
        }
    }
}

impl ViewportConfig {
    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the camera defaults
    pub fn with_camera(mut self, camera: CameraDefaults) -> Self {
        self.camera = camera;
        self
    }

    /// Replace the controller tunables
    pub fn with_controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }

    /// Set the minimum pick rectangle size
    pub fn with_min_selection_box(mut self, size: i32) -> Self {
        self.picking.min_selection_box = size;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !(camera.perspective_fov_degrees > 0.0 && camera.perspective_fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "perspective fov must be in (0, 180) degrees, got {}",
                camera.perspective_fov_degrees
            )));
        }
        if camera.perspective_near <= 0.0 || camera.perspective_far <= camera.perspective_near {
            return Err(ConfigError::Invalid(format!(
                "perspective planes must satisfy 0 < near < far, got near={} far={}",
                camera.perspective_near, camera.perspective_far
            )));
        }
        if camera.orthographic_far <= camera.orthographic_near {
            return Err(ConfigError::Invalid("orthographic far must exceed near".to_string()));
        }
        if camera.orthographic_field_size <= 0.0 {
            return Err(ConfigError::Invalid("orthographic field size must be positive".to_string()));
        }

        let controller = &self.controller;
        for (name, value) in [
            ("rotate_speed", controller.rotate_speed),
            ("orthographic_dolly_rate", controller.orthographic_dolly_rate),
            ("perspective_dolly_rate", controller.perspective_dolly_rate),
            ("min_field_size", controller.min_field_size),
            ("wheel_dolly_step", controller.wheel_dolly_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if controller.frame_margin < 1.0 {
            return Err(ConfigError::Invalid("frame_margin must be at least 1.0".to_string()));
        }

        if self.picking.min_selection_box <= 0 {
            return Err(ConfigError::Invalid("min_selection_box must be positive".to_string()));
        }

        Ok(())
    }
}

impl Config for ViewportConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("viewport_core_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ViewportConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = ViewportConfig::default();
        config.camera.perspective_near = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ViewportConfig::default().with_min_selection_box(0);
        assert!(config.validate().is_err());

        let mut config = ViewportConfig::default();
        config.controller.frame_margin = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("config.toml");
        let config = ViewportConfig::default()
            .with_log_level("debug")
            .with_min_selection_box(8);

        config.save_to_file(&path).unwrap();
        let loaded = ViewportConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let path = temp_path("config.ron");
        let mut config = ViewportConfig::default();
        config.controller.rotate_speed = 0.01;

        config.save_to_file(&path).unwrap();
        let loaded = ViewportConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ViewportConfig = toml::from_str("log_level = \"warn\"\n[picking]\nmin_selection_box = 4\n").unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.picking.min_selection_box, 4);
        assert_eq!(config.controller, ControllerConfig::default());
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ViewportConfig::load_from_file("viewport.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_)) | Err(ConfigError::UnsupportedFormat(_))));
        let result = ViewportConfig::default().save_to_file(temp_path("viewport.yaml"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
