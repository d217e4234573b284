//! Configuration system

pub use serde::{Serialize, Deserialize};

use crate::scene::PRIORITY_SENTINEL;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
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

    /// A value is outside its accepted range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # Scene Configuration
///
/// Behaviour switches for the scene graph and the skinning core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Apply the rest-pose remainder `1 - sum(weights)` when skinning.
    /// New skins inherit this value.
    pub weighted_skinning: bool,

    /// Priority given to freshly created entities
    pub default_priority: i16,

    /// Whether render-context masks cascade to descendants by default
    pub cascade_render_masks: bool,

    /// Whether children promoted by `destroy_entity` keep their world transform
    pub keep_world_on_destroy: bool,

    /// Default log filter used by [`crate::foundation::logging::init_with_level`]
    pub log_level: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            weighted_skinning: true,
            default_priority: 0,
            cascade_render_masks: false,
            keep_world_on_destroy: true,
            log_level: "info".to_string(),
        }
    }
}

impl SceneConfig {
    /// Builder pattern: set the global weighted-skinning flag
    pub fn with_weighted_skinning(mut self, weighted: bool) -> Self {
        self.weighted_skinning = weighted;
        self
    }

    /// Builder pattern: set the default entity priority
    pub fn with_default_priority(mut self, priority: i16) -> Self {
        self.default_priority = priority;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-PRIORITY_SENTINEL..=PRIORITY_SENTINEL).contains(&self.default_priority) {
            return Err(ConfigError::Invalid(format!(
                "default_priority {} outside [-{PRIORITY_SENTINEL}, {PRIORITY_SENTINEL}]",
                self.default_priority
            )));
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Config for SceneConfig {}
