use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Vec3;
use crate::visual::{DEFAULT_JACK_OFFSET, PanelLayout};

/// Tunables for a [`crate::Patcher`] and the layout it draws against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Offset from a control's centre to its sender jack. Receiver jacks
    /// mirror it on x.
    pub jack_offset: Vec3,
    /// Whether newly created lines start visible.
    pub lines_visible: bool,
    /// The state controls are put back into after every resolution.
    pub reset_armed: bool,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            jack_offset: DEFAULT_JACK_OFFSET,
            lines_visible: true,
            reset_armed: true,
        }
    }
}

impl PatcherConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// An empty layout using this config's jack offset.
    pub fn layout(&self) -> PanelLayout {
        PanelLayout::new(self.jack_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = PatcherConfig::from_json("{}").unwrap();
        assert_eq!(config, PatcherConfig::default());
    }

    #[test]
    fn partial_config_overrides_only_given_fields() {
        let config = PatcherConfig::from_value(json!({
            "lines_visible": false,
            "jack_offset": { "x": 0.5, "y": 0.0, "z": 0.0 }
        }))
        .unwrap();
        assert!(!config.lines_visible);
        assert!(config.reset_armed);
        assert_eq!(config.jack_offset, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn bad_json_is_reported() {
        let err = PatcherConfig::from_json("{ \"lines_visible\": 3 }").unwrap_err();
        assert!(err.to_string().starts_with("invalid patcher config"));
    }
}
