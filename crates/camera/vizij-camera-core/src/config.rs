//! Configuration for the camera system.

use serde::{Deserialize, Serialize};

use crate::error::CameraError;

/// Sizing hints and stack behavior. Every field has a default, so a partial
/// JSON document is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub main_layer: TransientLayerConfig,

    /// Maximum events to retain per tick; later events are dropped.
    pub max_events_per_tick: usize,

    /// Initial capacity hints.
    pub initial_entry_capacity: usize,
    pub setter_capacity: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientLayerConfig {
    /// Drop entries once an opaque entry fully covers them.
    pub isolated: bool,
}

impl Default for TransientLayerConfig {
    fn default() -> Self {
        Self { isolated: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_layer: TransientLayerConfig::default(),
            max_events_per_tick: 1024,
            initial_entry_capacity: 8,
            setter_capacity: 16,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, CameraError> {
        Ok(serde_json::from_str(json)?)
    }
}
