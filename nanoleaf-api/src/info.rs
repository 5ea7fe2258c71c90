//! Device snapshot returned by `GET /api/v1/{token}/`

use serde::{Deserialize, Serialize};

/// Full state and identity of a controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    pub serial_no: String,
    #[serde(default)]
    pub manufacturer: String,
    pub firmware_version: String,
    pub model: String,
    pub state: LightState,
    #[serde(default)]
    pub effects: EffectsInfo,
    /// Present only on controllers with a rhythm module port
    #[serde(default)]
    pub rhythm: Option<RhythmInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightState {
    pub on: Switch,
    pub brightness: Level,
    pub hue: Level,
    pub sat: Level,
    pub ct: Level,
    pub color_mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub value: bool,
}

/// A numeric value with the controller's advertised bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl Level {
    pub fn new(value: u32) -> Self {
        Self {
            value,
            min: None,
            max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsInfo {
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default)]
    pub effects_list: Vec<String>,
}

/// Rhythm (sound) module block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmInfo {
    #[serde(default)]
    pub rhythm_connected: bool,
    #[serde(default)]
    pub rhythm_active: Option<bool>,
    #[serde(default)]
    pub hardware_version: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub aux_available: Option<bool>,
    #[serde(default)]
    pub rhythm_mode: Option<u8>,
}
