//! User playback settings and the typed key → handler table that applies
//! setting-change events.

use std::fmt;
use std::str::FromStr;

use rf_core::UserSettings;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::PlaybackConfig;

/// The recognized setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    AutoplayVideoEnabled,
    MuteVideoEnabled,
}

type Handler = fn(&mut PlaybackSettings, bool);

impl SettingKey {
    pub const ALL: [SettingKey; 2] = [SettingKey::AutoplayVideoEnabled, SettingKey::MuteVideoEnabled];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::AutoplayVideoEnabled => "autoplay_video_enabled",
            SettingKey::MuteVideoEnabled => "mute_video_enabled",
        }
    }

    fn handler(self) -> Handler {
        match self {
            SettingKey::AutoplayVideoEnabled => |s: &mut PlaybackSettings, v: bool| s.autoplay = v,
            SettingKey::MuteVideoEnabled => |s: &mut PlaybackSettings, v: bool| s.muted_by_default = v,
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSetting(pub String);

impl FromStr for SettingKey {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownSetting(s.to_string()))
    }
}

/// Current playback preferences as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub autoplay: bool,
    /// Seeds the mute flag of newly mounted videos
    pub muted_by_default: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for PlaybackSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self { autoplay: config.autoplay_video_enabled, muted_by_default: config.mute_video_enabled }
    }
}

impl PlaybackSettings {
    /// Runs the handler for `key`. Returns true if the value changed.
    pub fn apply(&mut self, key: SettingKey, value: bool) -> bool {
        let before = *self;
        (key.handler())(self, value);
        before != *self
    }
}

/// Every key of a fetched settings snapshot, in table order.
pub fn changes_from(settings: &UserSettings) -> Vec<(SettingKey, bool)> {
    SettingKey::ALL
        .into_iter()
        .map(|key| {
            let value = match key {
                SettingKey::AutoplayVideoEnabled => settings.autoplay_video_enabled,
                SettingKey::MuteVideoEnabled => settings.mute_video_enabled,
            };
            (key, value)
        })
        .collect()
}

/// Parses a raw settings document. Unknown keys and non-boolean values are skipped.
pub fn parse_changes(raw: &Map<String, Value>) -> Vec<(SettingKey, bool)> {
    raw.iter()
        .filter_map(|(name, value)| {
            let key = match name.parse::<SettingKey>() {
                Ok(key) => key,
                Err(UnknownSetting(name)) => {
                    debug!(setting = %name, "ignoring unrecognized setting");
                    return None;
                }
            };
            match value.as_bool() {
                Some(v) => Some((key, v)),
                None => {
                    warn!(setting = %key, value = %value, "setting is not a boolean");
                    None
                }
            }
        })
        .collect()
}
