//! Tunables for the coordinator. Loaded by the `configs` crate; every field
//! has a default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Posts per page
    pub batch_size: usize,
    /// How close to the end of content, in viewport heights, triggers `load_more`
    pub end_reached_threshold: f32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { batch_size: 20, end_reached_threshold: 0.3 }
    }
}

/// Visible-fraction thresholds. Entering needs more of the post on screen
/// than staying does, so a post resting on the boundary does not flicker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub enter_ratio: f32,
    pub leave_ratio: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { enter_ratio: 0.4, leave_ratio: 0.2 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Scrolling feed: videos follow viewport and carousel activation.
    #[default]
    Feed,
    /// Single-post screen: videos load at mount and play once ready.
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub mode: PlaybackMode,
    /// Used until the user's own settings arrive
    pub autoplay_video_enabled: bool,
    pub mute_video_enabled: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { mode: PlaybackMode::Feed, autoplay_video_enabled: true, mute_video_enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pagination: PaginationConfig,
    pub viewport: ViewportConfig,
    pub playback: PlaybackConfig,
}
