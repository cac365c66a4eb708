//! Video playback coordination.
//!
//! Each mounted video runs `Idle → Loading → Playing ⇄ Paused`. A single
//! [`PlaybackSlot`] is shared by every video in the feed; a video is only
//! `Playing` while it holds the slot.

use std::collections::HashMap;
use std::fmt;

use rf_core::{FeedError, Media, MediaKey, MediaPlayer, PlayerFactory};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::PlaybackMode;
use crate::settings::{PlaybackSettings, SettingKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No source loaded (never activated, or the load failed).
    Idle,
    Loading,
    Playing,
    /// Ready but not playing.
    Paused,
}

/// Owner of the one "currently playing" position.
#[derive(Debug, Default)]
pub struct PlaybackSlot {
    holder: Option<MediaKey>,
}

impl PlaybackSlot {
    /// Succeeds if the slot is free or already held by `key`.
    pub fn try_acquire(&mut self, key: MediaKey) -> bool {
        match self.holder {
            None => {
                self.holder = Some(key);
                true
            }
            Some(holder) => holder == key,
        }
    }

    /// Frees the slot if `key` holds it. Returns true if it did.
    pub fn release(&mut self, key: MediaKey) -> bool {
        if self.holder == Some(key) {
            self.holder = None;
            true
        } else {
            false
        }
    }

    pub fn holder(&self) -> Option<MediaKey> {
        self.holder
    }
}

struct VideoEntry {
    url: String,
    state: PlaybackState,
    muted: bool,
    /// Last activation value delivered for this video
    activated: bool,
    failed: bool,
    player: Box<dyn MediaPlayer>,
}

impl fmt::Debug for VideoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoEntry")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("muted", &self.muted)
            .field("activated", &self.activated)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

pub struct PlaybackCoordinator {
    mode: PlaybackMode,
    settings: PlaybackSettings,
    factory: Box<dyn PlayerFactory>,
    videos: HashMap<MediaKey, VideoEntry>,
    slot: PlaybackSlot,
    blurred: bool,
}

impl PlaybackCoordinator {
    pub fn new(mode: PlaybackMode, settings: PlaybackSettings, factory: Box<dyn PlayerFactory>) -> Self {
        Self { mode, settings, factory, videos: HashMap::new(), slot: PlaybackSlot::default(), blurred: false }
    }

    pub fn settings(&self) -> PlaybackSettings {
        self.settings
    }

    pub fn now_playing(&self) -> Option<MediaKey> {
        self.slot.holder()
    }

    pub fn state(&self, key: MediaKey) -> Option<PlaybackState> {
        self.videos.get(&key).map(|v| v.state)
    }

    pub fn is_muted(&self, key: MediaKey) -> Option<bool> {
        self.videos.get(&key).map(|v| v.muted)
    }

    /// Mounted video keys of one post, in carousel order.
    pub fn keys_for(&self, post_id: Uuid) -> Vec<MediaKey> {
        let mut keys: Vec<MediaKey> = self.videos.keys().filter(|k| k.post_id == post_id).copied().collect();
        keys.sort();
        keys
    }

    /// Creates the player for a video. The mute flag is seeded from the
    /// current settings; in detail mode the source loads right away.
    pub fn mount(&mut self, key: MediaKey, media: &Media) {
        if !media.is_video() || self.videos.contains_key(&key) {
            return;
        }
        let mut player = self.factory.create(key);
        let muted = self.settings.muted_by_default;
        player.set_muted(muted);

        let mut entry = VideoEntry {
            url: media.url.clone(),
            state: PlaybackState::Idle,
            muted,
            activated: false,
            failed: false,
            player,
        };
        if self.mode == PlaybackMode::Detail {
            entry.player.load(&entry.url);
            entry.state = PlaybackState::Loading;
        }
        debug!(media = %key, state = ?entry.state, muted, "video mounted");
        self.videos.insert(key, entry);
    }

    /// Disposes the player. Returns true if this freed the playing slot.
    pub fn unmount(&mut self, key: MediaKey) -> bool {
        let Some(mut entry) = self.videos.remove(&key) else {
            return false;
        };
        if entry.state == PlaybackState::Playing {
            entry.player.pause();
        }
        entry.player.dispose();
        debug!(media = %key, "video unmounted");
        self.slot.release(key)
    }

    /// Delivers the media-level activation signal. Repeated values are
    /// ignored. Returns true if this freed the playing slot.
    pub fn set_activation(&mut self, key: MediaKey, active: bool) -> bool {
        if self.mode == PlaybackMode::Detail {
            return false;
        }
        let Some(entry) = self.videos.get_mut(&key) else {
            return false;
        };
        if entry.activated == active {
            return false;
        }
        entry.activated = active;

        if active {
            match entry.state {
                PlaybackState::Idle if !entry.failed => {
                    entry.player.load(&entry.url);
                    entry.state = PlaybackState::Loading;
                    debug!(media = %key, "video loading");
                }
                PlaybackState::Paused => {
                    self.try_start(key);
                }
                _ => {}
            }
            false
        } else {
            self.pause(key)
        }
    }

    /// The player finished loading. Stale or unexpected signals are dropped.
    pub fn on_ready(&mut self, key: MediaKey) {
        match self.videos.get_mut(&key) {
            Some(entry) if entry.state == PlaybackState::Loading => {
                entry.state = PlaybackState::Paused;
                debug!(media = %key, "video ready");
            }
            _ => {
                debug!(media = %key, "discarding ready signal for inactive video");
                return;
            }
        }
        self.try_start(key);
    }

    /// The player failed to load. The video goes back to idle and is not
    /// reloaded until it is mounted again.
    pub fn on_failed(&mut self, key: MediaKey, reason: &str) -> Option<FeedError> {
        let entry = self.videos.get_mut(&key).filter(|e| e.state == PlaybackState::Loading)?;
        entry.state = PlaybackState::Idle;
        entry.failed = true;
        Some(FeedError::LoadFailure { key, reason: reason.to_string() })
    }

    /// Screen is about to lose focus: pause whatever is playing.
    /// Returns true if the playing slot was freed.
    pub fn will_blur(&mut self) -> bool {
        self.blurred = true;
        match self.slot.holder() {
            Some(key) => self.pause(key),
            None => false,
        }
    }

    pub fn did_focus(&mut self) {
        self.blurred = false;
    }

    /// Flips the mute flag without touching play/pause.
    pub fn toggle_mute(&mut self, key: MediaKey) -> Option<bool> {
        let entry = self.videos.get_mut(&key)?;
        entry.muted = !entry.muted;
        entry.player.set_muted(entry.muted);
        debug!(media = %key, muted = entry.muted, "mute toggled");
        Some(entry.muted)
    }

    /// Applies a setting change. A new mute preference is pushed to every
    /// mounted video; playback is never restarted for it.
    pub fn apply_setting(&mut self, key: SettingKey, value: bool) {
        if !self.settings.apply(key, value) {
            return;
        }
        debug!(setting = %key, value, "playback setting changed");
        if key == SettingKey::MuteVideoEnabled {
            for entry in self.videos.values_mut() {
                entry.muted = value;
                entry.player.set_muted(value);
            }
        }
    }

    /// Ready, paused, and allowed to play right now.
    pub fn is_waiting(&self, key: MediaKey) -> bool {
        self.videos.get(&key).is_some_and(|v| {
            v.state == PlaybackState::Paused && (self.mode == PlaybackMode::Detail || v.activated)
        }) && self.may_play()
    }

    /// Starts `key` if it is waiting and the slot is free.
    pub fn try_start(&mut self, key: MediaKey) -> bool {
        if !self.is_waiting(key) {
            return false;
        }
        if !self.slot.try_acquire(key) {
            debug!(media = %key, holder = ?self.slot.holder(), "playing slot busy");
            return false;
        }
        let Some(entry) = self.videos.get_mut(&key) else {
            self.slot.release(key);
            return false;
        };
        if !entry.player.status().is_playing {
            entry.player.play();
        }
        entry.state = PlaybackState::Playing;
        debug!(media = %key, "video playing");
        true
    }

    fn may_play(&self) -> bool {
        !self.blurred && (self.mode == PlaybackMode::Detail || self.settings.autoplay)
    }

    fn pause(&mut self, key: MediaKey) -> bool {
        let Some(entry) = self.videos.get_mut(&key) else {
            return false;
        };
        if entry.state != PlaybackState::Playing {
            return false;
        }
        if entry.player.status().is_playing {
            entry.player.pause();
        }
        entry.state = PlaybackState::Paused;
        debug!(media = %key, "video paused");
        self.slot.release(key)
    }
}

impl fmt::Debug for PlaybackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("mode", &self.mode)
            .field("settings", &self.settings)
            .field("videos", &self.videos)
            .field("slot", &self.slot)
            .field("blurred", &self.blurred)
            .finish_non_exhaustive()
    }
}
