//! # rf-player-headless
//! rusty-feed/crates/rf-plugins/rf-player-headless/src/lib.rs
//! A `MediaPlayer` with no decoder behind it. Every call lands in a shared
//! journal so simulations and tests can see exactly what the coordinator asked for.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use rf_core::{MediaKey, MediaPlayer, PlayerFactory, PlayerStatus};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Load(String),
    Play,
    Pause,
    SetMuted(bool),
    Dispose,
}

#[derive(Debug, Default)]
struct JournalInner {
    calls: Vec<(MediaKey, PlayerCall)>,
    playing: HashSet<MediaKey>,
}

/// Shared record of player calls and of which players are running.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalInner>>,
}

impl Journal {
    fn lock(&self) -> MutexGuard<'_, JournalInner> {
        // A panicking test thread must not hide the journal from the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, key: MediaKey, call: PlayerCall) {
        trace!(media = %key, call = ?call, "player call");
        let mut inner = self.lock();
        match call {
            PlayerCall::Play => {
                inner.playing.insert(key);
            }
            PlayerCall::Pause | PlayerCall::Dispose => {
                inner.playing.remove(&key);
            }
            _ => {}
        }
        inner.calls.push((key, call));
    }

    pub fn calls(&self) -> Vec<(MediaKey, PlayerCall)> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, key: MediaKey) -> Vec<PlayerCall> {
        self.lock().calls.iter().filter(|(k, _)| *k == key).map(|(_, c)| c.clone()).collect()
    }

    pub fn count(&self, key: MediaKey, pred: impl Fn(&PlayerCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|(k, c)| *k == key && pred(c)).count()
    }

    pub fn is_playing(&self, key: MediaKey) -> bool {
        self.lock().playing.contains(&key)
    }

    /// Simulates the user starting or stopping a player outside the coordinator.
    pub fn force_playing(&self, key: MediaKey, playing: bool) {
        let mut inner = self.lock();
        if playing {
            inner.playing.insert(key);
        } else {
            inner.playing.remove(&key);
        }
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }
}

pub struct HeadlessPlayer {
    key: MediaKey,
    disposed: bool,
    journal: Journal,
}

impl HeadlessPlayer {
    pub fn new(key: MediaKey, journal: Journal) -> Self {
        Self { key, disposed: false, journal }
    }

    fn call(&mut self, call: PlayerCall) {
        if self.disposed {
            trace!(media = %self.key, call = ?call, "ignoring call on disposed player");
            return;
        }
        self.journal.record(self.key, call);
    }
}

impl MediaPlayer for HeadlessPlayer {
    fn load(&mut self, url: &str) {
        self.call(PlayerCall::Load(url.to_string()));
    }

    fn play(&mut self) {
        self.call(PlayerCall::Play);
    }

    fn pause(&mut self) {
        self.call(PlayerCall::Pause);
    }

    fn set_muted(&mut self, muted: bool) {
        self.call(PlayerCall::SetMuted(muted));
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus { is_playing: !self.disposed && self.journal.is_playing(self.key) }
    }

    fn dispose(&mut self) {
        self.call(PlayerCall::Dispose);
        self.disposed = true;
    }
}

#[derive(Debug, Default)]
pub struct HeadlessPlayerFactory {
    journal: Journal,
}

impl HeadlessPlayerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl PlayerFactory for HeadlessPlayerFactory {
    fn create(&mut self, key: MediaKey) -> Box<dyn MediaPlayer> {
        Box::new(HeadlessPlayer::new(key, self.journal.clone()))
    }
}
