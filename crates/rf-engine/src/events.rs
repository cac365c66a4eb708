//! Typed events into the coordinator, commands out of it, and the ordered
//! queue that carries events between them.

use std::collections::VecDeque;
use std::fmt;

use rf_core::{Cursor, FeedError, MediaKey, Post, ReactionKind, UserSettings};
use uuid::Uuid;

use crate::carousel::BlurReason;
use crate::settings::SettingKey;
use crate::viewport::{Frame, Surface};

/// Correlates a collaborator request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug)]
pub enum FeedEvent {
    // Feed lifecycle
    LoadInitial,
    Refresh,
    InitialLoaded { request: RequestId, result: Result<Vec<Post>, FeedError> },
    OlderLoaded { request: RequestId, result: Result<Vec<Post>, FeedError> },
    LiveInserted(Vec<Post>),
    /// The consumer is this many viewport heights from the end of the list.
    EndReached { distance: f32 },

    // Geometry and mounting
    PostMounted(Uuid),
    PostUnmounted(Uuid),
    PostLaidOut { post_id: Uuid, frame: Frame },
    Scrolled(Surface),
    ViewportEnter(Uuid),
    ViewportLeave(Uuid),
    PageChanged { post_id: Uuid, index: usize },
    Obscured(BlurReason),
    Revealed(BlurReason),

    // Playback
    MediaReady(MediaKey),
    MediaFailed { key: MediaKey, reason: String },
    ToggleMute(MediaKey),
    SettingsLoaded(Result<UserSettings, FeedError>),
    SettingChanged { key: SettingKey, value: bool },

    // Interaction
    QuickTap(Uuid),
    LongPress(Uuid),
    TraySelect { post_id: Uuid, kind: ReactionKind },
    /// A tap elsewhere on the post (body, comment, overflow) while the tray may be open.
    DismissTray(Uuid),
    ReactionSettled { post_id: Uuid, request: RequestId, result: Result<(), FeedError> },
    DeletePost(Uuid),
    DeleteSettled { post_id: Uuid, result: Result<(), FeedError> },
}

impl FeedEvent {
    fn viewport_target(&self) -> Option<Uuid> {
        match self {
            FeedEvent::ViewportEnter(id) | FeedEvent::ViewportLeave(id) => Some(*id),
            _ => None,
        }
    }

    fn post_target(&self) -> Option<Uuid> {
        match self {
            FeedEvent::PostMounted(id)
            | FeedEvent::PostUnmounted(id)
            | FeedEvent::ViewportEnter(id)
            | FeedEvent::ViewportLeave(id)
            | FeedEvent::QuickTap(id)
            | FeedEvent::LongPress(id)
            | FeedEvent::DismissTray(id)
            | FeedEvent::DeletePost(id) => Some(*id),
            FeedEvent::PostLaidOut { post_id, .. }
            | FeedEvent::PageChanged { post_id, .. }
            | FeedEvent::TraySelect { post_id, .. }
            | FeedEvent::ReactionSettled { post_id, .. }
            | FeedEvent::DeleteSettled { post_id, .. } => Some(*post_id),
            FeedEvent::MediaReady(key) | FeedEvent::ToggleMute(key) | FeedEvent::MediaFailed { key, .. } => {
                Some(key.post_id)
            }
            _ => None,
        }
    }
}

/// Requests for the data-source collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    Subscribe { request: RequestId, user_id: Uuid, limit: usize },
    FetchOlder { request: RequestId, user_id: Uuid, cursor: Cursor, limit: usize },
    MutateReaction { request: RequestId, post_id: Uuid, user_id: Uuid, reaction: Option<ReactionKind> },
    DeletePost { post_id: Uuid, user_id: Uuid },
    FetchSettings { user_id: Uuid },
}

/// FIFO of pending events.
///
/// A viewport edge for a post replaces a still-queued edge for the same post
/// when nothing else about that post was queued in between, so a fast
/// scroll-through collapses to its final value.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<FeedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FeedEvent) {
        if let Some(post_id) = event.viewport_target() {
            let last_for_post = self.events.iter().rposition(|e| e.post_target() == Some(post_id));
            if let Some(pos) = last_for_post {
                if self.events[pos].viewport_target() == Some(post_id) {
                    self.events[pos] = event;
                    return;
                }
            }
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<FeedEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_pairs_collapse_to_last_value() {
        let mut q = EventQueue::new();
        let id = Uuid::now_v7();
        q.push(FeedEvent::ViewportEnter(id));
        q.push(FeedEvent::ViewportLeave(id));
        q.push(FeedEvent::ViewportEnter(id));
        assert_eq!(q.len(), 1);
        assert!(matches!(q.pop(), Some(FeedEvent::ViewportEnter(p)) if p == id));
    }

    #[test]
    fn test_collapse_keeps_per_post_ordering() {
        let mut q = EventQueue::new();
        let id = Uuid::now_v7();
        let other = Uuid::now_v7();
        q.push(FeedEvent::ViewportEnter(id));
        q.push(FeedEvent::ViewportEnter(other));
        q.push(FeedEvent::PageChanged { post_id: id, index: 1 });
        q.push(FeedEvent::ViewportLeave(id));
        q.push(FeedEvent::ViewportLeave(other));

        assert_eq!(q.len(), 4);
        assert!(matches!(q.pop(), Some(FeedEvent::ViewportEnter(p)) if p == id));
        assert!(matches!(q.pop(), Some(FeedEvent::ViewportLeave(p)) if p == other));
        assert!(matches!(q.pop(), Some(FeedEvent::PageChanged { .. })));
        assert!(matches!(q.pop(), Some(FeedEvent::ViewportLeave(p)) if p == id));
        assert!(q.is_empty());
    }
}
