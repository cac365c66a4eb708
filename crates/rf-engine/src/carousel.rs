//! Per-post carousel state: which media item is active, and whether the post
//! as a whole is in a position to activate it.

use std::collections::{HashMap, HashSet};

use rf_core::{FeedError, Media, MediaKey, Post};
use tracing::{debug, warn};
use uuid::Uuid;

/// Conditions that hide the whole feed from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurReason {
    /// Navigation is moving away from the feed screen.
    ScreenBlur,
    /// The app went to the background.
    Background,
    /// A modal (media viewer, camera, sheet) covers the feed.
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChange {
    pub previous: usize,
    pub current: usize,
}

#[derive(Debug)]
struct CarouselEntry {
    media: Vec<Media>,
    index: usize,
    in_viewport: bool,
}

#[derive(Debug, Default)]
pub struct MediaCarouselController {
    entries: HashMap<Uuid, CarouselEntry>,
    obscured_by: HashSet<BlurReason>,
}

impl MediaCarouselController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a post at page 0. Remounting keeps the current page.
    pub fn mount(&mut self, post: &Post) {
        self.entries.entry(post.id).or_insert_with(|| CarouselEntry {
            media: post.media.clone(),
            index: 0,
            in_viewport: false,
        });
    }

    pub fn unmount(&mut self, post_id: Uuid) -> bool {
        self.entries.remove(&post_id).is_some()
    }

    pub fn is_mounted(&self, post_id: Uuid) -> bool {
        self.entries.contains_key(&post_id)
    }

    pub fn mounted(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.entries.keys().copied()
    }

    /// Records a swipe. Out-of-range indices are clamped to the last page.
    /// Returns the change, or `None` if the page did not move.
    pub fn on_page_changed(&mut self, post_id: Uuid, new_index: usize) -> Option<PageChange> {
        let entry = self.entries.get_mut(&post_id)?;
        if entry.media.is_empty() {
            return None;
        }

        let len = entry.media.len();
        let current = if new_index >= len {
            let err = FeedError::InvalidIndex { post_id, index: new_index, len };
            warn!(error = %err, "clamping carousel index");
            len - 1
        } else {
            new_index
        };

        let previous = std::mem::replace(&mut entry.index, current);
        if previous == current {
            return None;
        }
        debug!(post_id = %post_id, previous, current, "carousel page changed");
        Some(PageChange { previous, current })
    }

    pub fn active_index(&self, post_id: Uuid) -> Option<usize> {
        self.entries.get(&post_id).map(|e| e.index)
    }

    pub fn active_media(&self, post_id: Uuid) -> Option<&Media> {
        let entry = self.entries.get(&post_id)?;
        entry.media.get(entry.index)
    }

    /// Commits the post-level viewport flag. Returns true if it changed.
    pub fn set_in_viewport(&mut self, post_id: Uuid, in_viewport: bool) -> bool {
        match self.entries.get_mut(&post_id) {
            Some(entry) if entry.in_viewport != in_viewport => {
                entry.in_viewport = in_viewport;
                true
            }
            _ => false,
        }
    }

    pub fn in_viewport(&self, post_id: Uuid) -> bool {
        self.entries.get(&post_id).is_some_and(|e| e.in_viewport)
    }

    /// Returns true if the feed went from visible to obscured.
    pub fn obscure(&mut self, reason: BlurReason) -> bool {
        let was_obscured = self.is_obscured();
        self.obscured_by.insert(reason);
        !was_obscured
    }

    /// Returns true if the feed went from obscured to visible.
    pub fn reveal(&mut self, reason: BlurReason) -> bool {
        let removed = self.obscured_by.remove(&reason);
        removed && !self.is_obscured()
    }

    pub fn is_obscured(&self) -> bool {
        !self.obscured_by.is_empty()
    }

    /// The post is in the viewport and nothing app-level hides the feed.
    pub fn is_activation_signal(&self, post_id: Uuid) -> bool {
        self.in_viewport(post_id) && !self.is_obscured()
    }

    /// The post is activated and `key` is its current page.
    pub fn is_media_active(&self, key: MediaKey) -> bool {
        self.is_activation_signal(key.post_id) && self.active_index(key.post_id) == Some(key.index)
    }
}
