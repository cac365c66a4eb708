//! # Domain Models
//!
//! These structs represent the entities the feed coordinator works on.
//! Identifiers are UUID v7 so posts sort by creation time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a media item renders as a still or as a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a MIME string. Anything that is not `video/*` renders as an
    /// image, including a missing or unparsable type.
    pub fn from_mime(mime: Option<&str>) -> Self {
        match mime.map(str::parse::<mime::Mime>) {
            Some(Ok(parsed)) if parsed.type_() == mime::VIDEO => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }
}

/// A single item in a post's horizontally paged carousel. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Ordinal position within the owning post's media sequence
    pub position: usize,
}

impl Media {
    pub fn image(url: impl Into<String>, position: usize) -> Self {
        Self { kind: MediaKind::Image, url: url.into(), thumbnail_url: None, position }
    }

    pub fn video(url: impl Into<String>, thumbnail_url: Option<String>, position: usize) -> Self {
        Self { kind: MediaKind::Video, url: url.into(), thumbnail_url, position }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// Identity of a media item: the owning post plus its carousel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaKey {
    pub post_id: Uuid,
    pub index: usize,
}

impl MediaKey {
    pub fn new(post_id: Uuid, index: usize) -> Self {
        Self { post_id, index }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.post_id, self.index)
    }
}

/// The closed set of reactions a viewer can leave on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Laugh,
    Surprised,
    Cry,
    Angry,
}

impl ReactionKind {
    /// Tray order.
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Laugh,
        ReactionKind::Surprised,
        ReactionKind::Cry,
        ReactionKind::Angry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Love => "love",
            ReactionKind::Laugh => "laugh",
            ReactionKind::Surprised => "surprised",
            ReactionKind::Cry => "cry",
            ReactionKind::Angry => "angry",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate reactions on a post as seen by the current viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub count: u32,
    /// The viewer's own reaction, if any
    pub mine: Option<ReactionKind>,
}

impl ReactionSummary {
    /// Applies a locally committed change of the viewer's reaction.
    pub fn apply(&mut self, next: Option<ReactionKind>) {
        match (self.mine, next) {
            (None, Some(_)) => self.count = self.count.saturating_add(1),
            (Some(_), None) => self.count = self.count.saturating_sub(1),
            _ => {}
        }
        self.mine = next;
    }
}

/// The fundamental unit of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub reactions: ReactionSummary,
    #[serde(default)]
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub location: Option<String>,
    /// Local optimistic state: a delete has been issued but not confirmed
    #[serde(default)]
    pub pending_deletion: bool,
}

impl Post {
    pub fn cursor(&self) -> Cursor {
        Cursor { created_at: self.created_at, post_id: self.id }
    }

    pub fn media_at(&self, index: usize) -> Option<&Media> {
        self.media.get(index)
    }
}

/// Position in the feed from which older posts are requested.
///
/// Feeds are ordered newest first by `(created_at, post_id)`; an older page
/// contains the posts strictly after this position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub post_id: Uuid,
}

impl Cursor {
    /// True if `post` sorts strictly after (is older than) this cursor.
    pub fn precedes(&self, post: &Post) -> bool {
        (post.created_at, post.id) < (self.created_at, self.post_id)
    }
}

/// Per-user playback preferences, as stored by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "enabled")]
    pub autoplay_video_enabled: bool,
    #[serde(default = "enabled")]
    pub mute_video_enabled: bool,
}

fn enabled() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self { autoplay_video_enabled: true, mute_video_enabled: true }
    }
}
