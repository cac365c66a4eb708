//! rusty-feed/crates/rf-core/src/lib.rs
//!
//! Data model, collaborator interfaces and error taxonomy for the feed coordinator.

pub mod models;
pub mod traits;
pub mod error;

// Re-exporting for easier access in other crates
pub use models::*;
pub use traits::*;
pub use error::*;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn post_at(offset_secs: i64) -> Post {
        Post {
            id: Uuid::now_v7(),
            author_id: Uuid::now_v7(),
            text: "Hello Rust!".to_string(),
            media: vec![],
            reactions: ReactionSummary::default(),
            comment_count: 0,
            created_at: Utc::now() + Duration::seconds(offset_secs),
            location: None,
            pending_deletion: false,
        }
    }

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime(Some("video/mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_mime(Some("video/quicktime")), MediaKind::Video);
        assert_eq!(MediaKind::from_mime(Some("image/jpeg")), MediaKind::Image);
        assert_eq!(MediaKind::from_mime(Some("not a mime")), MediaKind::Image);
        assert_eq!(MediaKind::from_mime(None), MediaKind::Image);
    }

    #[test]
    fn test_reaction_summary_counts() {
        let mut summary = ReactionSummary { count: 3, mine: None };
        summary.apply(Some(ReactionKind::Love));
        assert_eq!(summary.count, 4);
        summary.apply(Some(ReactionKind::Angry));
        assert_eq!(summary.count, 4);
        summary.apply(None);
        assert_eq!(summary, ReactionSummary { count: 3, mine: None });

        let mut empty = ReactionSummary { count: 0, mine: Some(ReactionKind::Like) };
        empty.apply(None);
        assert_eq!(empty.count, 0);
    }

    #[test]
    fn test_cursor_orders_newest_first() {
        let older = post_at(-60);
        let newer = post_at(0);
        let cursor = newer.cursor();
        assert!(cursor.precedes(&older));
        assert!(!cursor.precedes(&newer));
        assert!(!older.cursor().precedes(&newer));
    }

    #[test]
    fn test_user_settings_defaults_from_partial_json() {
        let settings: UserSettings =
            serde_json::from_value(serde_json::json!({ "mute_video_enabled": false })).unwrap();
        assert!(settings.autoplay_video_enabled);
        assert!(!settings.mute_video_enabled);
    }

    #[test]
    fn test_subscription_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let counter = calls.clone();
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reaction_kind_serde_names() {
        let json = serde_json::to_string(&ReactionKind::Surprised).unwrap();
        assert_eq!(json, "\"surprised\"");
        assert_eq!(ReactionKind::ALL.len(), 6);
    }
}
