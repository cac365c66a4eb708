//! JSON scenarios replayed through the driver.
//!
//! Posts are addressed by their position in the feed at the time the step
//! runs, so scripts stay valid across seeds.

use std::sync::Arc;

use rf_core::{MediaKey, Post, ReactionKind};
use rf_engine::{settings, BlurReason, FeedDriver, FeedEvent, Frame, SettingKey, Surface};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;
use rf_source_memory::MemoryFeedSource;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    LoadInitial,
    Refresh,
    Layout { post: usize, top: f32, height: f32 },
    Scroll { offset: f32, height: f32 },
    Mount { post: usize },
    Unmount { post: usize },
    Swipe { post: usize, index: usize },
    Ready { post: usize, index: usize },
    Fail { post: usize, index: usize, reason: String },
    ToggleMute { post: usize, index: usize },
    QuickTap { post: usize },
    LongPress { post: usize },
    TraySelect { post: usize, kind: ReactionKind },
    DismissTray { post: usize },
    Delete { post: usize },
    Blur,
    Focus,
    Setting { key: String, value: bool },
    /// A raw settings document as the settings store would deliver it.
    Settings { values: Map<String, Value> },
    Publish { text: String, videos: usize },
    Offline { offline: bool },
    /// Waits for every outstanding source call.
    Settle,
}

pub struct Runner {
    pub driver: FeedDriver,
    pub source: Arc<MemoryFeedSource>,
    pub viewer: Uuid,
}

impl Runner {
    pub async fn run(&mut self, steps: Vec<ScriptStep>) {
        for step in steps {
            if let Some(event) = self.event_for(step).await {
                self.driver.handle(event);
            }
        }
        self.driver.settle().await;
    }

    fn post_at(&self, position: usize) -> Option<Uuid> {
        let id = self.driver.coordinator().post_ids().get(position).copied();
        if id.is_none() {
            warn!(position, "script refers to a post outside the feed");
        }
        id
    }

    fn media_at(&self, position: usize, index: usize) -> Option<MediaKey> {
        self.post_at(position).map(|post_id| MediaKey::new(post_id, index))
    }

    async fn event_for(&mut self, step: ScriptStep) -> Option<FeedEvent> {
        let event = match step {
            ScriptStep::LoadInitial => FeedEvent::LoadInitial,
            ScriptStep::Refresh => FeedEvent::Refresh,
            ScriptStep::Layout { post, top, height } => {
                FeedEvent::PostLaidOut { post_id: self.post_at(post)?, frame: Frame { top, height } }
            }
            ScriptStep::Scroll { offset, height } => FeedEvent::Scrolled(Surface { offset, height }),
            ScriptStep::Mount { post } => FeedEvent::PostMounted(self.post_at(post)?),
            ScriptStep::Unmount { post } => FeedEvent::PostUnmounted(self.post_at(post)?),
            ScriptStep::Swipe { post, index } => FeedEvent::PageChanged { post_id: self.post_at(post)?, index },
            ScriptStep::Ready { post, index } => FeedEvent::MediaReady(self.media_at(post, index)?),
            ScriptStep::Fail { post, index, reason } => {
                FeedEvent::MediaFailed { key: self.media_at(post, index)?, reason }
            }
            ScriptStep::ToggleMute { post, index } => FeedEvent::ToggleMute(self.media_at(post, index)?),
            ScriptStep::QuickTap { post } => FeedEvent::QuickTap(self.post_at(post)?),
            ScriptStep::LongPress { post } => FeedEvent::LongPress(self.post_at(post)?),
            ScriptStep::TraySelect { post, kind } => FeedEvent::TraySelect { post_id: self.post_at(post)?, kind },
            ScriptStep::DismissTray { post } => FeedEvent::DismissTray(self.post_at(post)?),
            ScriptStep::Delete { post } => FeedEvent::DeletePost(self.post_at(post)?),
            ScriptStep::Blur => FeedEvent::Obscured(BlurReason::ScreenBlur),
            ScriptStep::Focus => FeedEvent::Revealed(BlurReason::ScreenBlur),
            ScriptStep::Setting { key, value } => match key.parse::<SettingKey>() {
                Ok(key) => FeedEvent::SettingChanged { key, value },
                Err(err) => {
                    warn!(setting = %err.0, "skipping unknown setting");
                    return None;
                }
            },
            ScriptStep::Settings { values } => {
                for (key, value) in settings::parse_changes(&values) {
                    self.driver.handle(FeedEvent::SettingChanged { key, value });
                }
                return None;
            }
            ScriptStep::Publish { text, videos } => {
                self.source.publish(published(self.viewer, text, videos)).await;
                return None;
            }
            ScriptStep::Offline { offline } => {
                self.source.set_offline(offline);
                return None;
            }
            ScriptStep::Settle => {
                self.driver.settle().await;
                return None;
            }
        };
        Some(event)
    }
}

fn published(author_id: Uuid, text: String, videos: usize) -> Post {
    let media = (0..videos)
        .map(|n| rf_core::Media::video(format!("https://cdn.example/live/{n}.mp4"), None, n))
        .collect();
    Post {
        id: Uuid::now_v7(),
        author_id,
        text,
        media,
        reactions: Default::default(),
        comment_count: 0,
        created_at: chrono::Utc::now(),
        location: None,
        pending_deletion: false,
    }
}

/// Used when no scenario file is given: load, lay out the first screen,
/// let the first video become ready, then scroll past it.
pub fn demo() -> Vec<ScriptStep> {
    use ScriptStep::*;
    let mut steps = vec![LoadInitial, Settle];
    for post in 0..6 {
        steps.push(Layout { post, top: post as f32 * 600.0, height: 600.0 });
    }
    steps.extend([
        Scroll { offset: 0.0, height: 900.0 },
        Scroll { offset: 900.0, height: 900.0 },
        Ready { post: 2, index: 0 },
        QuickTap { post: 1 },
        Settle,
        Scroll { offset: 1500.0, height: 900.0 },
    ]);
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_engine::{EngineConfig, FeedCoordinator};
    use rf_player_headless::HeadlessPlayerFactory;

    fn runner() -> Runner {
        let viewer = Uuid::now_v7();
        let source = Arc::new(MemoryFeedSource::new());
        let coordinator = FeedCoordinator::new(EngineConfig::default(), viewer, Box::new(HeadlessPlayerFactory::new()));
        Runner { driver: FeedDriver::new(coordinator, source.clone()), source, viewer }
    }

    #[tokio::test]
    async fn test_settings_document_applies_known_keys() {
        let steps: Vec<ScriptStep> = serde_json::from_str(
            r#"[{ "op": "settings", "values": { "mute_video_enabled": false, "autoplay_video_enabled": "no", "theme": "dark" } }]"#,
        )
        .unwrap();
        let mut runner = runner();
        runner.run(steps).await;

        let settings = runner.driver.coordinator().settings();
        assert!(!settings.muted_by_default);
        assert!(settings.autoplay);
    }

    #[test]
    fn test_demo_script_starts_with_load() {
        assert!(matches!(demo().first(), Some(ScriptStep::LoadInitial)));
    }
}
