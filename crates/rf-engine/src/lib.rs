//! rusty-feed/crates/rf-engine/src/lib.rs
//!
//! The feed coordinator: viewport tracking, carousel state, single-slot video
//! playback, reactions and pagination, driven by one ordered event queue.

pub mod carousel;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod events;
pub mod paginator;
pub mod playback;
pub mod reaction;
pub mod settings;
pub mod viewport;

pub use carousel::{BlurReason, MediaCarouselController, PageChange};
pub use config::{EngineConfig, PaginationConfig, PlaybackConfig, PlaybackMode, ViewportConfig};
pub use coordinator::{FeedCoordinator, MediaView, PostView};
pub use driver::FeedDriver;
pub use events::{EventQueue, FeedCommand, FeedEvent, RequestId};
pub use paginator::{BatchOutcome, FeedPaginator};
pub use playback::{PlaybackCoordinator, PlaybackSlot, PlaybackState};
pub use reaction::{ReactionChange, ReactionStateMachine};
pub use settings::{PlaybackSettings, SettingKey};
pub use viewport::{Frame, Surface, ViewportChange, ViewportEdge, ViewportTracker};
