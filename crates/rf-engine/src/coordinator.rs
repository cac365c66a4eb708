//! The feed coordinator: one ordered event loop over the viewport tracker,
//! carousels, playback, reactions and the paginator.
//!
//! Everything runs inside a single event turn. Asynchronous work leaves as a
//! [`FeedCommand`] and comes back later as another [`FeedEvent`]; every such
//! continuation re-checks that its target is still mounted.

use std::collections::HashMap;

use rf_core::{FeedError, MediaKey, MediaKind, Mutation, PlayerFactory, Post, ReactionKind};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::carousel::MediaCarouselController;
use crate::config::EngineConfig;
use crate::events::{EventQueue, FeedCommand, FeedEvent, RequestId};
use crate::paginator::{BatchOutcome, FeedPaginator};
use crate::playback::{PlaybackCoordinator, PlaybackState};
use crate::reaction::{ReactionChange, ReactionStateMachine};
use crate::settings::{self, PlaybackSettings};
use crate::viewport::{ViewportChange, ViewportEdge, ViewportTracker};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaView {
    pub index: usize,
    pub kind: MediaKind,
    pub playback: Option<PlaybackState>,
    pub muted: Option<bool>,
}

/// What the presentation layer needs to render one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub post_id: Uuid,
    pub in_viewport: bool,
    pub active_index: Option<usize>,
    pub reaction: Option<ReactionKind>,
    pub reaction_count: u32,
    pub tray_visible: bool,
    pub pending_deletion: bool,
    pub media: Vec<MediaView>,
}

pub struct FeedCoordinator {
    user_id: Uuid,
    paginator: FeedPaginator,
    viewport: ViewportTracker,
    carousel: MediaCarouselController,
    playback: PlaybackCoordinator,
    reactions: HashMap<Uuid, ReactionStateMachine>,
    inflight_reactions: HashMap<RequestId, ReactionChange>,
    queue: EventQueue,
    commands: Vec<FeedCommand>,
    failures: Vec<FeedError>,
}

impl FeedCoordinator {
    pub fn new(config: EngineConfig, user_id: Uuid, players: Box<dyn PlayerFactory>) -> Self {
        let settings = PlaybackSettings::from(&config.playback);
        Self {
            user_id,
            paginator: FeedPaginator::new(config.pagination),
            viewport: ViewportTracker::new(config.viewport),
            carousel: MediaCarouselController::new(),
            playback: PlaybackCoordinator::new(config.playback.mode, settings, players),
            reactions: HashMap::new(),
            inflight_reactions: HashMap::new(),
            queue: EventQueue::new(),
            commands: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Queues an event without processing it.
    pub fn push(&mut self, event: FeedEvent) {
        self.queue.push(event);
    }

    /// Drains the queue in order, including events produced while draining.
    pub fn process(&mut self) {
        while let Some(event) = self.queue.pop() {
            self.handle(event);
        }
    }

    pub fn dispatch(&mut self, event: FeedEvent) {
        self.push(event);
        self.process();
    }

    /// Collaborator requests issued since the last call.
    pub fn take_commands(&mut self) -> Vec<FeedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Failures reported since the last call.
    pub fn take_failures(&mut self) -> Vec<FeedError> {
        std::mem::take(&mut self.failures)
    }

    pub fn post_ids(&self) -> &[Uuid] {
        self.paginator.ids()
    }

    pub fn post(&self, post_id: Uuid) -> Option<&Post> {
        self.paginator.get(post_id)
    }

    pub fn paginator(&self) -> &FeedPaginator {
        &self.paginator
    }

    pub fn now_playing(&self) -> Option<MediaKey> {
        self.playback.now_playing()
    }

    pub fn playback_state(&self, key: MediaKey) -> Option<PlaybackState> {
        self.playback.state(key)
    }

    pub fn settings(&self) -> PlaybackSettings {
        self.playback.settings()
    }

    pub fn is_mounted(&self, post_id: Uuid) -> bool {
        self.carousel.is_mounted(post_id)
    }

    pub fn view(&self, post_id: Uuid) -> Option<PostView> {
        let post = self.paginator.get(post_id)?;
        let media = post
            .media
            .iter()
            .enumerate()
            .map(|(index, m)| {
                let key = MediaKey::new(post_id, index);
                MediaView {
                    index,
                    kind: m.kind,
                    playback: self.playback.state(key),
                    muted: self.playback.is_muted(key),
                }
            })
            .collect();
        Some(PostView {
            post_id,
            in_viewport: self.carousel.in_viewport(post_id),
            active_index: self.carousel.active_index(post_id),
            reaction: post.reactions.mine,
            reaction_count: post.reactions.count,
            tray_visible: self.reactions.get(&post_id).is_some_and(|m| m.tray_visible()),
            pending_deletion: post.pending_deletion,
            media,
        })
    }

    /// Image URLs of a post for the full-screen viewer, and where the tapped
    /// item sits among them. `None` if the tapped item is a video.
    pub fn gallery_for(&self, post_id: Uuid, tapped: usize) -> Option<(Vec<String>, usize)> {
        let post = self.paginator.get(post_id)?;
        if post.media_at(tapped)?.is_video() {
            return None;
        }
        let position = post.media[..tapped].iter().filter(|m| !m.is_video()).count();
        let urls = post.media.iter().filter(|m| !m.is_video()).map(|m| m.url.clone()).collect();
        Some((urls, position))
    }

    /// Closes the reaction tray. Returns true if it was open, meaning the
    /// tap that triggered this should do nothing else.
    pub fn dismiss_tray(&mut self, post_id: Uuid) -> bool {
        self.reactions.get_mut(&post_id).is_some_and(|m| m.dismiss_tray())
    }

    /// Rolls a post's reaction back without issuing a mutation.
    pub fn restore_reaction(&mut self, post_id: Uuid, selection: Option<ReactionKind>) {
        self.paginator.restore_reaction(post_id, selection);
        if let Some(machine) = self.reactions.get_mut(&post_id) {
            machine.restore(selection);
        }
    }

    fn handle(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::LoadInitial => {
                let cmd = self.paginator.load_initial(self.user_id);
                self.commands.push(cmd);
                self.commands.push(FeedCommand::FetchSettings { user_id: self.user_id });
                self.prune_mounted();
            }
            FeedEvent::Refresh => {
                let cmd = self.paginator.refresh(self.user_id);
                self.commands.push(cmd);
            }
            FeedEvent::InitialLoaded { request, result } => match self.paginator.on_initial_batch(request, result) {
                Ok(BatchOutcome::Applied(_)) => {
                    self.prune_mounted();
                    self.resync_reactions();
                }
                Ok(BatchOutcome::Stale) => {}
                Err(err) => self.fail(err),
            },
            FeedEvent::OlderLoaded { request, result } => {
                if let Err(err) = self.paginator.on_older_batch(request, result) {
                    self.fail(err);
                }
            }
            FeedEvent::LiveInserted(posts) => {
                self.paginator.on_live_insert(posts);
                self.resync_reactions();
            }
            FeedEvent::EndReached { distance } => self.maybe_load_more(distance),

            FeedEvent::PostMounted(post_id) => self.mount(post_id),
            FeedEvent::PostUnmounted(post_id) => self.unmount(post_id),
            FeedEvent::PostLaidOut { post_id, frame } => {
                self.mount(post_id);
                if self.carousel.is_mounted(post_id) {
                    let change = self.viewport.set_frame(post_id, frame);
                    self.queue_viewport(change);
                }
            }
            FeedEvent::Scrolled(surface) => {
                for change in self.viewport.set_surface(surface) {
                    self.queue_viewport(Some(change));
                }
                let distance = self.paginator.ids().last().and_then(|last| self.viewport.distance_to_end(*last));
                if let Some(distance) = distance {
                    self.maybe_load_more(distance);
                }
            }
            FeedEvent::ViewportEnter(post_id) => self.commit_viewport(post_id, true),
            FeedEvent::ViewportLeave(post_id) => self.commit_viewport(post_id, false),
            FeedEvent::PageChanged { post_id, index } => {
                if self.carousel.on_page_changed(post_id, index).is_some() {
                    self.sync_post(post_id);
                }
            }
            FeedEvent::Obscured(reason) => {
                if self.carousel.obscure(reason) {
                    debug!(?reason, "feed obscured");
                    self.playback.will_blur();
                    self.sync_all();
                }
            }
            FeedEvent::Revealed(reason) => {
                if self.carousel.reveal(reason) {
                    debug!(?reason, "feed revealed");
                    self.playback.did_focus();
                    self.sync_all();
                    self.promote();
                }
            }

            FeedEvent::MediaReady(key) => {
                if self.carousel.is_mounted(key.post_id) {
                    self.playback.on_ready(key);
                    self.promote();
                } else {
                    debug!(media = %key, "discarding ready signal for unmounted post");
                }
            }
            FeedEvent::MediaFailed { key, reason } => {
                if let Some(err) = self.playback.on_failed(key, &reason) {
                    warn!(error = %err, "video failed to load");
                    self.failures.push(err);
                }
            }
            FeedEvent::ToggleMute(key) => {
                self.playback.toggle_mute(key);
            }
            FeedEvent::SettingsLoaded(Ok(user_settings)) => {
                for (key, value) in settings::changes_from(&user_settings) {
                    self.playback.apply_setting(key, value);
                }
                self.promote();
            }
            FeedEvent::SettingsLoaded(Err(err)) => self.fail(err),
            FeedEvent::SettingChanged { key, value } => {
                self.playback.apply_setting(key, value);
                self.promote();
            }

            FeedEvent::QuickTap(post_id) => {
                if let Some(machine) = self.reaction_machine(post_id) {
                    let change = machine.quick_tap();
                    self.commit_reaction(post_id, change);
                }
            }
            FeedEvent::LongPress(post_id) => {
                if let Some(machine) = self.reaction_machine(post_id) {
                    machine.long_press();
                }
            }
            FeedEvent::TraySelect { post_id, kind } => {
                let change = self.reaction_machine(post_id).and_then(|m| m.tray_select(kind));
                if let Some(change) = change {
                    self.commit_reaction(post_id, change);
                }
            }
            FeedEvent::DismissTray(post_id) => {
                self.dismiss_tray(post_id);
            }
            FeedEvent::ReactionSettled { post_id, request, result } => {
                self.paginator.settle_reaction(post_id, request);
                let change = self.inflight_reactions.remove(&request);
                if let (Err(err), Some(change)) = (result, change) {
                    let err = FeedError::MutationFailure {
                        post_id,
                        mutation: Mutation::Reaction { previous: change.previous, attempted: change.next },
                        reason: reason_of(err),
                    };
                    warn!(error = %err, "reaction rejected");
                    self.failures.push(err);
                }
            }
            FeedEvent::DeletePost(post_id) => {
                if self.paginator.mark_deleting(post_id) {
                    debug!(post_id = %post_id, "deleting post");
                    self.commands.push(FeedCommand::DeletePost { post_id, user_id: self.user_id });
                }
            }
            FeedEvent::DeleteSettled { post_id, result } => match result {
                Ok(()) => {
                    self.paginator.confirm_deleted(post_id);
                    self.unmount(post_id);
                }
                Err(err) => {
                    self.paginator.cancel_deletion(post_id);
                    let err = FeedError::MutationFailure { post_id, mutation: Mutation::Delete, reason: reason_of(err) };
                    warn!(error = %err, "delete rejected");
                    self.failures.push(err);
                }
            },
        }
    }

    fn fail(&mut self, err: FeedError) {
        warn!(error = %err, "feed operation failed");
        self.failures.push(err);
    }

    fn mount(&mut self, post_id: Uuid) {
        if self.carousel.is_mounted(post_id) {
            return;
        }
        let Some(post) = self.paginator.get(post_id) else {
            warn!(post_id = %post_id, "cannot mount a post outside the feed");
            return;
        };
        self.carousel.mount(post);
        for (index, media) in post.media.iter().enumerate() {
            self.playback.mount(MediaKey::new(post_id, index), media);
        }
        debug!(post_id = %post_id, media = post.media.len(), "post mounted");
        self.sync_post(post_id);
        self.promote();
    }

    fn unmount(&mut self, post_id: Uuid) {
        self.viewport.remove(post_id);
        if !self.carousel.unmount(post_id) {
            return;
        }
        self.reactions.remove(&post_id);
        let mut released = false;
        for key in self.playback.keys_for(post_id) {
            released |= self.playback.unmount(key);
        }
        debug!(post_id = %post_id, "post unmounted");
        if released {
            self.promote();
        }
    }

    fn prune_mounted(&mut self) {
        let gone: Vec<Uuid> = self.carousel.mounted().filter(|id| self.paginator.get(*id).is_none()).collect();
        for post_id in gone {
            self.unmount(post_id);
        }
    }

    fn queue_viewport(&mut self, change: Option<ViewportChange>) {
        match change {
            Some(ViewportChange { post_id, edge: ViewportEdge::Enter }) => {
                self.queue.push(FeedEvent::ViewportEnter(post_id));
            }
            Some(ViewportChange { post_id, edge: ViewportEdge::Leave }) => {
                self.queue.push(FeedEvent::ViewportLeave(post_id));
            }
            None => {}
        }
    }

    fn commit_viewport(&mut self, post_id: Uuid, in_viewport: bool) {
        if self.carousel.set_in_viewport(post_id, in_viewport) {
            debug!(post_id = %post_id, in_viewport, "viewport changed");
            self.sync_post(post_id);
        }
    }

    /// Pushes the current activation of each of the post's videos into playback.
    fn sync_post(&mut self, post_id: Uuid) {
        let mut released = false;
        for key in self.playback.keys_for(post_id) {
            let active = self.carousel.is_media_active(key);
            released |= self.playback.set_activation(key, active);
        }
        if released {
            self.promote();
        }
    }

    fn sync_all(&mut self) {
        let mounted: Vec<Uuid> = self.carousel.mounted().collect();
        for post_id in mounted {
            self.sync_post(post_id);
        }
    }

    /// If nothing plays, starts the first waiting video in feed order.
    fn promote(&mut self) {
        if self.playback.now_playing().is_some() {
            return;
        }
        for &post_id in self.paginator.ids() {
            let Some(index) = self.carousel.active_index(post_id) else {
                continue;
            };
            if self.playback.try_start(MediaKey::new(post_id, index)) {
                return;
            }
        }
    }

    fn maybe_load_more(&mut self, distance: f32) {
        if self.paginator.should_load_more(distance) {
            if let Some(cmd) = self.paginator.load_more(self.user_id) {
                self.commands.push(cmd);
            }
        }
    }

    fn reaction_machine(&mut self, post_id: Uuid) -> Option<&mut ReactionStateMachine> {
        let Some(post) = self.paginator.get(post_id) else {
            warn!(error = %FeedError::NotFound(post_id), "reaction gesture ignored");
            return None;
        };
        let mine = post.reactions.mine;
        Some(self.reactions.entry(post_id).or_insert_with(|| ReactionStateMachine::new(mine)))
    }

    fn commit_reaction(&mut self, post_id: Uuid, change: ReactionChange) {
        let Some(request) = self.paginator.apply_reaction(post_id, change.next) else {
            return;
        };
        debug!(post_id = %post_id, previous = ?change.previous, next = ?change.next, %request, "reaction committed");
        self.inflight_reactions.insert(request, change);
        self.commands.push(FeedCommand::MutateReaction {
            request,
            post_id,
            user_id: self.user_id,
            reaction: change.next,
        });
    }

    fn resync_reactions(&mut self) {
        let paginator = &self.paginator;
        self.reactions.retain(|post_id, machine| match paginator.get(*post_id) {
            Some(post) => {
                machine.restore(post.reactions.mine);
                true
            }
            None => false,
        });
    }
}

fn reason_of(err: FeedError) -> String {
    match err {
        FeedError::Source(reason) => reason,
        other => other.to_string(),
    }
}
