//! Async shell around the coordinator.
//!
//! Commands become tokio tasks against a [`FeedSource`]; their results come
//! back through one channel and are dispatched in arrival order, so the
//! coordinator itself never awaits. Reaction mutations for one post run
//! one at a time, in the order they were committed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rf_core::{FeedError, FeedSource, LiveSink, Post, Subscription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::coordinator::FeedCoordinator;
use crate::events::{FeedCommand, FeedEvent, RequestId};

#[derive(Debug)]
enum DriverMsg {
    Event(FeedEvent),
    Subscribed(RequestId, Subscription),
    /// A spawned command finished and sent everything it had.
    Done,
}

/// Forwards live inserts into the driver's channel.
struct ChannelSink {
    tx: mpsc::UnboundedSender<DriverMsg>,
}

impl LiveSink for ChannelSink {
    fn deliver(&self, posts: Vec<Post>) {
        if self.tx.send(DriverMsg::Event(FeedEvent::LiveInserted(posts))).is_err() {
            debug!("live insert after driver shutdown dropped");
        }
    }
}

pub struct FeedDriver {
    coordinator: FeedCoordinator,
    source: Arc<dyn FeedSource>,
    tx: mpsc::UnboundedSender<DriverMsg>,
    rx: mpsc::UnboundedReceiver<DriverMsg>,
    outstanding: usize,
    latest_subscribe: Option<RequestId>,
    subscription: Option<Subscription>,
    /// Posts with a reaction mutation in flight, and the ones queued behind it
    mutating: HashMap<Uuid, VecDeque<FeedCommand>>,
}

impl FeedDriver {
    pub fn new(coordinator: FeedCoordinator, source: Arc<dyn FeedSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            coordinator,
            source,
            tx,
            rx,
            outstanding: 0,
            latest_subscribe: None,
            subscription: None,
            mutating: HashMap::new(),
        }
    }

    pub fn coordinator(&self) -> &FeedCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut FeedCoordinator {
        &mut self.coordinator
    }

    /// Number of commands still in flight.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Dispatches one event and starts whatever commands it produced.
    pub fn handle(&mut self, event: FeedEvent) {
        self.coordinator.dispatch(event);
        self.run_commands();
    }

    /// Waits until no command is in flight, dispatching results as they
    /// arrive, then drains whatever live inserts are already queued.
    pub async fn settle(&mut self) {
        while self.outstanding > 0 {
            match self.rx.recv().await {
                Some(msg) => self.apply(msg),
                None => break,
            }
        }
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg);
        }
    }

    /// Stops the live subscription, if any.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            info!("live feed unsubscribed");
            subscription.unsubscribe();
        }
    }

    fn apply(&mut self, msg: DriverMsg) {
        match msg {
            DriverMsg::Event(event) => {
                if let FeedEvent::ReactionSettled { post_id, .. } = &event {
                    self.next_mutation(*post_id);
                }
                self.handle(event);
            }
            DriverMsg::Subscribed(request, subscription) => {
                if self.latest_subscribe == Some(request) {
                    debug!(%request, "live feed subscribed");
                    // Replacing drops the previous subscription, which cancels it
                    self.subscription = Some(subscription);
                } else {
                    debug!(%request, "dropping superseded subscription");
                    subscription.unsubscribe();
                }
            }
            DriverMsg::Done => self.outstanding = self.outstanding.saturating_sub(1),
        }
    }

    fn run_commands(&mut self) {
        for command in self.coordinator.take_commands() {
            match command {
                FeedCommand::Subscribe { request, .. } => self.latest_subscribe = Some(request),
                FeedCommand::MutateReaction { post_id, .. } => {
                    if let Some(queue) = self.mutating.get_mut(&post_id) {
                        debug!(post_id = %post_id, queued = queue.len() + 1, "reaction mutation queued");
                        queue.push_back(command);
                        continue;
                    }
                    self.mutating.insert(post_id, VecDeque::new());
                }
                _ => {}
            }
            self.spawn(command);
        }
    }

    /// The in-flight mutation for `post_id` settled: start the next one.
    fn next_mutation(&mut self, post_id: Uuid) {
        match self.mutating.get_mut(&post_id).and_then(VecDeque::pop_front) {
            Some(command) => self.spawn(command),
            None => {
                self.mutating.remove(&post_id);
            }
        }
    }

    fn spawn(&mut self, command: FeedCommand) {
        self.outstanding += 1;
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            for msg in execute(source.as_ref(), command, &tx).await {
                // Receiver gone means the driver was dropped; nothing left to notify
                let _ = tx.send(msg);
            }
            let _ = tx.send(DriverMsg::Done);
        });
    }
}

async fn execute(source: &dyn FeedSource, command: FeedCommand, tx: &mpsc::UnboundedSender<DriverMsg>) -> Vec<DriverMsg> {
    match command {
        FeedCommand::Subscribe { request, user_id, limit } => {
            let sink = Box::new(ChannelSink { tx: tx.clone() });
            match source.subscribe(user_id, limit, sink).await {
                Ok((posts, subscription)) => vec![
                    DriverMsg::Subscribed(request, subscription),
                    DriverMsg::Event(FeedEvent::InitialLoaded { request, result: Ok(posts) }),
                ],
                Err(e) => {
                    warn!(%request, error = %format!("{e:#}"), "subscribe failed");
                    let result = Err(FeedError::Source(format!("{e:#}")));
                    vec![DriverMsg::Event(FeedEvent::InitialLoaded { request, result })]
                }
            }
        }
        FeedCommand::FetchOlder { request, user_id, cursor, limit } => {
            let result = source
                .fetch_older(user_id, cursor, limit)
                .await
                .map_err(|e| FeedError::PaginationFailure(format!("{e:#}")));
            vec![DriverMsg::Event(FeedEvent::OlderLoaded { request, result })]
        }
        FeedCommand::MutateReaction { request, post_id, user_id, reaction } => {
            let result = source
                .mutate_reaction(post_id, user_id, reaction)
                .await
                .map_err(|e| FeedError::Source(format!("{e:#}")));
            vec![DriverMsg::Event(FeedEvent::ReactionSettled { post_id, request, result })]
        }
        FeedCommand::DeletePost { post_id, user_id } => {
            let result = source
                .delete_post(post_id, user_id)
                .await
                .map_err(|e| FeedError::Source(format!("{e:#}")));
            vec![DriverMsg::Event(FeedEvent::DeleteSettled { post_id, result })]
        }
        FeedCommand::FetchSettings { user_id } => {
            let result = source
                .fetch_user_settings(user_id)
                .await
                .map_err(|e| FeedError::Source(format!("{e:#}")));
            vec![DriverMsg::Event(FeedEvent::SettingsLoaded(result))]
        }
    }
}
