//! Ordered, deduplicated feed sequence with cursor-based paging.

use std::collections::{HashMap, HashSet};

use rf_core::{FeedError, Post, ReactionKind, ReactionSummary};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::events::{FeedCommand, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch was merged; carries how many posts it added.
    Applied(usize),
    /// The batch answers a request that has since been superseded.
    Stale,
}

#[derive(Debug, Default)]
pub struct FeedPaginator {
    config: PaginationConfig,
    order: Vec<Uuid>,
    posts: HashMap<Uuid, Post>,
    next_request: u64,
    initial: Option<RequestId>,
    older: Option<RequestId>,
    exhausted: bool,
    /// Deletions the server confirmed; never shown again
    deleted: HashSet<Uuid>,
    /// Deletions awaiting the server, with the copy to put back on rejection
    deleting: HashMap<Uuid, Post>,
    /// Unconfirmed reaction commits, re-applied over incoming copies of the post
    pending_reactions: HashMap<Uuid, (RequestId, ReactionSummary)>,
}

impl FeedPaginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, post_id: Uuid) -> Option<&Post> {
        self.posts.get(&post_id)
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> + '_ {
        self.order.iter().filter_map(|id| self.posts.get(id))
    }

    pub fn is_loading_initial(&self) -> bool {
        self.initial.is_some()
    }

    pub fn is_loading_more(&self) -> bool {
        self.older.is_some()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Starts a fresh subscription and clears the sequence.
    pub fn load_initial(&mut self, user_id: Uuid) -> FeedCommand {
        self.order.clear();
        self.posts.clear();
        self.refresh(user_id)
    }

    /// Re-subscribes. The current sequence stays visible until the new
    /// batch replaces it; any in-flight older page is abandoned.
    pub fn refresh(&mut self, user_id: Uuid) -> FeedCommand {
        let request = self.next_request();
        self.initial = Some(request);
        self.older = None;
        self.exhausted = false;
        info!(%request, user_id = %user_id, "subscribing to feed");
        FeedCommand::Subscribe { request, user_id, limit: self.config.batch_size }
    }

    /// True if a consumer `distance` viewport heights from the end should page.
    pub fn should_load_more(&self, distance: f32) -> bool {
        distance <= self.config.end_reached_threshold && self.can_load_more()
    }

    /// Requests the next older page, unless one is already in flight, the
    /// list is shorter than one full batch, or the feed is exhausted.
    pub fn load_more(&mut self, user_id: Uuid) -> Option<FeedCommand> {
        if !self.can_load_more() {
            debug!(
                len = self.order.len(),
                in_flight = self.older.is_some(),
                exhausted = self.exhausted,
                "load_more skipped"
            );
            return None;
        }
        let cursor = self.order.last().and_then(|id| self.posts.get(id)).map(Post::cursor)?;
        let request = self.next_request();
        self.older = Some(request);
        debug!(%request, len = self.order.len(), "loading older posts");
        Some(FeedCommand::FetchOlder { request, user_id, cursor, limit: self.config.batch_size })
    }

    pub fn on_initial_batch(
        &mut self,
        request: RequestId,
        result: Result<Vec<Post>, FeedError>,
    ) -> Result<BatchOutcome, FeedError> {
        if self.initial != Some(request) {
            debug!(%request, "discarding stale initial batch");
            return Ok(BatchOutcome::Stale);
        }
        self.initial = None;
        let batch = result?;

        self.order.clear();
        self.posts.clear();
        for post in batch {
            self.append(post);
        }
        info!(%request, len = self.order.len(), "feed replaced");
        Ok(BatchOutcome::Applied(self.order.len()))
    }

    /// Appends an older page. On failure the sequence is unchanged and a
    /// later `load_more` may try again.
    pub fn on_older_batch(
        &mut self,
        request: RequestId,
        result: Result<Vec<Post>, FeedError>,
    ) -> Result<BatchOutcome, FeedError> {
        if self.older != Some(request) {
            debug!(%request, "discarding stale older batch");
            return Ok(BatchOutcome::Stale);
        }
        self.older = None;
        let batch = result?;

        let mut added = 0;
        for post in batch {
            if self.append(post) {
                added += 1;
            }
        }
        if added == 0 {
            self.exhausted = true;
        }
        debug!(%request, added, len = self.order.len(), "older posts appended");
        Ok(BatchOutcome::Applied(added))
    }

    /// Prepends posts not yet in the sequence, keeping their delivery order,
    /// and refreshes the ones that are. Returns the ids that were prepended.
    pub fn on_live_insert(&mut self, posts: Vec<Post>) -> Vec<Uuid> {
        let mut fresh = Vec::new();
        for post in posts {
            let Some(post) = self.overlay(post) else {
                continue;
            };
            let id = post.id;
            if self.posts.insert(id, post).is_none() {
                fresh.push(id);
            }
        }
        if !fresh.is_empty() {
            debug!(count = fresh.len(), "live posts prepended");
            self.order.splice(0..0, fresh.iter().copied());
        }
        fresh
    }

    /// Optimistically records the viewer's new reaction. Returns the request
    /// id for the remote mutation.
    pub fn apply_reaction(&mut self, post_id: Uuid, next: Option<ReactionKind>) -> Option<RequestId> {
        let post = self.posts.get_mut(&post_id)?;
        post.reactions.apply(next);
        let summary = post.reactions;
        let request = self.next_request();
        self.pending_reactions.insert(post_id, (request, summary));
        Some(request)
    }

    /// Drops the local overlay once the latest mutation for the post settles.
    pub fn settle_reaction(&mut self, post_id: Uuid, request: RequestId) {
        if self.pending_reactions.get(&post_id).is_some_and(|(r, _)| *r == request) {
            self.pending_reactions.remove(&post_id);
        }
    }

    /// Puts back a selection without going through a mutation.
    pub fn restore_reaction(&mut self, post_id: Uuid, selection: Option<ReactionKind>) {
        self.pending_reactions.remove(&post_id);
        if let Some(post) = self.posts.get_mut(&post_id) {
            post.reactions.apply(selection);
        }
    }

    /// Flags a post as being deleted. Returns false if it is unknown or
    /// already pending.
    pub fn mark_deleting(&mut self, post_id: Uuid) -> bool {
        match self.posts.get_mut(&post_id) {
            Some(post) if !post.pending_deletion => {
                post.pending_deletion = true;
                self.deleting.insert(post_id, post.clone());
                true
            }
            _ => false,
        }
    }

    /// Deletion round-tripped: the post leaves the sequence for good.
    pub fn confirm_deleted(&mut self, post_id: Uuid) -> Option<Post> {
        self.deleting.remove(&post_id);
        self.deleted.insert(post_id);
        self.order.retain(|id| *id != post_id);
        self.pending_reactions.remove(&post_id);
        self.posts.remove(&post_id)
    }

    /// Deletion was rejected: the post is shown again. If a refresh dropped
    /// it meanwhile, the copy taken at `mark_deleting` goes back in feed order.
    pub fn cancel_deletion(&mut self, post_id: Uuid) {
        let snapshot = self.deleting.remove(&post_id);
        if let Some(post) = self.posts.get_mut(&post_id) {
            post.pending_deletion = false;
            return;
        }
        let Some(mut post) = snapshot else {
            warn!(post_id = %post_id, "rejected delete for a post that was never pending");
            return;
        };
        post.pending_deletion = false;
        let cursor = post.cursor();
        let at = self
            .order
            .iter()
            .position(|id| self.posts.get(id).is_some_and(|p| cursor.precedes(p)))
            .unwrap_or(self.order.len());
        debug!(post_id = %post_id, position = at, "restoring post after rejected delete");
        self.order.insert(at, post_id);
        self.posts.insert(post_id, post);
    }

    fn can_load_more(&self) -> bool {
        self.older.is_none()
            && self.initial.is_none()
            && !self.exhausted
            && self.order.len() >= self.config.batch_size
    }

    fn append(&mut self, post: Post) -> bool {
        if self.posts.contains_key(&post.id) {
            return false;
        }
        let Some(post) = self.overlay(post) else {
            return false;
        };
        self.order.push(post.id);
        self.posts.insert(post.id, post);
        true
    }

    /// Applies local optimistic state to an incoming copy of a post.
    /// Confirmed deletions are dropped; pending ones stay flagged.
    fn overlay(&self, mut post: Post) -> Option<Post> {
        if self.deleted.contains(&post.id) {
            return None;
        }
        if self.deleting.contains_key(&post.id) {
            post.pending_deletion = true;
        }
        if let Some((_, summary)) = self.pending_reactions.get(&post.id) {
            post.reactions = *summary;
        }
        Some(post)
    }

    fn next_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    const USER: Uuid = Uuid::from_u128(7);

    /// Post `n` of a feed where higher numbers are older.
    fn post(n: u32) -> Post {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Post {
            id: Uuid::from_u128(n as u128),
            author_id: USER,
            text: format!("post {n}"),
            media: vec![],
            reactions: ReactionSummary::default(),
            comment_count: 0,
            created_at: base - Duration::minutes(n as i64),
            location: None,
            pending_deletion: false,
        }
    }

    fn posts(range: std::ops::RangeInclusive<u32>) -> Vec<Post> {
        range.map(post).collect()
    }

    fn request_of(cmd: &FeedCommand) -> RequestId {
        match cmd {
            FeedCommand::Subscribe { request, .. } | FeedCommand::FetchOlder { request, .. } => *request,
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn loaded(batch: Vec<Post>) -> FeedPaginator {
        let mut p = FeedPaginator::new(PaginationConfig { batch_size: 20, end_reached_threshold: 0.3 });
        let req = request_of(&p.load_initial(USER));
        p.on_initial_batch(req, Ok(batch)).unwrap();
        p
    }

    #[test]
    fn test_load_more_appends_without_duplicates() {
        let mut p = loaded(posts(1..=20));
        assert!(p.should_load_more(0.2));

        let cmd = p.load_more(USER).unwrap();
        match &cmd {
            FeedCommand::FetchOlder { cursor, limit, .. } => {
                assert_eq!(cursor.post_id, Uuid::from_u128(20));
                assert_eq!(*limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
        let outcome = p.on_older_batch(request_of(&cmd), Ok(posts(20..=40))).unwrap();
        assert_eq!(outcome, BatchOutcome::Applied(20));
        assert_eq!(p.len(), 40);
        let expected: Vec<Uuid> = (1..=40u128).map(Uuid::from_u128).collect();
        assert_eq!(p.ids(), expected.as_slice());
    }

    #[test]
    fn test_load_more_is_single_flight() {
        let mut p = loaded(posts(1..=20));
        assert!(p.load_more(USER).is_some());
        assert!(p.load_more(USER).is_none());
        assert!(p.is_loading_more());
    }

    #[test]
    fn test_short_list_does_not_page() {
        let mut p = loaded(posts(1..=12));
        assert!(!p.should_load_more(0.0));
        assert!(p.load_more(USER).is_none());
    }

    #[test]
    fn test_threshold_gates_should_load_more() {
        let p = loaded(posts(1..=20));
        assert!(p.should_load_more(0.3));
        assert!(!p.should_load_more(0.31));
    }

    #[test]
    fn test_failed_page_leaves_sequence_and_allows_retry() {
        let mut p = loaded(posts(1..=20));
        let req = request_of(&p.load_more(USER).unwrap());
        let err = p.on_older_batch(req, Err(FeedError::PaginationFailure("timeout".into())));
        assert!(matches!(err, Err(FeedError::PaginationFailure(_))));
        assert_eq!(p.len(), 20);
        assert!(!p.is_loading_more());
        assert!(p.load_more(USER).is_some());
    }

    #[test]
    fn test_empty_page_marks_exhausted_until_refresh() {
        let mut p = loaded(posts(1..=20));
        let req = request_of(&p.load_more(USER).unwrap());
        assert_eq!(p.on_older_batch(req, Ok(vec![post(20)])).unwrap(), BatchOutcome::Applied(0));
        assert!(p.is_exhausted());
        assert!(p.load_more(USER).is_none());

        let req = request_of(&p.refresh(USER));
        p.on_initial_batch(req, Ok(posts(1..=20))).unwrap();
        assert!(p.load_more(USER).is_some());
    }

    #[test]
    fn test_refresh_discards_in_flight_page() {
        let mut p = loaded(posts(1..=20));
        let older = request_of(&p.load_more(USER).unwrap());
        let initial = request_of(&p.refresh(USER));
        assert_eq!(p.len(), 20);

        assert_eq!(p.on_older_batch(older, Ok(posts(21..=40))).unwrap(), BatchOutcome::Stale);
        assert_eq!(p.on_initial_batch(initial, Ok(posts(1..=5))).unwrap(), BatchOutcome::Applied(5));
        assert_eq!(p.len(), 5);
    }

    #[test]
    fn test_deleted_post_does_not_reappear() {
        let mut p = loaded(posts(1..=20));
        let victim = Uuid::from_u128(3);
        assert!(p.mark_deleting(victim));
        assert!(!p.mark_deleting(victim));
        assert!(p.get(victim).unwrap().pending_deletion);
        assert!(p.confirm_deleted(victim).is_some());

        let req = request_of(&p.refresh(USER));
        p.on_initial_batch(req, Ok(posts(1..=20))).unwrap();
        assert!(p.get(victim).is_none());
        assert_eq!(p.len(), 19);
        assert!(p.on_live_insert(vec![post(3)]).is_empty());
    }

    #[test]
    fn test_rejected_delete_restores_post() {
        let mut p = loaded(posts(1..=20));
        let victim = Uuid::from_u128(4);
        p.mark_deleting(victim);
        p.cancel_deletion(victim);
        assert!(!p.get(victim).unwrap().pending_deletion);
        let req = request_of(&p.refresh(USER));
        p.on_initial_batch(req, Ok(posts(1..=20))).unwrap();
        assert!(p.get(victim).is_some());
    }

    #[test]
    fn test_pending_delete_survives_refresh_flagged() {
        let mut p = loaded(posts(1..=20));
        let victim = Uuid::from_u128(5);
        p.mark_deleting(victim);

        let req = request_of(&p.refresh(USER));
        p.on_initial_batch(req, Ok(posts(1..=20))).unwrap();
        assert!(p.get(victim).unwrap().pending_deletion);

        p.cancel_deletion(victim);
        assert!(!p.get(victim).unwrap().pending_deletion);
        assert_eq!(p.ids()[4], victim);
    }

    #[test]
    fn test_rejected_delete_restores_post_missing_from_refresh() {
        let mut p = loaded(posts(1..=20));
        let victim = Uuid::from_u128(5);
        p.mark_deleting(victim);

        let batch: Vec<Post> = posts(1..=20).into_iter().filter(|post| post.id != victim).collect();
        let req = request_of(&p.refresh(USER));
        p.on_initial_batch(req, Ok(batch)).unwrap();
        assert!(p.get(victim).is_none());

        p.cancel_deletion(victim);
        let expected: Vec<Uuid> = (1..=20).map(Uuid::from_u128).collect();
        assert_eq!(p.ids(), expected.as_slice());
        assert!(!p.get(victim).unwrap().pending_deletion);
    }

    #[test]
    fn test_live_insert_prepends_in_delivery_order() {
        let mut p = loaded(posts(10..=29));
        let mut updated = post(10);
        updated.comment_count = 5;
        let fresh = p.on_live_insert(vec![post(8), post(9), updated]);
        assert_eq!(fresh, vec![Uuid::from_u128(8), Uuid::from_u128(9)]);
        assert_eq!(&p.ids()[..3], &[Uuid::from_u128(8), Uuid::from_u128(9), Uuid::from_u128(10)]);
        assert_eq!(p.get(Uuid::from_u128(10)).unwrap().comment_count, 5);
        assert_eq!(p.len(), 22);
    }

    #[test]
    fn test_pending_reaction_survives_refresh() {
        let mut p = loaded(posts(1..=20));
        let id = Uuid::from_u128(2);
        let req = p.apply_reaction(id, Some(ReactionKind::Love)).unwrap();
        assert_eq!(p.get(id).unwrap().reactions, ReactionSummary { count: 1, mine: Some(ReactionKind::Love) });

        let initial = request_of(&p.refresh(USER));
        p.on_initial_batch(initial, Ok(posts(1..=20))).unwrap();
        assert_eq!(p.get(id).unwrap().reactions.mine, Some(ReactionKind::Love));

        p.settle_reaction(id, req);
        let initial = request_of(&p.refresh(USER));
        p.on_initial_batch(initial, Ok(posts(1..=20))).unwrap();
        assert_eq!(p.get(id).unwrap().reactions.mine, None);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let mut p = loaded(posts(1..=20));
        let a = p.apply_reaction(Uuid::from_u128(1), Some(ReactionKind::Like)).unwrap();
        let b = request_of(&p.load_more(USER).unwrap());
        assert_ne!(a, b);
        assert!(p.apply_reaction(Uuid::from_u128(99), None).is_none());
    }
}
