use std::{cmp::Reverse, collections::HashMap};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use futures::channel::oneshot;
use parking_lot::Mutex;

use clipper_api::{
    Clip, ClipId, Comment, CommentId, CommentSort, DiscoveryList, DiscoveryListId, Error,
    NewComment, Page, QueueItem, QueueItemId, Remote, Time, UserId, Uuid, VoteDirection,
    DELETED_PLACEHOLDER, MAX_QUEUE_SIZE, REMOVED_PLACEHOLDER,
};

/// In-memory backend for a single logged-in user
///
/// Ids and timestamps are deterministic: each created object gets the next id and is one
/// second younger than the previous one.
#[derive(Default)]
pub struct MockServer {
    state: Mutex<State>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
}

#[derive(Default)]
struct State {
    ticks: i64,
    next_id: u128,
    clips: Vec<Clip>,
    comments: Vec<Comment>,
    queue: Vec<QueueItem>,
    lists: Vec<DiscoveryList>,
    fail_next: Option<Error>,
    failing: Option<Error>,
    calls: HashMap<&'static str, usize>,
}

fn vote_value(v: Option<VoteDirection>) -> i64 {
    v.map(|v| v.value()).unwrap_or(0)
}

impl State {
    fn now(&mut self) -> Time {
        self.ticks += 1;
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(self.ticks)
    }

    fn fresh_id(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128((1 << 64) + self.next_id)
    }

    fn clip_mut(&mut self, id: ClipId) -> Result<&mut Clip, Error> {
        self.clips
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(String::from("clip")))
    }

    fn comment_mut(&mut self, id: CommentId) -> Result<&mut Comment, Error> {
        self.comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(String::from("comment")))
    }

    fn list_mut(&mut self, id: DiscoveryListId) -> Result<&mut DiscoveryList, Error> {
        self.lists
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| Error::NotFound(String::from("discovery list")))
    }

    fn queue_index(&self, id: QueueItemId) -> Result<usize, Error> {
        self.queue
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(String::from("queue item")))
    }

    fn renumber_queue(&mut self) {
        for (i, item) in self.queue.iter_mut().enumerate() {
            item.position = i as u32 + 1;
        }
    }

    /// Comments replying to `parent` on `clip`, sorted, with their own replies
    fn thread(&self, clip: ClipId, parent: Option<CommentId>, sort: CommentSort) -> Vec<Comment> {
        let mut res = self
            .comments
            .iter()
            .filter(|c| c.clip_id == clip && c.parent_id == parent)
            .map(|c| {
                let replies = self.thread(clip, Some(c.id), sort);
                Comment {
                    child_count: replies.len() as u32,
                    replies: replies.into_iter().collect(),
                    ..c.clone()
                }
            })
            .collect::<Vec<_>>();
        match sort {
            CommentSort::Best => res.sort_by_key(|c| (Reverse(c.vote_score), Reverse(c.created_at))),
            CommentSort::New => res.sort_by_key(|c| Reverse(c.created_at)),
            CommentSort::Old => res.sort_by_key(|c| c.created_at),
            CommentSort::Controversial => {
                res.sort_by_key(|c| (Reverse(c.vote_score != 0), Reverse(c.vote_score.abs())))
            }
        }
        res
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    pub fn add_clip(&self, id: ClipId, title: &str) {
        let mut state = self.state.lock();
        let created_at = state.now();
        state.clips.push(Clip {
            id,
            title: String::from(title),
            vote_score: 0,
            user_vote: None,
            comment_count: 0,
            created_at,
        });
    }

    /// Adds a comment by another user, with score `vote_score`
    pub fn add_comment(
        &self,
        clip: ClipId,
        parent: Option<CommentId>,
        content: &str,
        vote_score: i64,
    ) -> CommentId {
        let mut state = self.state.lock();
        let id = CommentId(state.fresh_id());
        let created_at = state.now();
        state.comments.push(Comment {
            id,
            clip_id: clip,
            parent_id: parent,
            author_id: UserId(Uuid::from_u128(0)),
            content: String::from(content),
            vote_score,
            user_vote: None,
            child_count: 0,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            is_removed: false,
            created_at,
            replies: im::Vector::new(),
        });
        if let Ok(c) = state.clip_mut(clip) {
            c.comment_count += 1;
        }
        id
    }

    /// Removes a comment as a moderator would
    pub fn moderate_comment(&self, id: CommentId) -> Result<(), Error> {
        let mut state = self.state.lock();
        let c = state.comment_mut(id)?;
        c.is_removed = true;
        c.content = String::from(REMOVED_PLACEHOLDER);
        Ok(())
    }

    pub fn add_discovery_list(
        &self,
        id: DiscoveryListId,
        name: &str,
        is_featured: bool,
        follower_count: u64,
    ) {
        self.state.lock().lists.push(DiscoveryList {
            id,
            name: String::from(name),
            slug: name.to_lowercase().replace(' ', "-"),
            description: None,
            is_featured,
            clip_count: 0,
            follower_count,
            is_following: false,
            is_bookmarked: false,
        });
    }

    /// Makes the next call fail with `err`
    pub fn fail_next(&self, err: Error) {
        self.state.lock().fail_next = Some(err);
    }

    /// Makes every call fail with `err` until reset with `None`
    pub fn set_failing(&self, err: Option<Error>) {
        self.state.lock().failing = err;
    }

    /// Makes the next call wait until `release` resolves, before doing anything
    pub fn hold_next(&self, release: oneshot::Receiver<()>) {
        *self.hold.lock() = Some(release);
    }

    /// Number of times `call` was received, failed calls included
    pub fn calls(&self, call: &str) -> usize {
        self.state.lock().calls.get(call).copied().unwrap_or(0)
    }

    async fn receive(&self, call: &'static str) -> Result<(), Error> {
        let hold = self.hold.lock().take();
        if let Some(release) = hold {
            let _ = release.await;
        }
        let mut state = self.state.lock();
        *state.calls.entry(call).or_default() += 1;
        let err = match state.fail_next.take() {
            Some(err) => Some(err),
            None => state.failing.clone(),
        };
        if let Some(err) = err {
            tracing::debug!(call, ?err, "mock server failing call");
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl Remote for MockServer {
    async fn list_comments(
        &self,
        clip: ClipId,
        sort: CommentSort,
        page: u32,
        limit: u32,
    ) -> Result<Page<Comment>, Error> {
        self.receive("list_comments").await?;
        let state = self.state.lock();
        Ok(Page::slice(&state.thread(clip, None, sort), page, limit))
    }

    async fn create_comment(&self, clip: ClipId, comment: NewComment) -> Result<Comment, Error> {
        self.receive("create_comment").await?;
        let mut state = self.state.lock();
        state.clip_mut(clip)?;
        if let Some(parent) = comment.parent_id {
            let parent_clip = state
                .comment_mut(parent)
                .map_err(|_| Error::NotFound(String::from("parent comment")))?
                .clip_id;
            if parent_clip != clip {
                return Err(Error::NotFound(String::from("parent comment")));
            }
        }
        let id = CommentId(state.fresh_id());
        let created_at = state.now();
        let res = Comment {
            id,
            clip_id: clip,
            parent_id: comment.parent_id,
            author_id: UserId::stub(),
            content: comment.content,
            vote_score: 0,
            user_vote: None,
            child_count: 0,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            is_removed: false,
            created_at,
            replies: im::Vector::new(),
        };
        state.comments.push(res.clone());
        state.clip_mut(clip)?.comment_count += 1;
        Ok(res)
    }

    async fn edit_comment(&self, comment: CommentId, content: String) -> Result<(), Error> {
        self.receive("edit_comment").await?;
        let mut state = self.state.lock();
        let edited_at = state.now();
        let c = state.comment_mut(comment)?;
        if c.is_deleted || c.is_removed {
            return Err(Error::PermissionDenied);
        }
        c.content = content;
        c.is_edited = true;
        c.edited_at = Some(edited_at);
        Ok(())
    }

    async fn delete_comment(&self, comment: CommentId) -> Result<(), Error> {
        self.receive("delete_comment").await?;
        let mut state = self.state.lock();
        let c = state.comment_mut(comment)?;
        c.is_deleted = true;
        c.content = String::from(DELETED_PLACEHOLDER);
        Ok(())
    }

    async fn vote_comment(
        &self,
        comment: CommentId,
        vote: Option<VoteDirection>,
    ) -> Result<(), Error> {
        self.receive("vote_comment").await?;
        let mut state = self.state.lock();
        let c = state.comment_mut(comment)?;
        c.vote_score += vote_value(vote) - vote_value(c.user_vote);
        c.user_vote = vote;
        Ok(())
    }

    async fn list_clips(&self, feed: &str, page: u32, limit: u32) -> Result<Page<Clip>, Error> {
        self.receive("list_clips").await?;
        let state = self.state.lock();
        let mut clips = state.clips.clone();
        match feed {
            "new" => clips.sort_by_key(|c| Reverse(c.created_at)),
            "top" => clips.sort_by_key(|c| Reverse(c.vote_score)),
            _ => (),
        }
        Ok(Page::slice(&clips, page, limit))
    }

    async fn vote_clip(&self, clip: ClipId, vote: Option<VoteDirection>) -> Result<(), Error> {
        self.receive("vote_clip").await?;
        let mut state = self.state.lock();
        let c = state.clip_mut(clip)?;
        c.vote_score += vote_value(vote) - vote_value(c.user_vote);
        c.user_vote = vote;
        Ok(())
    }

    async fn get_queue(&self, limit: u32) -> Result<Page<QueueItem>, Error> {
        self.receive("get_queue").await?;
        Ok(Page::slice(&self.state.lock().queue, 1, limit))
    }

    async fn queue_count(&self) -> Result<u64, Error> {
        self.receive("queue_count").await?;
        Ok(self.state.lock().queue.len() as u64)
    }

    async fn add_to_queue(&self, clip: ClipId, at_end: bool) -> Result<QueueItem, Error> {
        self.receive("add_to_queue").await?;
        let mut state = self.state.lock();
        if state.queue.len() as u64 >= MAX_QUEUE_SIZE {
            return Err(Error::QueueFull);
        }
        state.clip_mut(clip)?;
        let id = QueueItemId(state.fresh_id());
        let added_at = state.now();
        let item = QueueItem {
            id,
            clip_id: clip,
            position: 0,
            added_at,
            played_at: None,
        };
        if at_end {
            state.queue.push(item);
        } else {
            state.queue.insert(0, item);
        }
        state.renumber_queue();
        let i = state.queue_index(id)?;
        Ok(state.queue[i].clone())
    }

    async fn remove_from_queue(&self, item: QueueItemId) -> Result<(), Error> {
        self.receive("remove_from_queue").await?;
        let mut state = self.state.lock();
        let i = state.queue_index(item)?;
        state.queue.remove(i);
        state.renumber_queue();
        Ok(())
    }

    async fn reorder_queue(&self, item: QueueItemId, new_position: u32) -> Result<(), Error> {
        self.receive("reorder_queue").await?;
        let mut state = self.state.lock();
        let from = state.queue_index(item)?;
        if new_position < 1 {
            return Err(Error::InvalidPosition(i64::from(new_position)));
        }
        let to = (new_position as usize).min(state.queue.len()) - 1;
        let moved = state.queue.remove(from);
        state.queue.insert(to, moved);
        state.renumber_queue();
        Ok(())
    }

    async fn mark_played(&self, item: QueueItemId) -> Result<(), Error> {
        self.receive("mark_played").await?;
        let mut state = self.state.lock();
        let i = state.queue_index(item)?;
        state.queue.remove(i);
        state.renumber_queue();
        Ok(())
    }

    async fn clear_queue(&self) -> Result<(), Error> {
        self.receive("clear_queue").await?;
        self.state.lock().queue.clear();
        Ok(())
    }

    async fn list_discovery_lists(
        &self,
        featured_only: bool,
        page: u32,
        limit: u32,
    ) -> Result<Page<DiscoveryList>, Error> {
        self.receive("list_discovery_lists").await?;
        let state = self.state.lock();
        let lists = state
            .lists
            .iter()
            .filter(|l| !featured_only || l.is_featured)
            .cloned()
            .collect::<Vec<_>>();
        Ok(Page::slice(&lists, page, limit))
    }

    async fn get_discovery_list(&self, list: DiscoveryListId) -> Result<DiscoveryList, Error> {
        self.receive("get_discovery_list").await?;
        self.state.lock().list_mut(list).map(|l| l.clone())
    }

    async fn follow_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.receive("follow_list").await?;
        let mut state = self.state.lock();
        let l = state.list_mut(list)?;
        if !l.is_following {
            l.is_following = true;
            l.follower_count += 1;
        }
        Ok(())
    }

    async fn unfollow_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.receive("unfollow_list").await?;
        let mut state = self.state.lock();
        let l = state.list_mut(list)?;
        if !l.is_following {
            return Err(Error::NotFound(String::from("follow")));
        }
        l.is_following = false;
        l.follower_count = l.follower_count.saturating_sub(1);
        Ok(())
    }

    async fn bookmark_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.receive("bookmark_list").await?;
        self.state.lock().list_mut(list)?.is_bookmarked = true;
        Ok(())
    }

    async fn unbookmark_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.receive("unbookmark_list").await?;
        let mut state = self.state.lock();
        let l = state.list_mut(list)?;
        if !l.is_bookmarked {
            return Err(Error::NotFound(String::from("bookmark")));
        }
        l.is_bookmarked = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    fn clip() -> ClipId {
        ClipId(Uuid::from_u128(1))
    }

    #[test]
    fn threads_are_nested_and_sorted() {
        let server = MockServer::new();
        server.add_clip(clip(), "clip");
        let low = server.add_comment(clip(), None, "low", -2);
        let high = server.add_comment(clip(), None, "high", 10);
        let reply = server.add_comment(clip(), Some(low), "reply", 0);
        server.moderate_comment(reply).unwrap();

        let best = block_on(server.list_comments(clip(), CommentSort::Best, 1, 50)).unwrap();
        assert_eq!(
            best.items.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![high, low]
        );
        assert_eq!(best.items[1].child_count, 1);
        assert_eq!(best.items[1].replies[0].content, "[removed]");

        let old = block_on(server.list_comments(clip(), CommentSort::Old, 1, 1)).unwrap();
        assert_eq!(old.items[0].id, low);
        assert!(old.has_more);
        assert_eq!(old.total, 2);
    }

    #[test]
    fn failures_are_injected_and_counted() {
        let server = MockServer::new();
        server.fail_next(Error::RateLimited);
        assert_eq!(block_on(server.queue_count()), Err(Error::RateLimited));
        assert_eq!(block_on(server.queue_count()), Ok(0));
        server.set_failing(Some(Error::PermissionDenied));
        assert_eq!(block_on(server.clear_queue()), Err(Error::PermissionDenied));
        server.set_failing(None);
        assert_eq!(server.calls("queue_count"), 2);
        assert_eq!(server.calls("clear_queue"), 1);
    }

    #[test]
    fn queue_is_bounded() {
        let server = MockServer::new();
        server.add_clip(clip(), "clip");
        for _ in 0..MAX_QUEUE_SIZE {
            block_on(server.add_to_queue(clip(), true)).unwrap();
        }
        assert_eq!(
            block_on(server.add_to_queue(clip(), true)),
            Err(Error::QueueFull)
        );
        let first = block_on(server.add_to_queue(clip(), false));
        assert_eq!(first, Err(Error::QueueFull));
        assert_eq!(block_on(server.queue_count()), Ok(MAX_QUEUE_SIZE));
    }

    #[test]
    fn reorder_clamps_to_queue_length() {
        let server = MockServer::new();
        server.add_clip(clip(), "clip");
        let a = block_on(server.add_to_queue(clip(), true)).unwrap();
        let b = block_on(server.add_to_queue(clip(), true)).unwrap();
        assert_eq!((a.position, b.position), (1, 2));
        block_on(server.reorder_queue(a.id, 99)).unwrap();
        let queue = block_on(server.get_queue(10)).unwrap();
        assert_eq!(
            queue.items.iter().map(|i| (i.id, i.position)).collect::<Vec<_>>(),
            vec![(b.id, 1), (a.id, 2)]
        );
        assert_eq!(
            block_on(server.reorder_queue(a.id, 0)),
            Err(Error::InvalidPosition(0))
        );
    }
}
