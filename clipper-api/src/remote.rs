use async_trait::async_trait;

use crate::{
    Clip, ClipId, Comment, CommentId, CommentSort, DiscoveryList, DiscoveryListId, Error,
    NewComment, Page, QueueItem, QueueItemId, VoteDirection,
};

/// The backend, as seen by the client cache
///
/// Every call either succeeds with the server-confirmed value or fails with the error the
/// transport or the server reported. Implementations never retry on their own.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Root comments of `clip` with their nested replies, `page` is 1-based
    async fn list_comments(
        &self,
        clip: ClipId,
        sort: CommentSort,
        page: u32,
        limit: u32,
    ) -> Result<Page<Comment>, Error>;
    async fn create_comment(&self, clip: ClipId, comment: NewComment) -> Result<Comment, Error>;
    async fn edit_comment(&self, comment: CommentId, content: String) -> Result<(), Error>;
    async fn delete_comment(&self, comment: CommentId) -> Result<(), Error>;
    /// `vote` is the vote the user ends up with, `None` removing any previous vote
    async fn vote_comment(
        &self,
        comment: CommentId,
        vote: Option<VoteDirection>,
    ) -> Result<(), Error>;

    async fn list_clips(&self, feed: &str, page: u32, limit: u32) -> Result<Page<Clip>, Error>;
    async fn vote_clip(&self, clip: ClipId, vote: Option<VoteDirection>) -> Result<(), Error>;

    /// Unplayed items of the current user's queue, in play order
    async fn get_queue(&self, limit: u32) -> Result<Page<QueueItem>, Error>;
    async fn queue_count(&self) -> Result<u64, Error>;
    async fn add_to_queue(&self, clip: ClipId, at_end: bool) -> Result<QueueItem, Error>;
    async fn remove_from_queue(&self, item: QueueItemId) -> Result<(), Error>;
    /// `new_position` is 1-based, and clamped by the server to the queue length
    async fn reorder_queue(&self, item: QueueItemId, new_position: u32) -> Result<(), Error>;
    async fn mark_played(&self, item: QueueItemId) -> Result<(), Error>;
    async fn clear_queue(&self) -> Result<(), Error>;

    async fn list_discovery_lists(
        &self,
        featured_only: bool,
        page: u32,
        limit: u32,
    ) -> Result<Page<DiscoveryList>, Error>;
    async fn get_discovery_list(&self, list: DiscoveryListId) -> Result<DiscoveryList, Error>;
    async fn follow_list(&self, list: DiscoveryListId) -> Result<(), Error>;
    async fn unfollow_list(&self, list: DiscoveryListId) -> Result<(), Error>;
    async fn bookmark_list(&self, list: DiscoveryListId) -> Result<(), Error>;
    async fn unbookmark_list(&self, list: DiscoveryListId) -> Result<(), Error>;
}
