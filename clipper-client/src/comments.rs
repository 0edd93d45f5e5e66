use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;

use crate::{
    api::{ClipId, Comment, CommentId, CommentSort, NewComment, Page, Remote, VoteDirection},
    cache::{Fetcher, QueryData, QueryKey},
    optimistic::run_optimistic,
    tree::patch_forest,
    vote::transition,
    Client, Error, Votable,
};

/// Prefix of every cached comment page of `clip`, whatever the sort order or page
pub fn comments_prefix(clip: ClipId) -> QueryKey {
    QueryKey::root("comments").with(clip.0)
}

pub fn comments_key(clip: ClipId, sort: CommentSort, page: u32, limit: u32) -> QueryKey {
    comments_prefix(clip)
        .with(sort.as_str())
        .with(page)
        .with(limit)
}

fn as_comments(data: QueryData) -> Option<Page<Comment>> {
    match data {
        QueryData::Comments(page) => Some(page),
        _ => None,
    }
}

/// Applies `transform` to comment `id` wherever it appears in a cached comment page
fn patch_comment<F>(data: &QueryData, id: CommentId, transform: F) -> Option<QueryData>
where
    F: Fn(&Comment) -> Comment,
{
    match data {
        QueryData::Comments(page) => patch_forest(&page.items, id, &transform).map(|items| {
            QueryData::Comments(Page {
                items,
                ..page.clone()
            })
        }),
        _ => None,
    }
}

impl<R: Remote + 'static> Client<R> {
    /// Root comments of `clip` with their replies, `page` being 1-based
    pub async fn fetch_comments(
        &self,
        clip: ClipId,
        sort: CommentSort,
        page: u32,
    ) -> Result<Page<Comment>, Error> {
        let limit = self.config().page_size;
        let remote = self.remote().clone();
        let fetcher: Fetcher = Arc::new(move || {
            let remote = remote.clone();
            async move {
                remote
                    .list_comments(clip, sort, page, limit)
                    .await
                    .map(QueryData::Comments)
            }
            .boxed()
        });
        self.fetch_as(comments_key(clip, sort, page, limit), fetcher, as_comments)
            .await
    }

    pub fn cached_comments(&self, clip: ClipId, sort: CommentSort, page: u32) -> Option<Page<Comment>> {
        let limit = self.config().page_size;
        self.cached_as(&comments_key(clip, sort, page, limit), as_comments)
    }

    /// First cached occurrence of comment `id`, in any page of `clip`
    pub fn cached_comment(&self, clip: ClipId, id: CommentId) -> Option<Comment> {
        self.cache()
            .get_all_matching(&comments_prefix(clip))
            .into_iter()
            .filter_map(|(_, data)| as_comments(data))
            .find_map(|page| Comment::find_in(&page.items, id).cloned())
    }

    /// Posts a comment on `clip`, as a reply to `parent` if set
    ///
    /// The parent's reply count is bumped right away. The new comment itself only shows up
    /// in the cache once the comment pages are refetched.
    pub async fn create_comment(
        &self,
        clip: ClipId,
        parent: Option<CommentId>,
        content: String,
    ) -> Result<Comment, Error> {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![comments_prefix(clip)],
            |_, data| {
                let parent = parent?;
                patch_comment(data, parent, |c| Comment {
                    child_count: c.child_count.saturating_add(1),
                    ..c.clone()
                })
            },
            move || async move {
                remote
                    .create_comment(
                        clip,
                        NewComment {
                            content,
                            parent_id: parent,
                        },
                    )
                    .await
            },
        )
        .await
    }

    pub async fn edit_comment(
        &self,
        clip: ClipId,
        id: CommentId,
        content: String,
    ) -> Result<(), Error> {
        let remote = self.remote().clone();
        let edited_at = Utc::now();
        let patched_content = content.clone();
        run_optimistic(
            self.cache(),
            vec![comments_prefix(clip)],
            |_, data| {
                patch_comment(data, id, |c| Comment {
                    content: patched_content.clone(),
                    is_edited: true,
                    edited_at: Some(edited_at),
                    ..c.clone()
                })
            },
            move || async move { remote.edit_comment(id, content).await },
        )
        .await
    }

    /// Soft-deletes a comment: its content is replaced, its replies stay in place
    pub async fn delete_comment(&self, clip: ClipId, id: CommentId) -> Result<(), Error> {
        let remote = self.remote().clone();
        let placeholder = self.config().deleted_placeholder.clone();
        run_optimistic(
            self.cache(),
            vec![comments_prefix(clip)],
            |_, data| {
                patch_comment(data, id, |c| Comment {
                    content: placeholder.clone(),
                    is_deleted: true,
                    ..c.clone()
                })
            },
            move || async move { remote.delete_comment(id).await },
        )
        .await
    }

    /// Presses the `direction` vote button on comment `id`, returning the resulting vote
    ///
    /// The resulting vote is computed from the first cached occurrence of the comment, and
    /// is what gets sent to the server.
    pub async fn vote_comment(
        &self,
        clip: ClipId,
        id: CommentId,
        direction: VoteDirection,
    ) -> Result<Option<VoteDirection>, Error> {
        let current = self.cached_comment(clip, id).and_then(|c| c.user_vote);
        let (new_vote, _) = transition(current, direction);
        tracing::debug!(?id, ?current, ?new_vote, "voting on comment");
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![comments_prefix(clip)],
            |_, data| {
                patch_comment(data, id, |c| {
                    let mut c = c.clone();
                    c.set_vote(new_vote);
                    c
                })
            },
            move || async move { remote.vote_comment(id, new_vote).await },
        )
        .await?;
        Ok(new_vote)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clipper_mock_server::MockServer;
    use futures::executor::block_on;

    use super::*;
    use crate::{api, QueryCache};

    const CLIP: u128 = 100;

    fn setup() -> (Client<MockServer>, Vec<CommentId>) {
        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::fmt::try_init();
        }
        let server = MockServer::new();
        let clip = ClipId(api::Uuid::from_u128(CLIP));
        server.add_clip(clip, "some clip");
        let root = server.add_comment(clip, None, "root", 5);
        let reply = server.add_comment(clip, Some(root), "reply", 0);
        let nested = server.add_comment(clip, Some(reply), "nested", 2);
        server.add_comment(clip, Some(root), "other reply", 0);
        server.add_comment(clip, Some(root), "third reply", 0);
        let client = Client::new(QueryCache::new(), Arc::new(server), Default::default());
        (client, vec![root, reply, nested])
    }

    fn clip() -> ClipId {
        ClipId(api::Uuid::from_u128(CLIP))
    }

    fn cached(client: &Client<MockServer>, id: CommentId) -> Comment {
        client.cached_comment(clip(), id).unwrap()
    }

    #[test]
    fn failed_upvote_rolls_back() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        let before = client.cache().get_all_matching(&comments_prefix(clip()));

        client.remote().fail_next(api::Error::Network(String::from("offline")));
        let res = block_on(client.vote_comment(clip(), ids[0], VoteDirection::Up));
        assert_eq!(
            res,
            Err(Error::Remote(api::Error::Network(String::from("offline"))))
        );
        let root = cached(&client, ids[0]);
        assert_eq!((root.vote_score, root.user_vote), (5, None));
        assert_eq!(client.cache().get_all_matching(&comments_prefix(clip())), before);
    }

    #[test]
    fn upvote_is_confirmed_by_refetch() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        let res = block_on(client.vote_comment(clip(), ids[0], VoteDirection::Up));
        assert_eq!(res, Ok(Some(VoteDirection::Up)));
        let root = cached(&client, ids[0]);
        assert_eq!((root.vote_score, root.user_vote), (6, Some(VoteDirection::Up)));

        let res = block_on(client.vote_comment(clip(), ids[0], VoteDirection::Up));
        assert_eq!(res, Ok(None));
        let root = cached(&client, ids[0]);
        assert_eq!((root.vote_score, root.user_vote), (5, None));
    }

    #[test]
    fn nested_vote_touches_only_target() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        block_on(client.fetch_comments(clip(), CommentSort::New, 1)).unwrap();

        client.remote().fail_next(api::Error::RateLimited);
        let before = client.cache().get_all_matching(&comments_prefix(clip()));
        let (send, recv) = futures::channel::oneshot::channel::<()>();
        client.remote().hold_next(recv);
        let mut vote = client
            .vote_comment(clip(), ids[2], VoteDirection::Up)
            .boxed_local();
        assert!(vote.as_mut().now_or_never().is_none());

        for (_, data) in client.cache().get_all_matching(&comments_prefix(clip())) {
            let page = as_comments(data).unwrap();
            let nested = Comment::find_in(&page.items, ids[2]).unwrap();
            assert_eq!((nested.vote_score, nested.user_vote), (3, Some(VoteDirection::Up)));
            assert_eq!(Comment::find_in(&page.items, ids[1]).unwrap().vote_score, 0);
            assert_eq!(Comment::find_in(&page.items, ids[0]).unwrap().vote_score, 5);
        }

        send.send(()).unwrap();
        assert_eq!(block_on(vote), Err(Error::Remote(api::Error::RateLimited)));
        assert_eq!(client.cache().get_all_matching(&comments_prefix(clip())), before);
    }

    #[test]
    fn concurrent_failed_votes_are_both_undone() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();

        let (send_root, recv) = futures::channel::oneshot::channel::<()>();
        client.remote().hold_next(recv);
        let mut root_vote = client
            .vote_comment(clip(), ids[0], VoteDirection::Up)
            .boxed_local();
        assert!(root_vote.as_mut().now_or_never().is_none());
        let (send_nested, recv) = futures::channel::oneshot::channel::<()>();
        client.remote().hold_next(recv);
        let mut nested_vote = client
            .vote_comment(clip(), ids[2], VoteDirection::Up)
            .boxed_local();
        assert!(nested_vote.as_mut().now_or_never().is_none());
        assert_eq!(cached(&client, ids[0]).vote_score, 6);
        assert_eq!(cached(&client, ids[2]).vote_score, 3);

        client.remote().fail_next(api::Error::RateLimited);
        send_root.send(()).unwrap();
        assert_eq!(block_on(root_vote), Err(Error::Remote(api::Error::RateLimited)));
        client.remote().fail_next(api::Error::RateLimited);
        send_nested.send(()).unwrap();
        assert_eq!(block_on(nested_vote), Err(Error::Remote(api::Error::RateLimited)));

        let root = cached(&client, ids[0]);
        assert_eq!((root.vote_score, root.user_vote), (5, None));
        let nested = cached(&client, ids[2]);
        assert_eq!((nested.vote_score, nested.user_vote), (2, None));
    }

    #[test]
    fn reply_bumps_parent_child_count() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        assert_eq!(cached(&client, ids[0]).child_count, 3);

        client.remote().fail_next(api::Error::PermissionDenied);
        let res = block_on(client.create_comment(clip(), Some(ids[0]), String::from("hi")));
        assert_eq!(res, Err(Error::Remote(api::Error::PermissionDenied)));
        assert_eq!(cached(&client, ids[0]).child_count, 3);

        let created =
            block_on(client.create_comment(clip(), Some(ids[0]), String::from("hi"))).unwrap();
        assert_eq!(created.parent_id, Some(ids[0]));
        let root = cached(&client, ids[0]);
        assert_eq!(root.child_count, 4);
        assert!(root.replies.iter().any(|c| c.id == created.id));
    }

    #[test]
    fn reply_child_count_is_optimistic() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        let (send, recv) = futures::channel::oneshot::channel::<()>();
        client.remote().hold_next(recv);
        client.remote().fail_next(api::Error::Network(String::from("offline")));
        let mut reply = client
            .create_comment(clip(), Some(ids[1]), String::from("hi"))
            .boxed_local();
        assert!(reply.as_mut().now_or_never().is_none());
        assert_eq!(cached(&client, ids[1]).child_count, 2);
        send.send(()).unwrap();
        assert!(block_on(reply).is_err());
        assert_eq!(cached(&client, ids[1]).child_count, 1);
    }

    #[test]
    fn edit_and_delete_keep_structure() {
        let (client, ids) = setup();
        block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        let replies_before = cached(&client, ids[0]).replies.len();

        block_on(client.edit_comment(clip(), ids[1], String::from("edited"))).unwrap();
        let reply = cached(&client, ids[1]);
        assert_eq!(reply.content, "edited");
        assert!(reply.is_edited);
        assert!(reply.edited_at.is_some());

        block_on(client.delete_comment(clip(), ids[1])).unwrap();
        let reply = cached(&client, ids[1]);
        assert!(reply.is_deleted);
        assert_eq!(reply.content, "[deleted]");
        assert_eq!(reply.replies.len(), 1);
        assert_eq!(cached(&client, ids[0]).replies.len(), replies_before);
        assert_eq!(cached(&client, ids[0]).child_count, 3);
    }

    #[test]
    fn voting_uncached_comment_sends_requested_vote() {
        let (client, ids) = setup();
        let res = block_on(client.vote_comment(clip(), ids[1], VoteDirection::Down));
        assert_eq!(res, Ok(Some(VoteDirection::Down)));
        let page = block_on(client.fetch_comments(clip(), CommentSort::Best, 1)).unwrap();
        let reply = Comment::find_in(&page.items, ids[1]).unwrap();
        assert_eq!((reply.vote_score, reply.user_vote), (-1, Some(VoteDirection::Down)));
    }
}
