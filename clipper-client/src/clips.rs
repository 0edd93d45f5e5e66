use std::sync::Arc;

use futures::FutureExt;

use crate::{
    api::{Clip, ClipId, Page, Remote, VoteDirection},
    cache::{Fetcher, QueryData, QueryKey},
    list::patch_page,
    optimistic::run_optimistic,
    vote::transition,
    Client, Error, Votable,
};

pub fn clips_prefix() -> QueryKey {
    QueryKey::root("clips")
}

pub fn clips_key(feed: &str, page: u32, limit: u32) -> QueryKey {
    clips_prefix().with(feed).with(page).with(limit)
}

fn as_clips(data: QueryData) -> Option<Page<Clip>> {
    match data {
        QueryData::Clips(page) => Some(page),
        _ => None,
    }
}

impl<R: Remote + 'static> Client<R> {
    /// Page `page` of clip feed `feed` (eg. `hot`, `new`, `top`)
    pub async fn fetch_clips(&self, feed: &str, page: u32) -> Result<Page<Clip>, Error> {
        let limit = self.config().page_size;
        let remote = self.remote().clone();
        let owned_feed = String::from(feed);
        let fetcher: Fetcher = Arc::new(move || {
            let remote = remote.clone();
            let feed = owned_feed.clone();
            async move {
                remote
                    .list_clips(&feed, page, limit)
                    .await
                    .map(QueryData::Clips)
            }
            .boxed()
        });
        self.fetch_as(clips_key(feed, page, limit), fetcher, as_clips)
            .await
    }

    pub fn cached_clips(&self, feed: &str, page: u32) -> Option<Page<Clip>> {
        let limit = self.config().page_size;
        self.cached_as(&clips_key(feed, page, limit), as_clips)
    }

    /// First cached occurrence of clip `id`, in any feed
    pub fn cached_clip(&self, id: ClipId) -> Option<Clip> {
        self.cache()
            .get_all_matching(&clips_prefix())
            .into_iter()
            .filter_map(|(_, data)| as_clips(data))
            .find_map(|page| page.items.into_iter().find(|c| c.id == id))
    }

    /// Presses the `direction` vote button on clip `id` in every feed, returning the
    /// resulting vote
    pub async fn vote_clip(
        &self,
        id: ClipId,
        direction: VoteDirection,
    ) -> Result<Option<VoteDirection>, Error> {
        let current = self.cached_clip(id).and_then(|c| c.user_vote);
        let (new_vote, _) = transition(current, direction);
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![clips_prefix()],
            |_, data| match data {
                QueryData::Clips(page) => patch_page(page, id, |c| {
                    let mut c = c.clone();
                    c.set_vote(new_vote);
                    c
                })
                .map(QueryData::Clips),
                _ => None,
            },
            move || async move { remote.vote_clip(id, new_vote).await },
        )
        .await?;
        Ok(new_vote)
    }
}
