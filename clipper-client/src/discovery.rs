use std::sync::Arc;

use futures::FutureExt;

use crate::{
    api::{DiscoveryList, DiscoveryListId, Page, Remote},
    cache::{Fetcher, QueryData, QueryKey},
    counter,
    list::patch_page,
    optimistic::run_optimistic,
    Client, Error,
};

/// Prefix of every cached page of discovery lists
pub fn discovery_lists_prefix() -> QueryKey {
    QueryKey::root("discovery-lists")
}

pub fn discovery_lists_key(featured_only: bool, page: u32, limit: u32) -> QueryKey {
    discovery_lists_prefix()
        .with(if featured_only { "featured" } else { "all" })
        .with(page)
        .with(limit)
}

pub fn discovery_list_key(id: DiscoveryListId) -> QueryKey {
    QueryKey::root("discovery-list").with(id.0)
}

fn as_lists(data: QueryData) -> Option<Page<DiscoveryList>> {
    match data {
        QueryData::DiscoveryLists(page) => Some(page),
        _ => None,
    }
}

fn as_list(data: QueryData) -> Option<DiscoveryList> {
    match data {
        QueryData::DiscoveryList(list) => Some(list),
        _ => None,
    }
}

fn set_following(list: &DiscoveryList, following: bool) -> DiscoveryList {
    let follower_count = match (list.is_following, following) {
        (false, true) => counter::increment(list.follower_count),
        (true, false) => counter::decrement(list.follower_count),
        _ => list.follower_count,
    };
    DiscoveryList {
        is_following: following,
        follower_count,
        ..list.clone()
    }
}

fn set_bookmarked(list: &DiscoveryList, bookmarked: bool) -> DiscoveryList {
    DiscoveryList {
        is_bookmarked: bookmarked,
        ..list.clone()
    }
}

/// Applies `transform` to list `id` in both cached list pages and cached list details
fn patch_list<F>(data: &QueryData, id: DiscoveryListId, transform: F) -> Option<QueryData>
where
    F: Fn(&DiscoveryList) -> DiscoveryList,
{
    match data {
        QueryData::DiscoveryLists(page) => {
            patch_page(page, id, transform).map(QueryData::DiscoveryLists)
        }
        QueryData::DiscoveryList(list) if list.id == id => {
            Some(QueryData::DiscoveryList(transform(list)))
        }
        _ => None,
    }
}

impl<R: Remote + 'static> Client<R> {
    pub async fn fetch_discovery_lists(
        &self,
        featured_only: bool,
        page: u32,
    ) -> Result<Page<DiscoveryList>, Error> {
        let limit = self.config().page_size;
        let remote = self.remote().clone();
        let fetcher: Fetcher = Arc::new(move || {
            let remote = remote.clone();
            async move {
                remote
                    .list_discovery_lists(featured_only, page, limit)
                    .await
                    .map(QueryData::DiscoveryLists)
            }
            .boxed()
        });
        self.fetch_as(
            discovery_lists_key(featured_only, page, limit),
            fetcher,
            as_lists,
        )
        .await
    }

    pub async fn fetch_discovery_list(&self, id: DiscoveryListId) -> Result<DiscoveryList, Error> {
        let remote = self.remote().clone();
        let fetcher: Fetcher = Arc::new(move || {
            let remote = remote.clone();
            async move {
                remote
                    .get_discovery_list(id)
                    .await
                    .map(QueryData::DiscoveryList)
            }
            .boxed()
        });
        self.fetch_as(discovery_list_key(id), fetcher, as_list)
            .await
    }

    pub fn cached_discovery_lists(
        &self,
        featured_only: bool,
        page: u32,
    ) -> Option<Page<DiscoveryList>> {
        let limit = self.config().page_size;
        self.cached_as(&discovery_lists_key(featured_only, page, limit), as_lists)
    }

    pub fn cached_discovery_list(&self, id: DiscoveryListId) -> Option<DiscoveryList> {
        self.cached_as(&discovery_list_key(id), as_list)
    }

    async fn mutate_list<F, Fut>(
        &self,
        id: DiscoveryListId,
        transform: impl Fn(&DiscoveryList) -> DiscoveryList,
        request: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(Arc<R>) -> Fut,
        Fut: std::future::Future<Output = Result<(), crate::api::Error>>,
    {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![discovery_lists_prefix(), discovery_list_key(id)],
            |_, data| patch_list(data, id, &transform),
            move || request(remote),
        )
        .await
    }

    pub async fn follow_list(&self, id: DiscoveryListId) -> Result<(), Error> {
        self.mutate_list(
            id,
            |l| set_following(l, true),
            move |r| async move { r.follow_list(id).await },
        )
        .await
    }

    pub async fn unfollow_list(&self, id: DiscoveryListId) -> Result<(), Error> {
        self.mutate_list(
            id,
            |l| set_following(l, false),
            move |r| async move { r.unfollow_list(id).await },
        )
        .await
    }

    pub async fn bookmark_list(&self, id: DiscoveryListId) -> Result<(), Error> {
        self.mutate_list(
            id,
            |l| set_bookmarked(l, true),
            move |r| async move { r.bookmark_list(id).await },
        )
        .await
    }

    pub async fn unbookmark_list(&self, id: DiscoveryListId) -> Result<(), Error> {
        self.mutate_list(
            id,
            |l| set_bookmarked(l, false),
            move |r| async move { r.unbookmark_list(id).await },
        )
        .await
    }
}
