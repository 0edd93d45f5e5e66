use std::sync::Arc;

use futures::FutureExt;

use crate::{
    api::{ClipId, Page, QueueItem, QueueItemId, Remote},
    cache::{Fetcher, QueryData, QueryKey},
    counter,
    list::{move_to_position, remove_from_page, renumber},
    optimistic::run_optimistic,
    Client, Error,
};

/// Prefix of both the cached queue contents and the cached queue count
pub fn queue_prefix() -> QueryKey {
    QueryKey::root("queue")
}

pub fn queue_items_key(limit: u32) -> QueryKey {
    queue_prefix().with("items").with(limit)
}

pub fn queue_count_key() -> QueryKey {
    queue_prefix().with("count")
}

fn as_queue(data: QueryData) -> Option<Page<QueueItem>> {
    match data {
        QueryData::Queue(page) => Some(page),
        _ => None,
    }
}

fn as_count(data: QueryData) -> Option<u64> {
    match data {
        QueryData::Count(n) => Some(n),
        _ => None,
    }
}

/// Drops `item` from a cached queue page and decrements a cached queue count
fn drop_item(data: &QueryData, item: QueueItemId) -> Option<QueryData> {
    match data {
        QueryData::Queue(page) => {
            remove_from_page(page, item).map(|p| QueryData::Queue(renumber(&p)))
        }
        QueryData::Count(n) => Some(QueryData::Count(counter::decrement(*n))),
        _ => None,
    }
}

impl<R: Remote + 'static> Client<R> {
    /// The first `limit` unplayed items of the queue, in play order
    pub async fn fetch_queue(&self, limit: u32) -> Result<Page<QueueItem>, Error> {
        let remote = self.remote().clone();
        let fetcher: Fetcher = Arc::new(move || {
            let remote = remote.clone();
            async move { remote.get_queue(limit).await.map(QueryData::Queue) }.boxed()
        });
        self.fetch_as(queue_items_key(limit), fetcher, as_queue)
            .await
    }

    pub async fn fetch_queue_count(&self) -> Result<u64, Error> {
        let remote = self.remote().clone();
        let fetcher: Fetcher = Arc::new(move || {
            let remote = remote.clone();
            async move { remote.queue_count().await.map(QueryData::Count) }.boxed()
        });
        self.fetch_as(queue_count_key(), fetcher, as_count).await
    }

    pub fn cached_queue(&self, limit: u32) -> Option<Page<QueueItem>> {
        self.cached_as(&queue_items_key(limit), as_queue)
    }

    pub fn cached_queue_count(&self) -> Option<u64> {
        self.cached_as(&queue_count_key(), as_count)
    }

    /// Adds `clip` at the end of the queue, or at its top
    ///
    /// Only the count is bumped right away, the item shows up once the queue is refetched.
    pub async fn add_to_queue(&self, clip: ClipId, at_end: bool) -> Result<QueueItem, Error> {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![queue_prefix()],
            |_, data| match data {
                QueryData::Count(n) => Some(QueryData::Count(counter::increment(*n))),
                _ => None,
            },
            move || async move { remote.add_to_queue(clip, at_end).await },
        )
        .await
    }

    pub async fn remove_from_queue(&self, item: QueueItemId) -> Result<(), Error> {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![queue_prefix()],
            |_, data| drop_item(data, item),
            move || async move { remote.remove_from_queue(item).await },
        )
        .await
    }

    /// Marks `item` as played, which takes it out of the queue
    pub async fn mark_played(&self, item: QueueItemId) -> Result<(), Error> {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![queue_prefix()],
            |_, data| drop_item(data, item),
            move || async move { remote.mark_played(item).await },
        )
        .await
    }

    /// Moves `item` to the 1-based `position`, clamped to the queue length
    pub async fn reorder_queue(&self, item: QueueItemId, position: u32) -> Result<(), Error> {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![queue_prefix()],
            |_, data| match data {
                QueryData::Queue(page) => {
                    move_to_position(page, item, position).map(QueryData::Queue)
                }
                _ => None,
            },
            move || async move { remote.reorder_queue(item, position).await },
        )
        .await
    }

    pub async fn clear_queue(&self) -> Result<(), Error> {
        let remote = self.remote().clone();
        run_optimistic(
            self.cache(),
            vec![queue_prefix()],
            |_, data| match data {
                QueryData::Queue(page) => Some(QueryData::Queue(Page {
                    items: im::Vector::new(),
                    total: 0,
                    has_more: false,
                    ..page.clone()
                })),
                QueryData::Count(_) => Some(QueryData::Count(0)),
                _ => None,
            },
            move || async move { remote.clear_queue().await },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clipper_mock_server::MockServer;
    use futures::{channel::oneshot, executor::block_on};

    use super::*;
    use crate::{api, QueryCache};

    fn setup(clips: u128) -> (Client<MockServer>, Vec<QueueItemId>) {
        let client = Client::new(
            QueryCache::new(),
            Arc::new(MockServer::new()),
            Default::default(),
        );
        let items = (0..clips)
            .map(|i| {
                let clip = ClipId(api::Uuid::from_u128(i + 1));
                client.remote().add_clip(clip, "clip");
                block_on(client.remote().add_to_queue(clip, true)).unwrap().id
            })
            .collect();
        block_on(client.fetch_queue(50)).unwrap();
        block_on(client.fetch_queue(2)).unwrap();
        block_on(client.fetch_queue_count()).unwrap();
        (client, items)
    }

    fn positions(page: &Page<QueueItem>) -> Vec<(QueueItemId, u32)> {
        page.items.iter().map(|i| (i.id, i.position)).collect()
    }

    #[test]
    fn removal_is_optimistic_on_list_and_count() {
        let (client, items) = setup(3);
        let (send, recv) = oneshot::channel();
        client.remote().hold_next(recv);
        let mut removal = client.remove_from_queue(items[0]).boxed_local();
        assert!(removal.as_mut().now_or_never().is_none());

        assert_eq!(client.cached_queue_count(), Some(2));
        assert_eq!(
            positions(&client.cached_queue(50).unwrap()),
            vec![(items[1], 1), (items[2], 2)]
        );
        assert_eq!(
            positions(&client.cached_queue(2).unwrap()),
            vec![(items[1], 1)]
        );

        send.send(()).unwrap();
        block_on(removal).unwrap();
        assert_eq!(client.cached_queue_count(), Some(2));
        assert_eq!(
            positions(&client.cached_queue(2).unwrap()),
            vec![(items[1], 1), (items[2], 2)]
        );
    }

    #[test]
    fn failed_removal_restores_list_and_count() {
        let (client, items) = setup(3);
        let before = client.cache().get_all_matching(&queue_prefix());
        client.remote().fail_next(api::Error::Network(String::from("offline")));
        assert!(block_on(client.mark_played(items[1])).is_err());
        assert_eq!(client.cache().get_all_matching(&queue_prefix()), before);
    }

    #[test]
    fn count_never_goes_negative() {
        let (client, _) = setup(0);
        client
            .cache()
            .set(queue_count_key(), QueryData::Count(0))
            .unwrap();
        let ghost = QueueItemId(api::Uuid::from_u128(9));
        let (send, recv) = oneshot::channel();
        client.remote().hold_next(recv);
        let mut removal = client.remove_from_queue(ghost).boxed_local();
        assert!(removal.as_mut().now_or_never().is_none());
        assert_eq!(client.cached_queue_count(), Some(0));
        send.send(()).unwrap();
        assert_eq!(
            block_on(removal),
            Err(Error::Remote(api::Error::NotFound(String::from("queue item"))))
        );
        assert_eq!(client.cached_queue_count(), Some(0));
    }

    #[test]
    fn add_bumps_count_then_refetches_items() {
        let (client, _) = setup(1);
        let clip = ClipId(api::Uuid::from_u128(42));
        client.remote().add_clip(clip, "new clip");
        let item = block_on(client.add_to_queue(clip, false)).unwrap();
        assert_eq!(item.position, 1);
        assert_eq!(client.cached_queue_count(), Some(2));
        let queue = client.cached_queue(50).unwrap();
        assert_eq!(queue.items[0].clip_id, clip);
        assert_eq!(queue.items[1].position, 2);
    }

    #[test]
    fn full_queue_is_reported() {
        let (client, _) = setup(1);
        client.remote().fail_next(api::Error::QueueFull);
        assert_eq!(
            block_on(client.add_to_queue(ClipId(api::Uuid::from_u128(1)), true)),
            Err(Error::Remote(api::Error::QueueFull))
        );
        assert_eq!(client.cached_queue_count(), Some(1));
    }

    #[test]
    fn reorder_preview_respects_truncated_pages() {
        let (client, items) = setup(3);
        let (send, recv) = oneshot::channel();
        client.remote().hold_next(recv);
        let mut reorder = client.reorder_queue(items[0], 3).boxed_local();
        assert!(reorder.as_mut().now_or_never().is_none());
        assert_eq!(
            positions(&client.cached_queue(2).unwrap()),
            vec![(items[1], 1)]
        );

        send.send(()).unwrap();
        block_on(reorder).unwrap();
        assert_eq!(
            positions(&client.cached_queue(2).unwrap()),
            vec![(items[1], 1), (items[2], 2)]
        );
    }

    #[test]
    fn reorder_clamps_and_renumbers() {
        let (client, items) = setup(3);
        block_on(client.reorder_queue(items[0], 10)).unwrap();
        assert_eq!(
            positions(&client.cached_queue(50).unwrap()),
            vec![(items[1], 1), (items[2], 2), (items[0], 3)]
        );
        block_on(client.reorder_queue(items[0], 1)).unwrap();
        assert_eq!(
            positions(&client.cached_queue(50).unwrap()),
            vec![(items[0], 1), (items[1], 2), (items[2], 3)]
        );
    }

    #[test]
    fn rejected_reorder_is_rolled_back() {
        let (client, items) = setup(3);
        let before = client.cached_queue(50);
        assert_eq!(
            block_on(client.reorder_queue(items[2], 0)),
            Err(Error::Remote(api::Error::InvalidPosition(0)))
        );
        assert_eq!(client.cached_queue(50), before);
    }

    #[test]
    fn clear_empties_everything() {
        let (client, _) = setup(3);
        block_on(client.clear_queue()).unwrap();
        assert_eq!(client.cached_queue_count(), Some(0));
        assert!(client.cached_queue(50).unwrap().items.is_empty());
        assert!(client.cached_queue(2).unwrap().items.is_empty());
    }
}
