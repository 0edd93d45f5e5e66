use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::json;

use clipper_api::{
    Clip, ClipId, Comment, CommentId, CommentSort, DiscoveryList, DiscoveryListId, Error,
    NewComment, Page, QueueItem, QueueItemId, Remote, VoteDirection,
};

/// `{"success": true, "data": ..., "meta": ...}` envelope of the newer endpoints
#[derive(serde::Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    meta: Option<PaginationMeta>,
}

#[derive(serde::Deserialize)]
struct PaginationMeta {
    page: u32,
    limit: u32,
    total: u64,
    has_next: bool,
}

#[derive(serde::Deserialize)]
struct CommentList {
    comments: Vec<Comment>,
    has_more: bool,
}

#[derive(serde::Deserialize)]
struct QueueContents {
    items: Vec<QueueItem>,
    total: u64,
}

#[derive(serde::Deserialize)]
struct QueueCount {
    count: u64,
}

fn offset(page: u32, limit: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(limit)
}

/// Offset-paginated endpoints do not report a total, so it is a lower bound
fn offset_page<T: Clone>(items: Vec<T>, page: u32, limit: u32, has_more: bool) -> Page<T> {
    let total = offset(page, limit) + items.len() as u64 + u64::from(has_more);
    Page {
        items: items.into_iter().collect(),
        total,
        page: page.max(1),
        limit,
        has_more,
    }
}

fn clips_page(envelope: Envelope<Vec<Clip>>, page: u32, limit: u32) -> Page<Clip> {
    match envelope.meta {
        Some(meta) => Page {
            items: envelope.data.into_iter().collect(),
            total: meta.total,
            page: meta.page,
            limit: meta.limit,
            has_more: meta.has_next,
        },
        None => {
            let has_more = envelope.data.len() as u32 == limit;
            offset_page(envelope.data, page, limit, has_more)
        }
    }
}

/// The backend's REST API
pub struct HttpRemote {
    client: reqwest::Client,
    host: String,
    token: Option<String>,
}

impl HttpRemote {
    /// `host` is the backend's base url, eg. `https://clipper.example`
    pub fn new(host: impl Into<String>, token: Option<String>) -> HttpRemote {
        HttpRemote {
            client: reqwest::Client::new(),
            host: host.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.host.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, Error> {
        let resp = req.send().await.map_err(|e| Error::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        let err = Error::from_response(status, &body);
        tracing::debug!(%status, ?err, "backend refused request");
        Err(err)
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, Error> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| Error::Unknown(format!("parsing backend response: {e}")))
    }

    async fn unit(&self, req: RequestBuilder) -> Result<(), Error> {
        self.send(req).await.map(|_| ())
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn list_comments(
        &self,
        clip: ClipId,
        sort: CommentSort,
        page: u32,
        limit: u32,
    ) -> Result<Page<Comment>, Error> {
        let req = self
            .request(Method::GET, &format!("clips/{}/comments", clip.0))
            .query(&[
                ("sort", String::from(sort.as_str())),
                ("limit", limit.to_string()),
                ("cursor", offset(page, limit).to_string()),
                ("include_replies", String::from("true")),
            ]);
        let list: CommentList = self.json(req).await?;
        Ok(offset_page(list.comments, page, limit, list.has_more))
    }

    async fn create_comment(&self, clip: ClipId, comment: NewComment) -> Result<Comment, Error> {
        let req = self
            .request(Method::POST, &format!("clips/{}/comments", clip.0))
            .json(&comment);
        self.json(req).await
    }

    async fn edit_comment(&self, comment: CommentId, content: String) -> Result<(), Error> {
        let req = self
            .request(Method::PUT, &format!("comments/{}", comment.0))
            .json(&json!({ "content": content }));
        self.unit(req).await
    }

    async fn delete_comment(&self, comment: CommentId) -> Result<(), Error> {
        self.unit(self.request(Method::DELETE, &format!("comments/{}", comment.0)))
            .await
    }

    async fn vote_comment(
        &self,
        comment: CommentId,
        vote: Option<VoteDirection>,
    ) -> Result<(), Error> {
        let req = self
            .request(Method::POST, &format!("comments/{}/vote", comment.0))
            .json(&json!({ "vote": VoteDirection::wire_value(vote) }));
        self.unit(req).await
    }

    async fn list_clips(&self, feed: &str, page: u32, limit: u32) -> Result<Page<Clip>, Error> {
        let req = self.request(Method::GET, "clips").query(&[
            ("sort", String::from(feed)),
            ("page", page.max(1).to_string()),
            ("limit", limit.to_string()),
        ]);
        Ok(clips_page(self.json(req).await?, page, limit))
    }

    async fn vote_clip(&self, clip: ClipId, vote: Option<VoteDirection>) -> Result<(), Error> {
        let req = self
            .request(Method::POST, &format!("clips/{}/vote", clip.0))
            .json(&json!({ "vote": VoteDirection::wire_value(vote) }));
        self.unit(req).await
    }

    async fn get_queue(&self, limit: u32) -> Result<Page<QueueItem>, Error> {
        let req = self
            .request(Method::GET, "queue")
            .query(&[("limit", limit)]);
        let queue: Envelope<QueueContents> = self.json(req).await?;
        let QueueContents { items, total } = queue.data;
        Ok(Page {
            has_more: (items.len() as u64) < total,
            items: items.into_iter().collect(),
            total,
            page: 1,
            limit,
        })
    }

    async fn queue_count(&self) -> Result<u64, Error> {
        let count: Envelope<QueueCount> = self.json(self.request(Method::GET, "queue/count")).await?;
        Ok(count.data.count)
    }

    async fn add_to_queue(&self, clip: ClipId, at_end: bool) -> Result<QueueItem, Error> {
        let req = self
            .request(Method::POST, "queue")
            .json(&json!({ "clip_id": clip.0, "at_end": at_end }));
        let item: Envelope<QueueItem> = self.json(req).await?;
        Ok(item.data)
    }

    async fn remove_from_queue(&self, item: QueueItemId) -> Result<(), Error> {
        self.unit(self.request(Method::DELETE, &format!("queue/{}", item.0)))
            .await
    }

    async fn reorder_queue(&self, item: QueueItemId, new_position: u32) -> Result<(), Error> {
        let req = self
            .request(Method::PATCH, "queue/reorder")
            .json(&json!({ "item_id": item.0, "new_position": new_position }));
        self.unit(req).await
    }

    async fn mark_played(&self, item: QueueItemId) -> Result<(), Error> {
        self.unit(self.request(Method::POST, &format!("queue/{}/played", item.0)))
            .await
    }

    async fn clear_queue(&self) -> Result<(), Error> {
        self.unit(self.request(Method::DELETE, "queue")).await
    }

    async fn list_discovery_lists(
        &self,
        featured_only: bool,
        page: u32,
        limit: u32,
    ) -> Result<Page<DiscoveryList>, Error> {
        let req = self.request(Method::GET, "discovery-lists").query(&[
            ("featured", featured_only.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset(page, limit).to_string()),
        ]);
        let lists: Vec<DiscoveryList> = self.json(req).await?;
        let has_more = lists.len() as u32 == limit;
        Ok(offset_page(lists, page, limit, has_more))
    }

    async fn get_discovery_list(&self, list: DiscoveryListId) -> Result<DiscoveryList, Error> {
        self.json(self.request(Method::GET, &format!("discovery-lists/{}", list.0)))
            .await
    }

    async fn follow_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.unit(self.request(Method::POST, &format!("discovery-lists/{}/follow", list.0)))
            .await
    }

    async fn unfollow_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.unit(self.request(Method::DELETE, &format!("discovery-lists/{}/follow", list.0)))
            .await
    }

    async fn bookmark_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.unit(self.request(Method::POST, &format!("discovery-lists/{}/bookmark", list.0)))
            .await
    }

    async fn unbookmark_list(&self, list: DiscoveryListId) -> Result<(), Error> {
        self.unit(self.request(Method::DELETE, &format!("discovery-lists/{}/bookmark", list.0)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_under_api_v1() {
        let remote = HttpRemote::new("https://clipper.example/", None);
        assert_eq!(remote.url("queue/count"), "https://clipper.example/api/v1/queue/count");
    }

    #[test]
    fn offsets_start_at_page_one() {
        assert_eq!(offset(0, 50), 0);
        assert_eq!(offset(1, 50), 0);
        assert_eq!(offset(3, 20), 40);
    }

    #[test]
    fn comment_lists_become_pages() {
        let list: CommentList = serde_json::from_str(
            r#"{
                "comments": [{
                    "id": "00000000-0000-0000-0000-000000000001",
                    "clip_id": "00000000-0000-0000-0000-000000000002",
                    "parent_id": null,
                    "author_id": "00000000-0000-0000-0000-000000000003",
                    "content": "first",
                    "vote_score": 4,
                    "user_vote": 1,
                    "child_count": 1,
                    "created_at": "2024-01-01T00:00:00Z",
                    "replies": [{
                        "id": "00000000-0000-0000-0000-000000000004",
                        "clip_id": "00000000-0000-0000-0000-000000000002",
                        "parent_id": "00000000-0000-0000-0000-000000000001",
                        "author_id": "00000000-0000-0000-0000-000000000003",
                        "content": "[deleted]",
                        "vote_score": 0,
                        "child_count": 0,
                        "is_deleted": true,
                        "created_at": "2024-01-01T00:01:00Z"
                    }]
                }],
                "next_cursor": 51,
                "has_more": true
            }"#,
        )
        .unwrap();
        let page = offset_page(list.comments, 2, 50, list.has_more);
        assert_eq!(page.total, 52);
        assert!(page.has_more);
        assert_eq!(page.items[0].user_vote, Some(VoteDirection::Up));
        assert!(page.items[0].replies[0].is_deleted);
    }

    #[test]
    fn clip_pages_follow_meta() {
        let envelope: Envelope<Vec<Clip>> = serde_json::from_str(
            r#"{
                "success": true,
                "data": [],
                "meta": {"page": 3, "limit": 25, "total": 51, "total_pages": 3, "has_next": false, "has_prev": true}
            }"#,
        )
        .unwrap();
        let page = clips_page(envelope, 3, 25);
        assert_eq!((page.page, page.total, page.has_more), (3, 51, false));
    }
}
