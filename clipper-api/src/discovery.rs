use uuid::Uuid;

use crate::Entity;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct DiscoveryListId(pub Uuid);

/// Curated list of clips, as seen by the current user
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DiscoveryList {
    pub id: DiscoveryListId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_featured: bool,

    #[serde(default)]
    pub clip_count: u64,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
}

impl Entity for DiscoveryList {
    type Id = DiscoveryListId;

    fn id(&self) -> DiscoveryListId {
        self.id
    }
}
