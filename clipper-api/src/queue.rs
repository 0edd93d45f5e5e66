use uuid::Uuid;

use crate::{ClipId, Entity, Time};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct QueueItemId(pub Uuid);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub clip_id: ClipId,

    /// 1-based play order, unique within the queue
    pub position: u32,
    pub added_at: Time,
    #[serde(default)]
    pub played_at: Option<Time>,
}

impl Entity for QueueItem {
    type Id = QueueItemId;

    fn id(&self) -> QueueItemId {
        self.id
    }
}
