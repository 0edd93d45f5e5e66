use uuid::Uuid;

use crate::{vote::wire_vote, Entity, Time, VoteDirection};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct ClipId(pub Uuid);

impl ClipId {
    pub fn stub() -> ClipId {
        ClipId(crate::STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Clip {
    pub id: ClipId,
    pub title: String,
    pub vote_score: i64,
    #[serde(with = "wire_vote", default)]
    pub user_vote: Option<VoteDirection>,
    #[serde(default)]
    pub comment_count: u64,
    pub created_at: Time,
}

impl Entity for Clip {
    type Id = ClipId;

    fn id(&self) -> ClipId {
        self.id
    }
}
