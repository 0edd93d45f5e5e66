use uuid::Uuid;

use crate::{vote::wire_vote, ClipId, Entity, Time, UserId, VoteDirection};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub Uuid);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub clip_id: ClipId,
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,

    pub content: String,
    pub vote_score: i64,

    /// Vote of the current user, if any
    #[serde(with = "wire_vote", default)]
    pub user_vote: Option<VoteDirection>,

    /// Number of direct replies, maintained by the server
    pub child_count: u32,

    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub edited_at: Option<Time>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_removed: bool,
    pub created_at: Time,

    /// Child comments, in display order
    #[serde(default)]
    pub replies: im::Vector<Comment>,
}

impl Comment {
    /// Returns the indices leading from `comments` to the comment with id `id`, if any
    ///
    /// The search is pre-order, so the first match wins.
    pub fn path_to(comments: &im::Vector<Comment>, id: CommentId) -> Option<Vec<usize>> {
        for (i, c) in comments.iter().enumerate() {
            if c.id == id {
                return Some(vec![i]);
            }
            if let Some(mut path) = Comment::path_to(&c.replies, id) {
                path.insert(0, i);
                return Some(path);
            }
        }
        None
    }

    pub fn find_in(comments: &im::Vector<Comment>, id: CommentId) -> Option<&Comment> {
        for c in comments.iter() {
            if c.id == id {
                return Some(c);
            }
            if let Some(res) = Comment::find_in(&c.replies, id) {
                return Some(res);
            }
        }
        None
    }
}

impl Entity for Comment {
    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }
}

#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Best,
    New,
    Old,
    Controversial,
}

impl CommentSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Best => "best",
            CommentSort::New => "new",
            CommentSort::Old => "old",
            CommentSort::Controversial => "controversial",
        }
    }
}

impl std::str::FromStr for CommentSort {
    type Err = String;

    fn from_str(s: &str) -> Result<CommentSort, String> {
        match s {
            "best" => Ok(CommentSort::Best),
            "new" => Ok(CommentSort::New),
            "old" => Ok(CommentSort::Old),
            "controversial" => Ok(CommentSort::Controversial),
            s => Err(format!("unknown comment sort {s:?}")),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,

    #[serde(rename = "parent_comment_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
}
