use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Placeholder shown instead of the content of a comment deleted by its author
pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// Placeholder shown instead of the content of a comment removed by a moderator
pub const REMOVED_PLACEHOLDER: &str = "[removed]";

/// Maximum number of unplayed items in a playback queue, enforced server-side
pub const MAX_QUEUE_SIZE: u64 = 500;

mod clip;
pub use clip::{Clip, ClipId};

mod comment;
pub use comment::{Comment, CommentId, CommentSort, NewComment};

mod discovery;
pub use discovery::{DiscoveryList, DiscoveryListId};

mod error;
pub use error::Error;

mod page;
pub use page::{Entity, Page};

mod queue;
pub use queue::{QueueItem, QueueItemId};

mod remote;
pub use remote::Remote;

mod user;
pub use user::UserId;

mod vote;
pub use vote::VoteDirection;
