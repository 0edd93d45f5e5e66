use crate::api;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The remote call failed; any optimistic change was rolled back
    #[error(transparent)]
    Remote(#[from] api::Error),

    #[error("Query fetch was cancelled")]
    Cancelled,

    #[error("Query cache was torn down")]
    CacheClosed,

    #[error("Query {0} holds data of another kind")]
    KindMismatch(String),

    /// The remote call failed, and the cache could not be returned to its previous state
    #[error("Mutation failed ({0}) and the optimistic change could not be rolled back")]
    RollbackFailed(api::Error),
}
