use std::future::Future;

use crate::{
    api,
    cache::{Entry, QueryCache, QueryData, QueryKey},
    Error,
};

/// Copy of every cache entry a mutation may touch, taken before it is applied
///
/// Consumed either by `QueryCache::rollback` when the remote call failed, or by
/// `QueryCache::commit` when it succeeded.
#[derive(Clone, Debug)]
#[must_use = "a snapshot must be either rolled back or committed"]
pub struct Snapshot {
    id: u64,
    prefixes: Vec<QueryKey>,
    entries: Vec<(QueryKey, Entry)>,
}

impl Snapshot {
    pub fn prefixes(&self) -> &[QueryKey] {
        &self.prefixes
    }

    pub fn entries(&self) -> &[(QueryKey, Entry)] {
        &self.entries
    }

    pub fn get(&self, key: &QueryKey) -> Option<&QueryData> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, e)| &e.data)
    }
}

impl QueryCache {
    /// Cancels the fetches in progress under `prefixes` and snapshots all their entries
    pub fn begin_optimistic_mutation(&self, prefixes: Vec<QueryKey>) -> Result<Snapshot, Error> {
        for p in prefixes.iter() {
            self.cancel_in_flight(p);
        }
        let (id, entries) = self.begin_mutation(&prefixes)?;
        tracing::debug!(?prefixes, entries = entries.len(), "beginning optimistic mutation");
        Ok(Snapshot {
            id,
            prefixes,
            entries,
        })
    }

    /// Replaces every snapshotted entry for which `patch` returns `Some`
    ///
    /// Each key is patched at most once, even when it is matched by several prefixes.
    pub fn apply_optimistic<F>(&self, snapshot: &Snapshot, mut patch: F) -> Result<usize, Error>
    where
        F: FnMut(&QueryKey, &QueryData) -> Option<QueryData>,
    {
        let mut changed = 0;
        for (key, entry) in snapshot.entries.iter() {
            if let Some(data) = patch(key, &entry.data) {
                self.replace_data(key, data)?;
                changed += 1;
            }
        }
        tracing::trace!(changed, "applied optimistic patch");
        Ok(changed)
    }

    /// Puts every snapshotted entry back, exactly as it was when the snapshot was taken
    ///
    /// If another mutation on an overlapping prefix was pending meanwhile, the snapshot may
    /// hold that mutation's patch or miss it, so the prefixes are then also refetched.
    pub async fn rollback(&self, snapshot: Snapshot) -> Result<(), Error> {
        let contended = self.end_mutation(snapshot.id);
        let restored = snapshot.entries.len();
        if let Err(err) = self.restore(snapshot.entries) {
            tracing::error!(prefixes = ?snapshot.prefixes, ?err, "failed rolling back optimistic mutation");
            return Err(err);
        }
        tracing::warn!(prefixes = ?snapshot.prefixes, restored, contended, "rolled back optimistic mutation");
        if contended {
            for p in snapshot.prefixes.iter() {
                self.invalidate(p);
            }
            for p in snapshot.prefixes.iter() {
                self.refetch_stale(p).await;
            }
        }
        Ok(())
    }

    /// Marks everything under the snapshot's prefixes as stale, and refetches it
    ///
    /// Returns the number of entries successfully refetched.
    pub async fn commit(&self, snapshot: Snapshot) -> usize {
        self.end_mutation(snapshot.id);
        for p in snapshot.prefixes.iter() {
            self.invalidate(p);
        }
        let mut refreshed = 0;
        for p in snapshot.prefixes.iter() {
            refreshed += self.refetch_stale(p).await;
        }
        tracing::debug!(prefixes = ?snapshot.prefixes, refreshed, "committed optimistic mutation");
        refreshed
    }
}

/// Runs `request` with `patch` optimistically applied to every entry under `prefixes`
///
/// The snapshot and the patch are both taken synchronously, before `request` is even
/// called. On success the affected queries are refetched, on failure they are rolled back
/// and the remote error is returned.
pub async fn run_optimistic<T, P, F, Fut>(
    cache: &QueryCache,
    prefixes: Vec<QueryKey>,
    patch: P,
    request: F,
) -> Result<T, Error>
where
    P: FnMut(&QueryKey, &QueryData) -> Option<QueryData>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, api::Error>>,
{
    let snapshot = cache.begin_optimistic_mutation(prefixes)?;
    cache.apply_optimistic(&snapshot, patch)?;
    match request().await {
        Ok(res) => {
            cache.commit(snapshot).await;
            Ok(res)
        }
        Err(err) => match cache.rollback(snapshot).await {
            Ok(()) => Err(Error::Remote(err)),
            Err(_) => Err(Error::RollbackFailed(err)),
        },
    }
}
