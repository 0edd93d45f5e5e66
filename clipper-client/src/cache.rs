use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use chrono::Utc;
use futures::future::{AbortHandle, Abortable, Aborted, BoxFuture};
use parking_lot::Mutex;

use crate::{
    api::{self, Clip, Comment, DiscoveryList, Page, QueueItem, Time, Uuid},
    Error,
};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Str(String),
    Id(Uuid),
    Num(i64),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> KeyPart {
        KeyPart::Str(String::from(s))
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> KeyPart {
        KeyPart::Str(s)
    }
}

impl From<Uuid> for KeyPart {
    fn from(u: Uuid) -> KeyPart {
        KeyPart::Id(u)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> KeyPart {
        KeyPart::Num(n)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> KeyPart {
        KeyPart::Num(i64::from(n))
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => f.write_str(s),
            KeyPart::Id(u) => write!(f, "{u}"),
            KeyPart::Num(n) => write!(f, "{n}"),
        }
    }
}

/// Structured cache key, eg. `[comments, <clip id>, best, 1]`
///
/// Keys are ordered lexicographically by part, so all the keys sharing a prefix are
/// contiguous in the cache.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn root(resource: &str) -> QueryKey {
        QueryKey(vec![KeyPart::from(resource)])
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> QueryKey {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, p) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str("]")
    }
}

/// Result of a query, as held by the cache
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum QueryData {
    Comments(Page<Comment>),
    Clips(Page<Clip>),
    Queue(Page<QueueItem>),
    Count(u64),
    DiscoveryLists(Page<DiscoveryList>),
    DiscoveryList(DiscoveryList),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub data: QueryData,

    /// Set by invalidation, cleared by the next successful fetch
    pub stale: bool,
    pub updated_at: Time,
}

pub type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<QueryData, api::Error>> + Send + Sync>;

struct InFlight {
    id: u64,
    handle: AbortHandle,
}

/// Optimistic mutation between its snapshot and its rollback or commit
struct Mutation {
    prefixes: Vec<QueryKey>,

    /// Set when another mutation on an overlapping prefix was pending at the same time
    contended: bool,
}

fn overlaps(a: &[QueryKey], b: &[QueryKey]) -> bool {
    a.iter()
        .any(|a| b.iter().any(|b| a.starts_with(b) || b.starts_with(a)))
}

#[derive(Default)]
struct State {
    entries: BTreeMap<QueryKey, Entry>,
    fetchers: HashMap<QueryKey, Fetcher>,
    in_flight: HashMap<QueryKey, InFlight>,
    next_fetch_id: u64,
    mutations: HashMap<u64, Mutation>,
    next_mutation_id: u64,
    closed: bool,
}

impl State {
    fn matching<'a>(
        &'a self,
        prefix: &'a QueryKey,
    ) -> impl Iterator<Item = (&'a QueryKey, &'a Entry)> + 'a {
        self.entries
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    fn matching_keys(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        self.matching(prefix).map(|(k, _)| k.clone()).collect()
    }
}

/// Process-wide store of query results
///
/// Cloning a `QueryCache` gives another handle to the same store. The lock is never held
/// across an await point, so interleaved async operations always see a consistent store.
#[derive(Clone, Default)]
pub struct QueryCache(Arc<Mutex<State>>);

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.lock();
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl QueryCache {
    pub fn new() -> QueryCache {
        QueryCache::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryData> {
        self.0.lock().entries.get(key).map(|e| e.data.clone())
    }

    pub fn entry(&self, key: &QueryKey) -> Option<Entry> {
        self.0.lock().entries.get(key).cloned()
    }

    pub fn set(&self, key: QueryKey, data: QueryData) -> Result<(), Error> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(Error::CacheClosed);
        }
        tracing::trace!(%key, "setting query data");
        state.entries.insert(
            key,
            Entry {
                data,
                stale: false,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn get_all_matching(&self, prefix: &QueryKey) -> Vec<(QueryKey, QueryData)> {
        self.0
            .lock()
            .matching(prefix)
            .map(|(k, e)| (k.clone(), e.data.clone()))
            .collect()
    }

    /// Replaces the data of every entry under `prefix` for which `f` returns `Some`
    ///
    /// Returns the number of entries changed.
    pub fn update_matching<F>(&self, prefix: &QueryKey, mut f: F) -> usize
    where
        F: FnMut(&QueryKey, &QueryData) -> Option<QueryData>,
    {
        let mut state = self.0.lock();
        let mut changed = 0;
        for (key, entry) in state
            .entries
            .range_mut(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            if let Some(data) = f(key, &entry.data) {
                entry.data = data;
                entry.updated_at = Utc::now();
                changed += 1;
            }
        }
        changed
    }

    /// Aborts every fetch in progress for a key under `prefix`
    ///
    /// Their results are discarded, and the corresponding `fetch` calls fail with
    /// `Error::Cancelled`.
    pub fn cancel_in_flight(&self, prefix: &QueryKey) -> usize {
        let mut state = self.0.lock();
        let keys = state
            .in_flight
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect::<Vec<_>>();
        for k in keys.iter() {
            if let Some(f) = state.in_flight.remove(k) {
                f.handle.abort();
            }
        }
        if !keys.is_empty() {
            tracing::debug!(%prefix, cancelled = keys.len(), "cancelled in-flight fetches");
        }
        keys.len()
    }

    /// Marks every entry under `prefix` as stale, returning their keys
    pub fn invalidate(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        let mut state = self.0.lock();
        let keys = state.matching_keys(prefix);
        for k in keys.iter() {
            if let Some(e) = state.entries.get_mut(k) {
                e.stale = true;
            }
        }
        tracing::trace!(%prefix, invalidated = keys.len(), "invalidated queries");
        keys
    }

    /// Drops every entry under `prefix`, along with its fetcher
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut state = self.0.lock();
        let keys = state.matching_keys(prefix);
        for k in keys.iter() {
            state.entries.remove(k);
            state.fetchers.remove(k);
        }
        keys.len()
    }

    /// Empties the cache and refuses any further write
    pub fn teardown(&self) {
        let mut state = self.0.lock();
        for (_, f) in state.in_flight.drain() {
            f.handle.abort();
        }
        state.entries.clear();
        state.fetchers.clear();
        state.closed = true;
        tracing::debug!("query cache torn down");
    }

    /// Runs `fetcher` and stores its result under `key`
    ///
    /// The fetcher is remembered, so that the entry can be refetched after invalidation. A
    /// newer fetch of the same key aborts the previous one.
    pub async fn fetch(&self, key: QueryKey, fetcher: Fetcher) -> Result<QueryData, Error> {
        let (id, registration) = {
            let mut state = self.0.lock();
            if state.closed {
                return Err(Error::CacheClosed);
            }
            state.fetchers.insert(key.clone(), fetcher.clone());
            let (handle, registration) = AbortHandle::new_pair();
            state.next_fetch_id += 1;
            let id = state.next_fetch_id;
            if let Some(previous) = state.in_flight.insert(key.clone(), InFlight { id, handle }) {
                previous.handle.abort();
            }
            (id, registration)
        };
        tracing::trace!(%key, "fetching query");

        let res = Abortable::new(fetcher(), registration).await;

        let mut state = self.0.lock();
        let is_current = matches!(state.in_flight.get(&key), Some(f) if f.id == id);
        if is_current {
            state.in_flight.remove(&key);
        }
        match res {
            Err(Aborted) => {
                tracing::debug!(%key, "query fetch was cancelled");
                Err(Error::Cancelled)
            }
            Ok(Err(err)) => Err(Error::Remote(err)),
            Ok(Ok(_)) if state.closed => Err(Error::CacheClosed),
            Ok(Ok(_)) if !is_current => Err(Error::Cancelled),
            Ok(Ok(data)) => {
                state.entries.insert(
                    key,
                    Entry {
                        data: data.clone(),
                        stale: false,
                        updated_at: Utc::now(),
                    },
                );
                Ok(data)
            }
        }
    }

    /// Refetches every stale entry under `prefix` that has a known fetcher
    ///
    /// Failures are logged and leave the entry stale. Returns the number of entries
    /// successfully refreshed.
    pub async fn refetch_stale(&self, prefix: &QueryKey) -> usize {
        let pending = {
            let state = self.0.lock();
            state
                .matching(prefix)
                .filter(|(_, e)| e.stale)
                .filter_map(|(k, _)| state.fetchers.get(k).map(|f| (k.clone(), f.clone())))
                .collect::<Vec<_>>()
        };
        let results = futures::future::join_all(pending.into_iter().map(|(key, fetcher)| async move {
            let res = self.fetch(key.clone(), fetcher).await;
            (key, res)
        }))
        .await;
        let mut refreshed = 0;
        for (key, res) in results {
            match res {
                Ok(_) => refreshed += 1,
                Err(err) => tracing::warn!(%key, ?err, "failed refetching stale query"),
            }
        }
        refreshed
    }

    /// Registers a pending mutation on `prefixes` and copies every entry under them, each
    /// key at most once
    ///
    /// Pending mutations on overlapping prefixes are all marked as contended.
    pub(crate) fn begin_mutation(
        &self,
        prefixes: &[QueryKey],
    ) -> Result<(u64, Vec<(QueryKey, Entry)>), Error> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(Error::CacheClosed);
        }
        let mut res = BTreeMap::new();
        for p in prefixes {
            for (k, e) in state.matching(p) {
                res.insert(k.clone(), e.clone());
            }
        }
        let mut contended = false;
        for m in state.mutations.values_mut() {
            if overlaps(&m.prefixes, prefixes) {
                m.contended = true;
                contended = true;
            }
        }
        state.next_mutation_id += 1;
        let id = state.next_mutation_id;
        state.mutations.insert(
            id,
            Mutation {
                prefixes: prefixes.to_vec(),
                contended,
            },
        );
        Ok((id, res.into_iter().collect()))
    }

    /// Forgets a pending mutation, returning whether it was contended
    pub(crate) fn end_mutation(&self, id: u64) -> bool {
        self.0
            .lock()
            .mutations
            .remove(&id)
            .map(|m| m.contended)
            .unwrap_or(false)
    }

    /// Overwrites entries verbatim, recreating them if they were removed meanwhile
    pub(crate) fn restore(&self, entries: Vec<(QueryKey, Entry)>) -> Result<(), Error> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(Error::CacheClosed);
        }
        for (k, e) in entries {
            state.entries.insert(k, e);
        }
        Ok(())
    }

    /// Replaces the data of `key`, keeping it in its current staleness state
    pub(crate) fn replace_data(&self, key: &QueryKey, data: QueryData) -> Result<(), Error> {
        let mut state = self.0.lock();
        if state.closed {
            return Err(Error::CacheClosed);
        }
        match state.entries.get_mut(key) {
            Some(e) => {
                e.data = data;
                e.updated_at = Utc::now();
            }
            None => {
                state.entries.insert(
                    key.clone(),
                    Entry {
                        data,
                        stale: false,
                        updated_at: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }
}
