use std::{fmt, sync::Arc};

use crate::{
    api::Remote,
    cache::{Fetcher, QueryCache, QueryData, QueryKey},
    ClientConfig, Error,
};

/// Entry point of the data layer: a query cache, the backend it is filled from, and the
/// settings shared by all the resource operations
///
/// The resource operations (comments, clips, queue, discovery lists) are implemented on
/// `Client` in their own modules.
pub struct Client<R> {
    cache: QueryCache,
    remote: Arc<R>,
    config: Arc<ClientConfig>,
}

impl<R> Clone for Client<R> {
    fn clone(&self) -> Client<R> {
        Client {
            cache: self.cache.clone(),
            remote: self.remote.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> fmt::Debug for Client<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: Remote + 'static> Client<R> {
    pub fn new(cache: QueryCache, remote: Arc<R>, config: ClientConfig) -> Client<R> {
        Client {
            cache,
            remote,
            config: Arc::new(config),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches `key` through `fetcher`, then extracts the expected kind of data
    pub(crate) async fn fetch_as<T>(
        &self,
        key: QueryKey,
        fetcher: Fetcher,
        extract: fn(QueryData) -> Option<T>,
    ) -> Result<T, Error> {
        let data = self.cache.fetch(key.clone(), fetcher).await?;
        extract(data).ok_or_else(|| Error::KindMismatch(key.to_string()))
    }

    pub(crate) fn cached_as<T>(
        &self,
        key: &QueryKey,
        extract: fn(QueryData) -> Option<T>,
    ) -> Option<T> {
        self.cache.get(key).and_then(extract)
    }
}
