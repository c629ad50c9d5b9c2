//! Authenticator metadata, used to anchor attestation certificate chains.
//!
//! A [`MetadataService`] keeps the entries of the latest metadata BLOB in memory, keyed by
//! AAGUID. Lookups never wait for the network: they answer from the cache, stale or not, and
//! start a background refresh when the cache is empty or older than its TTL.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use dashmap::DashMap;
use passkey_rp_types::authenticator::Aaguid;
use serde::Serialize;
use tokio::{sync::watch, time::Instant};

use crate::config::MetadataConfig;

mod blob;
mod source;


pub use blob::{
    AuthenticatorStatus, MetadataBlobPayload, MetadataBlobPayloadEntry, MetadataStatement,
    StatusReport,
};
#[cfg(any(test, feature = "testable"))]
pub use source::MockMetadataSource;
pub use source::{MetadataSource, StaticMetadataSource};

#[cfg(feature = "http-metadata")]
pub use source::HttpMetadataSource;

/// Failed attempts are not retried more often than this.
const RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Errors raised while obtaining metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// The BLOB could not be downloaded.
    #[error("metadata fetch failed: {0}")]
    Fetch(String),
    /// The fetch did not complete in time.
    #[error("metadata fetch timed out")]
    Timeout,
    /// The BLOB is not a valid metadata payload.
    #[error("invalid metadata BLOB: {0}")]
    InvalidBlob(String),
    /// The BLOB signature or its certificate chain did not verify.
    #[error("untrusted metadata BLOB: {0}")]
    Untrusted(String),
}

/// The answer of a metadata lookup.
#[derive(Debug, Clone)]
pub enum MetadataLookup {
    /// The cached entry for the AAGUID.
    Found(Arc<MetadataBlobPayloadEntry>),
    /// Nothing is known about the AAGUID, or no BLOB was fetched yet.
    Unavailable,
}

/// How metadata took part in accepting an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStatus {
    /// The attestation has no certificate chain to anchor.
    NotApplicable,
    /// The chain leads to a root listed in the authenticator's metadata.
    Trusted,
    /// No metadata was available, the chain was not anchored.
    Unavailable,
}

/// Anything that can answer metadata lookups without blocking.
pub trait MetadataProvider: Send + Sync {
    /// The metadata entry for an authenticator model.
    fn lookup(&self, aaguid: &Aaguid) -> MetadataLookup;
}

struct Inner<S> {
    source: S,
    ttl: Duration,
    fetch_timeout: Duration,
    entries: DashMap<Aaguid, Arc<MetadataBlobPayloadEntry>>,
    fetched_at: Mutex<Option<Instant>>,
    last_attempt: Mutex<Option<Instant>>,
    refreshing: AtomicBool,
}

/// A read-through cache of metadata entries in front of a [`MetadataSource`].
pub struct MetadataService<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for MetadataService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: MetadataSource + 'static> MetadataService<S> {
    /// Create an empty cache. Nothing is fetched until the first lookup or refresh.
    pub fn new(source: S, config: &MetadataConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                ttl: config.ttl,
                fetch_timeout: config.fetch_timeout,
                entries: DashMap::new(),
                fetched_at: Mutex::new(None),
                last_attempt: Mutex::new(None),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether no entry is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Whether the cache was never filled or is older than its TTL.
    pub fn is_stale(&self) -> bool {
        self.inner.is_stale()
    }

    /// Fetch the BLOB now and replace the cached entries, waiting at most the configured fetch
    /// timeout. Returns the number of entries with an AAGUID.
    pub async fn refresh(&self) -> Result<usize, MetadataError> {
        self.inner.refresh().await
    }

    /// Refresh every TTL until `shutdown` changes or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if let Err(e) = self.refresh().await {
                log::warn!("metadata refresh failed: {e}");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.inner.ttl) => {}
                _ = shutdown.changed() => break,
            }
        }
        log::debug!("metadata refresh loop stopped");
    }

    fn spawn_refresh(&self) {
        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.inner.refreshing.store(false, Ordering::Release);
            log::warn!("metadata is stale but no tokio runtime is available to refresh it");
            return;
        };
        let guard = RefreshGuard(self.inner.clone());
        runtime.spawn(async move {
            if let Err(e) = guard.0.refresh().await {
                log::warn!("background metadata refresh failed: {e}");
            }
        });
    }
}

/// Owned by the spawned refresh task. Clears the in-flight flag when the task ends, including
/// when it panics.
struct RefreshGuard<S>(Arc<Inner<S>>);

impl<S> Drop for RefreshGuard<S> {
    fn drop(&mut self) {
        self.0.refreshing.store(false, Ordering::Release);
    }
}

impl<S: MetadataSource + 'static> MetadataProvider for MetadataService<S> {
    fn lookup(&self, aaguid: &Aaguid) -> MetadataLookup {
        if self.inner.is_stale() && self.inner.may_retry() {
            self.spawn_refresh();
        }
        match self.inner.entries.get(aaguid) {
            Some(entry) => MetadataLookup::Found(entry.value().clone()),
            None => MetadataLookup::Unavailable,
        }
    }
}

impl<S: MetadataSource> Inner<S> {
    fn is_stale(&self) -> bool {
        match self.fetched_at.lock().ok().and_then(|at| *at) {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        }
    }

    fn may_retry(&self) -> bool {
        match self.last_attempt.lock().ok().and_then(|at| *at) {
            Some(at) => at.elapsed() >= RETRY_INTERVAL.min(self.ttl),
            None => true,
        }
    }

    async fn refresh(&self) -> Result<usize, MetadataError> {
        if let Ok(mut last_attempt) = self.last_attempt.lock() {
            *last_attempt = Some(Instant::now());
        }
        let payload = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| MetadataError::Timeout)??;

        let fresh: HashMap<_, _> = payload
            .entries
            .into_iter()
            .filter_map(|entry| entry.aaguid.map(|aaguid| (aaguid, Arc::new(entry))))
            .collect();
        let count = fresh.len();
        self.entries.retain(|aaguid, _| fresh.contains_key(aaguid));
        for (aaguid, entry) in fresh {
            self.entries.insert(aaguid, entry);
        }
        if let Ok(mut fetched_at) = self.fetched_at.lock() {
            *fetched_at = Some(Instant::now());
        }

        log::debug!("loaded metadata BLOB #{} with {count} entries", payload.no);
        Ok(count)
    }
}
