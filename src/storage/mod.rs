use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::document::{EntryExtractor, ServerEntry};
use crate::error::{RegistryError, Result};
use crate::github::DocumentSource;

/// How long a snapshot may be served before it is fetched again
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// An immutable, timestamped set of entries taken from one fetch
#[derive(Debug)]
pub struct Snapshot {
    entries: Vec<ServerEntry>,
    captured_at: Instant,
    source: String,
}

impl Snapshot {
    pub fn new(entries: Vec<ServerEntry>, source: String) -> Self {
        Self {
            entries,
            captured_at: Instant::now(),
            source,
        }
    }

    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label of the document the entries were extracted from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

/// Holds the latest snapshot and re-fetches it once it goes stale
pub struct SnapshotCache {
    source: Arc<dyn DocumentSource>,
    extractor: EntryExtractor,
    ttl: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        let extractor = EntryExtractor::new(source.location().clone());
        Self {
            source,
            extractor,
            ttl: DEFAULT_TTL,
            current: RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_extractor(mut self, extractor: EntryExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        snapshot.age() < self.ttl
    }

    /// Return the held snapshot if it is still fresh, otherwise fetch a new one.
    ///
    /// A failed fetch leaves the previous snapshot untouched.
    pub async fn get(&self) -> Result<Arc<Snapshot>> {
        {
            let current = self.current.read().await;
            if let Some(snapshot) = current.as_ref().filter(|s| self.is_fresh(s)) {
                tracing::debug!("Serving cached snapshot ({} entries)", snapshot.len());
                return Ok(snapshot.clone());
            }
        }

        let mut current = self.current.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(snapshot) = current.as_ref().filter(|s| self.is_fresh(s)) {
            return Ok(snapshot.clone());
        }

        let snapshot = Arc::new(self.load().await?);
        *current = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// The held snapshot, fresh or not, without touching the network
    pub async fn peek(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    pub async fn invalidate(&self) {
        tracing::info!("Invalidating cached snapshot");
        *self.current.write().await = None;
    }

    /// Drop whatever is held and fetch again regardless of age
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        self.invalidate().await;
        self.get().await
    }

    async fn load(&self) -> Result<Snapshot> {
        let label = self.source.location().label();
        let text = self.source.fetch().await.inspect_err(|e| {
            tracing::warn!("Failed to fetch {}: {}", label, e);
        })?;

        let entries = self.extractor.extract(&text);
        if entries.is_empty() {
            tracing::warn!("No servers found in {}", label);
            return Err(RegistryError::EmptyResult);
        }

        tracing::info!("Loaded {} servers from {}", entries.len(), label);
        Ok(Snapshot::new(entries, label))
    }
}
