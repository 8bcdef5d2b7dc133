use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::CandidateProfile;
use crate::services::store::{CandidatePool, StoreError};

/// Short-lived cache in front of a candidate pool
///
/// Concurrent requests within the TTL share one pool snapshot.
pub struct CachedPool {
    inner: Arc<dyn CandidatePool>,
    snapshots: moka::future::Cache<(u32, usize), Arc<Vec<CandidateProfile>>>,
}

impl CachedPool {
    pub fn new(inner: Arc<dyn CandidatePool>, capacity: u64, ttl_secs: u64) -> Self {
        let snapshots = moka::future::CacheBuilder::new(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, snapshots }
    }

    /// Drop every cached snapshot
    pub fn invalidate_all(&self) {
        self.snapshots.invalidate_all();
    }
}

#[async_trait]
impl CandidatePool for CachedPool {
    async fn fetch_active(&self, window_hours: u32, limit: usize) -> Result<Vec<CandidateProfile>, StoreError> {
        let key = (window_hours, limit);

        if let Some(snapshot) = self.snapshots.get(&key).await {
            tracing::trace!("Pool snapshot cache hit ({}h, {})", window_hours, limit);
            return Ok(snapshot.as_ref().clone());
        }

        let fresh = self.inner.fetch_active(window_hours, limit).await?;
        self.snapshots.insert(key, Arc::new(fresh.clone())).await;

        tracing::trace!("Pool snapshot cached: {} candidates", fresh.len());
        Ok(fresh)
    }
}
