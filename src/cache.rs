//! In-memory snapshot cache using moka
//!
//! Computed statements of closed periods, keyed by (kind, period). Closed
//! periods only change when back-office data is corrected, so they live for the
//! configured TTL; the current period is never cached. Concurrent requests for
//! the same missing key share one computation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::period::Period;
use crate::pnl::PnlStatement;
use crate::statistics::PeriodStatistics;

/// Which computed statement a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotKind {
    Pnl,
    CompanyStatistics,
}

/// Snapshot cache holding computed statements
#[derive(Clone)]
pub struct SnapshotCache {
    /// P&L statements (period -> statement)
    pnl: Cache<Period, Arc<PnlStatement>>,
    /// Whole-company statistics (period -> statistics)
    company_statistics: Cache<Period, Arc<PeriodStatistics>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            // 24 months of statements is more than any trend view asks for
            pnl: Cache::builder().max_capacity(24).time_to_live(ttl).build(),
            company_statistics: Cache::builder().max_capacity(24).time_to_live(ttl).build(),
        }
    }

    /// Cached P&L statement of `period`, computed by `init` on a miss
    pub async fn pnl<F>(&self, period: Period, current: Period, init: F) -> Result<Arc<PnlStatement>>
    where
        F: Future<Output = Result<PnlStatement>>,
    {
        get_or_compute(&self.pnl, SnapshotKind::Pnl, period, current, init).await
    }

    pub async fn company_statistics<F>(
        &self,
        period: Period,
        current: Period,
        init: F,
    ) -> Result<Arc<PeriodStatistics>>
    where
        F: Future<Output = Result<PeriodStatistics>>,
    {
        get_or_compute(
            &self.company_statistics,
            SnapshotKind::CompanyStatistics,
            period,
            current,
            init,
        )
        .await
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pnl_size: self.pnl.entry_count(),
            company_statistics_size: self.company_statistics.entry_count(),
        }
    }

    /// Drop one snapshot, e.g. after a correction to a closed period
    pub async fn invalidate(&self, kind: SnapshotKind, period: Period) {
        match kind {
            SnapshotKind::Pnl => self.pnl.invalidate(&period).await,
            SnapshotKind::CompanyStatistics => self.company_statistics.invalidate(&period).await,
        }
        info!(?kind, %period, "Snapshot invalidated");
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.pnl.invalidate_all();
        self.company_statistics.invalidate_all();
        info!("All snapshots invalidated");
    }
}

async fn get_or_compute<V, F>(
    cache: &Cache<Period, Arc<V>>,
    kind: SnapshotKind,
    period: Period,
    current: Period,
    init: F,
) -> Result<Arc<V>>
where
    V: Send + Sync + 'static,
    F: Future<Output = Result<V>>,
{
    if period >= current {
        debug!(?kind, %period, "Open period, computing without cache");
        return init.await.map(Arc::new);
    }

    if let Some(hit) = cache.get(&period).await {
        debug!(?kind, %period, "Snapshot cache hit");
        return Ok(hit);
    }

    debug!(?kind, %period, "Snapshot cache miss");
    cache
        .try_get_with(period, async move { init.await.map(Arc::new) })
        .await
        .map_err(EngineError::from_shared)
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub pnl_size: u64,
    pub company_statistics_size: u64,
}
