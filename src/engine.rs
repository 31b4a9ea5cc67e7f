//! Entry point for request handlers.
//!
//! Bundles a store, the snapshot cache and the configuration, and resolves an
//! actor's default scope. Handlers pass `(actor, period, optional scope)` and get
//! plain aggregates back.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Deserialize;

use crate::cache::SnapshotCache;
use crate::commission::{self, LineCommission, SalesPersonCommission, TeamCommission};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::period::{self, Period};
use crate::pnl::{self, PnlStatement};
use crate::rules::SalesRole;
use crate::statistics::{self, PeriodStatistics};
use crate::store::{PgStore, SalesStore, Scope};

/// Who is asking: role plus the ids their default scope derives from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub role: SalesRole,
    pub sales_person_id: i64,
    pub team_id: i64,
    pub business_line_id: i64,
}

impl Actor {
    /// Salespeople see themselves, team leads their team, ops directors their
    /// business line; everyone else the whole company
    pub fn default_scope(&self) -> Scope {
        match self.role {
            SalesRole::SalesRep | SalesRole::BusinessDevelopment => {
                Scope::Person(self.sales_person_id)
            }
            SalesRole::TeamLead => Scope::Team(self.team_id),
            SalesRole::OpsDirector => Scope::BusinessLine(self.business_line_id),
            SalesRole::Other => Scope::Company,
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn SalesStore>,
    cache: SnapshotCache,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<dyn SalesStore>, config: EngineConfig) -> Self {
        Self {
            cache: SnapshotCache::new(config.snapshot_ttl),
            store,
            config,
        }
    }

    /// Engine over PostgreSQL
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        let store = PgStore::connect(&config).await?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn today(&self) -> NaiveDate {
        period::today(self.config.timezone())
    }

    pub fn current_period(&self) -> Period {
        Period::of(self.today())
    }

    pub async fn person_commission(
        &self,
        sales_person_id: i64,
        period: Period,
    ) -> Result<SalesPersonCommission> {
        commission::person_commission(self.store.as_ref(), sales_person_id, period).await
    }

    pub async fn team_commission(&self, team_id: i64, period: Period) -> Result<TeamCommission> {
        commission::team_commission(self.store.as_ref(), team_id, period).await
    }

    pub async fn line_commission(
        &self,
        business_line_id: i64,
        period: Period,
    ) -> Result<LineCommission> {
        commission::business_line_commission(self.store.as_ref(), business_line_id, period).await
    }

    /// Statistics for `scope`, or for the actor's default scope
    pub async fn statistics(
        &self,
        actor: &Actor,
        period: Period,
        scope: Option<Scope>,
    ) -> Result<Arc<PeriodStatistics>> {
        let scope = scope.unwrap_or_else(|| actor.default_scope());
        let today = self.today();
        let store = self.store.as_ref();

        if scope == Scope::Company {
            return self
                .cache
                .company_statistics(
                    period,
                    Period::of(today),
                    statistics::company_statistics(store, period, today),
                )
                .await;
        }
        statistics::period_statistics(store, scope, period, today)
            .await
            .map(Arc::new)
    }

    pub async fn pnl(&self, period: Period) -> Result<Arc<PnlStatement>> {
        let store = self.store.as_ref();
        self.cache
            .pnl(
                period,
                self.current_period(),
                pnl::pnl_statement(store, period),
            )
            .await
    }

    /// Trailing P&L view ending at `period`, oldest first. `count` defaults to
    /// the configured window.
    pub async fn pnl_trailing(
        &self,
        period: Period,
        count: Option<usize>,
    ) -> Result<Vec<Arc<PnlStatement>>> {
        let count = count.unwrap_or(self.config.pnl_trailing_periods);
        try_join_all(period.trailing(count).into_iter().map(|p| self.pnl(p))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: SalesRole) -> Actor {
        Actor {
            role,
            sales_person_id: 7,
            team_id: 2,
            business_line_id: 1,
        }
    }

    #[test]
    fn test_default_scope_by_role() {
        assert_eq!(actor(SalesRole::SalesRep).default_scope(), Scope::Person(7));
        assert_eq!(actor(SalesRole::TeamLead).default_scope(), Scope::Team(2));
        assert_eq!(actor(SalesRole::OpsDirector).default_scope(), Scope::BusinessLine(1));
        assert_eq!(actor(SalesRole::Other).default_scope(), Scope::Company);
    }
}
