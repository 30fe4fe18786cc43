use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::types::EngineConfig;
use crate::domain::peak_season::{PeakSeason, PeakSeasonDraft};
use crate::engine::change_applier::{AppliedChange, PeakSeasonChangeApplier};
use crate::engine::invalidation::CacheInvalidator;
use crate::engine::overlap_resolver::PeakSeasonOverlapResolver;
use crate::error::{PricingError, Result};
use crate::ports::pricing_repository::PricingRepository;

/// Result of a peak season mutation.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonChangeOutcome {
    pub season: PeakSeason,
    /// Seasons that now stack with `season`. Informational only.
    pub overlapping: Vec<PeakSeason>,
    pub applied: AppliedChange,
}

/// Tenant-facing peak season workflows.
///
/// Every mutation persists the season, re-materializes the affected rows,
/// then drops cached reads. If re-materialization fails the season change is
/// rolled back so stored rows and seasons never disagree.
#[derive(Clone)]
pub struct PeakSeasonService {
    repository: Arc<dyn PricingRepository>,
    resolver: PeakSeasonOverlapResolver,
    applier: PeakSeasonChangeApplier,
    invalidator: CacheInvalidator,
    config: EngineConfig,
}

impl PeakSeasonService {
    pub fn new(
        repository: Arc<dyn PricingRepository>,
        invalidator: CacheInvalidator,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver: PeakSeasonOverlapResolver::new(Arc::clone(&repository)),
            applier: PeakSeasonChangeApplier::new(Arc::clone(&repository)),
            repository,
            invalidator,
            config,
        }
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<PeakSeason>> {
        self.repository.find_peak_seasons_by_tenant(tenant_id).await
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        draft: PeakSeasonDraft,
    ) -> Result<SeasonChangeOutcome> {
        let draft = draft.validate(&self.config)?;
        self.ensure_properties_owned(tenant_id, &draft).await?;
        let season = draft.into_season(self.repository.next_peak_season_id(), tenant_id);
        let overlapping = self.find_overlaps(&season).await?;

        self.repository.save_peak_season(&season).await?;
        let applied = match self.applier.apply_changes(&season, None, false).await {
            Ok(applied) => applied,
            Err(e) => {
                let undo = self.repository.delete_peak_season(tenant_id, &season.id).await;
                log_rollback(&season.id, "create", undo);
                return Err(e);
            }
        };

        self.invalidator.invalidate_properties(&applied.affected_property_ids);
        info!(tenant_id, season_id = %season.id, rows = applied.rows_upserted, "peak season created");
        Ok(SeasonChangeOutcome {
            season,
            overlapping,
            applied,
        })
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        season_id: &str,
        draft: PeakSeasonDraft,
    ) -> Result<SeasonChangeOutcome> {
        let old = self.get_owned(tenant_id, season_id).await?;
        let draft = draft.validate(&self.config)?;
        self.ensure_properties_owned(tenant_id, &draft).await?;
        let season = draft.into_season(season_id, tenant_id);
        let overlapping = self.find_overlaps(&season).await?;

        self.repository.save_peak_season(&season).await?;
        let applied = match self.applier.apply_changes(&season, Some(&old), false).await {
            Ok(applied) => applied,
            Err(e) => {
                log_rollback(season_id, "update", self.repository.save_peak_season(&old).await);
                return Err(e);
            }
        };

        self.invalidator.invalidate_properties(&applied.affected_property_ids);
        info!(tenant_id, season_id, rows = applied.rows_upserted, "peak season updated");
        Ok(SeasonChangeOutcome {
            season,
            overlapping,
            applied,
        })
    }

    pub async fn delete(&self, tenant_id: &str, season_id: &str) -> Result<AppliedChange> {
        let season = self.get_owned(tenant_id, season_id).await?;

        self.repository.delete_peak_season(tenant_id, season_id).await?;
        let applied = match self.applier.apply_changes(&season, Some(&season), true).await {
            Ok(applied) => applied,
            Err(e) => {
                log_rollback(season_id, "delete", self.repository.save_peak_season(&season).await);
                return Err(e);
            }
        };

        self.invalidator.invalidate_properties(&applied.affected_property_ids);
        info!(tenant_id, season_id, rows = applied.rows_upserted, "peak season deleted");
        Ok(applied)
    }

    async fn get_owned(&self, tenant_id: &str, season_id: &str) -> Result<PeakSeason> {
        self.repository
            .find_peak_season(tenant_id, season_id)
            .await?
            .ok_or_else(|| PricingError::not_found("Peak season", season_id))
    }

    async fn ensure_properties_owned(&self, tenant_id: &str, draft: &PeakSeasonDraft) -> Result<()> {
        if draft.apply_to_all_properties {
            return Ok(());
        }
        let owned: BTreeSet<String> = self
            .repository
            .find_properties_by_tenant(tenant_id)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        match draft.property_ids.iter().find(|id| !owned.contains(*id)) {
            Some(missing) => Err(PricingError::not_found("Property", missing.clone())),
            None => Ok(()),
        }
    }

    async fn find_overlaps(&self, season: &PeakSeason) -> Result<Vec<PeakSeason>> {
        let overlapping = self
            .resolver
            .has_overlapped(
                &season.tenant_id,
                season.start_date,
                season.end_date,
                &season.property_ids,
                season.apply_to_all_properties,
                Some(&season.id),
            )
            .await?;
        if !overlapping.is_empty() {
            let names: Vec<&str> = overlapping.iter().map(|s| s.name.as_str()).collect();
            info!(
                tenant_id = %season.tenant_id,
                season_id = %season.id,
                overlaps = %names.join(", "),
                "peak season stacks with existing seasons"
            );
        }
        Ok(overlapping)
    }
}

fn log_rollback(season_id: &str, action: &str, undo: Result<()>) {
    if let Err(e) = undo {
        error!(season_id, action, error = %e, "rollback after failed apply did not complete");
    }
}

impl std::fmt::Debug for PeakSeasonService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeakSeasonService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
