use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::dates::DateWindow;
use crate::domain::peak_season::PeakSeason;
use crate::error::Result;
use crate::ports::pricing_repository::PricingRepository;

/// Finds existing tenant seasons that would stack with a candidate.
///
/// Overlaps are allowed; the result is reported to the caller, never used
/// to reject the candidate.
#[derive(Clone)]
pub struct PeakSeasonOverlapResolver {
    repository: Arc<dyn PricingRepository>,
}

impl PeakSeasonOverlapResolver {
    pub fn new(repository: Arc<dyn PricingRepository>) -> Self {
        Self { repository }
    }

    pub async fn has_overlapped(
        &self,
        tenant_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        property_ids: &BTreeSet<String>,
        apply_to_all_properties: bool,
        exclude_id: Option<&str>,
    ) -> Result<Vec<PeakSeason>> {
        let window = DateWindow::new(start_date, end_date)?;
        let candidates = self
            .repository
            .find_peak_seasons_overlapping_range(tenant_id, window.start, window.end)
            .await?;
        Ok(filter_overlapping(
            candidates,
            &window,
            property_ids,
            apply_to_all_properties,
            exclude_id,
        ))
    }
}

/// Keep seasons that intersect `window` in dates and property scope.
pub fn filter_overlapping(
    candidates: Vec<PeakSeason>,
    window: &DateWindow,
    property_ids: &BTreeSet<String>,
    apply_to_all_properties: bool,
    exclude_id: Option<&str>,
) -> Vec<PeakSeason> {
    candidates
        .into_iter()
        .filter(|s| exclude_id != Some(s.id.as_str()))
        .filter(|s| s.overlaps_window(window))
        .filter(|s| s.scope_intersects(apply_to_all_properties, property_ids))
        .collect()
}

impl std::fmt::Debug for PeakSeasonOverlapResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeakSeasonOverlapResolver").finish()
    }
}
