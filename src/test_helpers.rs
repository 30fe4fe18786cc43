use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::availability::{AvailabilityUpsert, RoomAvailability};
use crate::domain::peak_season::{ChangeType, PeakSeason};
use crate::domain::room::{Property, Room};
use crate::error::{PricingError, Result};
use crate::ports::cache::ResultCache;
use crate::ports::pricing_repository::PricingRepository;

/// Repository calls [`FlakyRepository`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Rooms,
    BulkAvailability,
    Seasons,
    Properties,
    UpsertBatch,
    SaveSeason,
    DeleteSeason,
}

/// Delegates to an inner repository, failing the configured calls.
pub struct FlakyRepository {
    inner: Arc<dyn PricingRepository>,
    failing: HashSet<FailPoint>,
}

impl FlakyRepository {
    pub fn new(inner: Arc<dyn PricingRepository>) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
        }
    }

    #[must_use]
    pub fn fail_on(mut self, point: FailPoint) -> Self {
        self.failing.insert(point);
        self
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.failing.contains(&point) {
            return Err(PricingError::Store(format!("injected failure: {point:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PricingRepository for FlakyRepository {
    async fn find_rooms_by_property_ids(&self, property_ids: &[String]) -> Result<Vec<Room>> {
        self.check(FailPoint::Rooms)?;
        self.inner.find_rooms_by_property_ids(property_ids).await
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<Room>> {
        self.check(FailPoint::Rooms)?;
        self.inner.find_room(room_id).await
    }

    async fn find_bulk_availability(
        &self,
        room_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RoomAvailability>> {
        self.check(FailPoint::BulkAvailability)?;
        self.inner.find_bulk_availability(room_ids, from, to).await
    }

    async fn find_peak_seasons_overlapping_range(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PeakSeason>> {
        self.check(FailPoint::Seasons)?;
        self.inner
            .find_peak_seasons_overlapping_range(tenant_id, from, to)
            .await
    }

    async fn find_peak_seasons_by_tenant(&self, tenant_id: &str) -> Result<Vec<PeakSeason>> {
        self.check(FailPoint::Seasons)?;
        self.inner.find_peak_seasons_by_tenant(tenant_id).await
    }

    async fn find_peak_season(&self, tenant_id: &str, id: &str) -> Result<Option<PeakSeason>> {
        self.check(FailPoint::Seasons)?;
        self.inner.find_peak_season(tenant_id, id).await
    }

    async fn find_properties_by_tenant(&self, tenant_id: &str) -> Result<Vec<Property>> {
        self.check(FailPoint::Properties)?;
        self.inner.find_properties_by_tenant(tenant_id).await
    }

    async fn find_property(&self, property_id: &str) -> Result<Option<Property>> {
        self.check(FailPoint::Properties)?;
        self.inner.find_property(property_id).await
    }

    async fn upsert_availability_batch(&self, rows: Vec<AvailabilityUpsert>) -> Result<()> {
        self.check(FailPoint::UpsertBatch)?;
        self.inner.upsert_availability_batch(rows).await
    }

    async fn save_peak_season(&self, season: &PeakSeason) -> Result<()> {
        self.check(FailPoint::SaveSeason)?;
        self.inner.save_peak_season(season).await
    }

    async fn delete_peak_season(&self, tenant_id: &str, id: &str) -> Result<()> {
        self.check(FailPoint::DeleteSeason)?;
        self.inner.delete_peak_season(tenant_id, id).await
    }

    fn next_peak_season_id(&self) -> String {
        self.inner.next_peak_season_id()
    }
}

/// Cache whose invalidation always fails.
pub struct BrokenCache;

impl ResultCache for BrokenCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) {}

    fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        Err(PricingError::Cache(format!("cannot invalidate {prefix}")))
    }
}

pub fn make_property(id: &str, tenant_id: &str) -> Property {
    Property {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        name: format!("Property {id}"),
    }
}

pub fn make_room(id: &str, property_id: &str, base_price: i64) -> Room {
    Room {
        id: id.to_string(),
        property_id: property_id.to_string(),
        name: format!("Room {id}"),
        base_price,
        total_units: 1,
        capacity: 2,
        deleted: false,
    }
}

/// A global +10% season named "Season {id}".
pub fn make_season(id: &str, tenant_id: &str, start: NaiveDate, end: NaiveDate) -> PeakSeason {
    PeakSeason {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        name: format!("Season {id}"),
        start_date: start,
        end_date: end,
        change_type: ChangeType::Percentage,
        change_value: 10.0,
        apply_to_all_properties: true,
        property_ids: std::collections::BTreeSet::new(),
    }
}
