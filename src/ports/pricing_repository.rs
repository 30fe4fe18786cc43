use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::availability::{AvailabilityUpsert, RoomAvailability};
use crate::domain::peak_season::PeakSeason;
use crate::domain::room::{Property, Room};
use crate::error::Result;

/// Persistence the pricing engine reads from and writes to.
#[async_trait]
pub trait PricingRepository: Send + Sync {
    /// Non-deleted rooms of the given properties.
    async fn find_rooms_by_property_ids(&self, property_ids: &[String]) -> Result<Vec<Room>>;

    async fn find_room(&self, room_id: &str) -> Result<Option<Room>>;

    /// Rows for `room_ids` with `from <= date <= to`, in one query.
    async fn find_bulk_availability(
        &self,
        room_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RoomAvailability>>;

    /// Tenant seasons intersecting `[from, to]`, ordered by start date.
    async fn find_peak_seasons_overlapping_range(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PeakSeason>>;

    async fn find_peak_seasons_by_tenant(&self, tenant_id: &str) -> Result<Vec<PeakSeason>>;

    async fn find_peak_season(&self, tenant_id: &str, id: &str) -> Result<Option<PeakSeason>>;

    async fn find_properties_by_tenant(&self, tenant_id: &str) -> Result<Vec<Property>>;

    async fn find_property(&self, property_id: &str) -> Result<Option<Property>>;

    /// Apply every upsert or none of them.
    async fn upsert_availability_batch(&self, rows: Vec<AvailabilityUpsert>) -> Result<()>;

    async fn save_peak_season(&self, season: &PeakSeason) -> Result<()>;

    async fn delete_peak_season(&self, tenant_id: &str, id: &str) -> Result<()>;

    fn next_peak_season_id(&self) -> String;
}
