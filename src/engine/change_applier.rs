use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::availability::{
    AvailabilityPatch, AvailabilityUpsert, RoomAvailability, build_availability_map,
};
use crate::domain::dates::DateWindow;
use crate::domain::peak_season::PeakSeason;
use crate::domain::pricing::calculate_availability_update;
use crate::error::Result;
use crate::ports::pricing_repository::PricingRepository;

/// What a single recomputation touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedChange {
    pub affected_property_ids: BTreeSet<String>,
    pub affected_room_count: usize,
    pub window: DateWindow,
    pub rows_upserted: usize,
}

/// Re-materializes availability rows after a peak season is created,
/// updated, or deleted.
#[derive(Clone)]
pub struct PeakSeasonChangeApplier {
    repository: Arc<dyn PricingRepository>,
}

impl PeakSeasonChangeApplier {
    pub fn new(repository: Arc<dyn PricingRepository>) -> Self {
        Self { repository }
    }

    /// Recompute `custom_price` and `reason` for every room of every affected
    /// property across the union of the old and new windows.
    ///
    /// All loads happen before the single batch write, so a failed load
    /// writes nothing. `booked_units` and `is_available` of existing rows are
    /// never changed.
    pub async fn apply_changes(
        &self,
        new_season: &PeakSeason,
        old_season: Option<&PeakSeason>,
        is_delete: bool,
    ) -> Result<AppliedChange> {
        let mut property_ids = self.resolve_property_ids(new_season).await?;
        if let Some(old) = old_season {
            property_ids.extend(self.resolve_property_ids(old).await?);
        }

        let window = old_season.map_or_else(
            || new_season.window(),
            |old| new_season.window().union(old.window()),
        );

        if property_ids.is_empty() {
            debug!(season_id = %new_season.id, "no properties affected");
            return Ok(AppliedChange {
                affected_property_ids: property_ids,
                affected_room_count: 0,
                window,
                rows_upserted: 0,
            });
        }

        let ids: Vec<String> = property_ids.iter().cloned().collect();
        let rooms = self.repository.find_rooms_by_property_ids(&ids).await?;
        let room_ids: Vec<String> = rooms.iter().map(|r| r.id.clone()).collect();
        let existing = build_availability_map(
            self.repository
                .find_bulk_availability(&room_ids, window.start, window.end)
                .await?,
        );

        // Fresh read; the caller's copy of the other seasons may be stale.
        let others: Vec<PeakSeason> = self
            .repository
            .find_peak_seasons_overlapping_range(&new_season.tenant_id, window.start, window.end)
            .await?
            .into_iter()
            .filter(|s| s.id != new_season.id)
            .collect();

        let dates = window.days();
        let mut upserts = Vec::with_capacity(rooms.len() * dates.len());
        for room in &rooms {
            for &date in &dates {
                let mut active: Vec<&PeakSeason> = others
                    .iter()
                    .filter(|s| s.is_active_on(date) && s.applies_to_property(&room.property_id))
                    .collect();
                if !is_delete
                    && new_season.is_active_on(date)
                    && new_season.applies_to_property(&room.property_id)
                {
                    active.push(new_season);
                }

                let update = calculate_availability_update(
                    room.base_price,
                    existing.get(&room.id, date),
                    &active,
                );
                upserts.push(AvailabilityUpsert {
                    update: AvailabilityPatch {
                        custom_price: Some(update.custom_price),
                        reason: Some(update.reason.clone()),
                        ..AvailabilityPatch::default()
                    },
                    create: RoomAvailability {
                        custom_price: update.custom_price,
                        reason: update.reason,
                        ..RoomAvailability::new(&room.id, date, room.total_units)
                    },
                });
            }
        }

        let rows_upserted = upserts.len();
        if rows_upserted > 0 {
            self.repository.upsert_availability_batch(upserts).await?;
        }

        info!(
            season_id = %new_season.id,
            tenant_id = %new_season.tenant_id,
            window = %window,
            rooms = rooms.len(),
            days = dates.len(),
            rows = rows_upserted,
            is_delete,
            "peak season applied"
        );

        Ok(AppliedChange {
            affected_property_ids: property_ids,
            affected_room_count: rooms.len(),
            window,
            rows_upserted,
        })
    }

    async fn resolve_property_ids(&self, season: &PeakSeason) -> Result<BTreeSet<String>> {
        if !season.apply_to_all_properties {
            return Ok(season.property_ids.clone());
        }
        Ok(self
            .repository
            .find_properties_by_tenant(&season.tenant_id)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect())
    }
}

impl std::fmt::Debug for PeakSeasonChangeApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeakSeasonChangeApplier").finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::adapters::memory_store::InMemoryStore;
    use crate::domain::peak_season::ChangeType;
    use crate::test_helpers::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    async fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_property(make_property("p1", "t1")).await;
        store.insert_property(make_property("p2", "t1")).await;
        store.insert_property(make_property("p9", "t2")).await;
        store.insert_room(make_room("r1", "p1", 100)).await.unwrap();
        store.insert_room(make_room("r2", "p2", 200)).await.unwrap();
        store.insert_room(make_room("r9", "p9", 300)).await.unwrap();
        store
    }

    async fn price(store: &InMemoryStore, room: &str, day: u32) -> Option<f64> {
        store
            .get_availability(room, d(day))
            .await
            .and_then(|r| r.custom_price)
    }

    #[tokio::test]
    async fn global_season_touches_all_tenant_rooms() {
        let store = store().await;
        let season = make_season("s1", "t1", d(1), d(3));
        store.save_peak_season(&season).await.unwrap();

        let applied = PeakSeasonChangeApplier::new(store.clone())
            .apply_changes(&season, None, false)
            .await
            .unwrap();

        assert_eq!(applied.affected_room_count, 2);
        assert_eq!(applied.rows_upserted, 6);
        assert_eq!(price(&store, "r1", 2).await, Some(110.0));
        assert_eq!(price(&store, "r2", 2).await, Some(220.0));
        assert!(store.get_availability("r9", d(2)).await.is_none());
    }

    #[tokio::test]
    async fn scoped_season_touches_listed_properties_only() {
        let store = store().await;
        let season = PeakSeason {
            apply_to_all_properties: false,
            property_ids: ["p2".to_string()].into(),
            ..make_season("s1", "t1", d(1), d(1))
        };
        store.save_peak_season(&season).await.unwrap();

        PeakSeasonChangeApplier::new(store.clone())
            .apply_changes(&season, None, false)
            .await
            .unwrap();

        assert!(store.get_availability("r1", d(1)).await.is_none());
        assert_eq!(price(&store, "r2", 1).await, Some(220.0));
    }

    #[tokio::test]
    async fn existing_row_keeps_bookings_and_flag() {
        let store = store().await;
        store
            .upsert_availability_batch(vec![AvailabilityUpsert {
                update: AvailabilityPatch::default(),
                create: RoomAvailability {
                    booked_units: 1,
                    is_available: false,
                    price_modifier: Some(10.0),
                    ..RoomAvailability::new("r1", d(1), 1)
                },
            }])
            .await
            .unwrap();
        let season = make_season("s1", "t1", d(1), d(1));
        store.save_peak_season(&season).await.unwrap();

        PeakSeasonChangeApplier::new(store.clone())
            .apply_changes(&season, None, false)
            .await
            .unwrap();

        let row = store.get_availability("r1", d(1)).await.unwrap();
        assert_eq!(row.booked_units, 1);
        assert!(!row.is_available);
        assert_eq!(row.custom_price, Some(121.0));
        assert_eq!(row.reason.as_deref(), Some("Peak Season: Season s1"));
    }

    #[tokio::test]
    async fn update_clears_days_left_behind() {
        let store = store().await;
        let applier = PeakSeasonChangeApplier::new(store.clone());
        let old = make_season("s1", "t1", d(1), d(5));
        store.save_peak_season(&old).await.unwrap();
        applier.apply_changes(&old, None, false).await.unwrap();

        let new = PeakSeason {
            start_date: d(4),
            end_date: d(8),
            ..old.clone()
        };
        store.save_peak_season(&new).await.unwrap();
        let applied = applier.apply_changes(&new, Some(&old), false).await.unwrap();

        assert_eq!(applied.window, DateWindow::new(d(1), d(8)).unwrap());
        assert_eq!(price(&store, "r1", 2).await, None);
        assert_eq!(price(&store, "r1", 4).await, Some(110.0));
        assert_eq!(price(&store, "r1", 8).await, Some(110.0));
    }

    #[tokio::test]
    async fn other_seasons_stay_in_effect() {
        let store = store().await;
        let applier = PeakSeasonChangeApplier::new(store.clone());
        let nominal = PeakSeason {
            name: "Festival".into(),
            change_type: ChangeType::Nominal,
            change_value: 50.0,
            ..make_season("s2", "t1", d(1), d(1))
        };
        store.save_peak_season(&nominal).await.unwrap();
        let season = make_season("s1", "t1", d(1), d(1));
        store.save_peak_season(&season).await.unwrap();

        applier.apply_changes(&season, None, false).await.unwrap();
        assert_eq!(price(&store, "r1", 1).await, Some(160.0));

        store.delete_peak_season("t1", "s1").await.unwrap();
        applier.apply_changes(&season, Some(&season), true).await.unwrap();
        let row = store.get_availability("r1", d(1)).await.unwrap();
        assert_eq!(row.custom_price, Some(150.0));
        assert_eq!(row.reason.as_deref(), Some("Peak Season: Festival"));
    }

    #[tokio::test]
    async fn failed_load_writes_nothing() {
        let store = store().await;
        let season = make_season("s1", "t1", d(1), d(3));
        let flaky = Arc::new(FlakyRepository::new(store.clone()).fail_on(FailPoint::BulkAvailability));

        let result = PeakSeasonChangeApplier::new(flaky)
            .apply_changes(&season, None, false)
            .await;

        assert!(result.is_err());
        assert_eq!(store.availability_count().await, 0);
    }

    #[tokio::test]
    async fn no_properties_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let season = make_season("s1", "t1", d(1), d(3));
        let applied = PeakSeasonChangeApplier::new(store.clone())
            .apply_changes(&season, None, false)
            .await
            .unwrap();
        assert!(applied.affected_property_ids.is_empty());
        assert_eq!(applied.rows_upserted, 0);
    }
}
