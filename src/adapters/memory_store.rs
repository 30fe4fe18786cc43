use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::availability::{AvailabilityUpsert, RoomAvailability};
use crate::domain::dates::format_date_key;
use crate::domain::peak_season::PeakSeason;
use crate::domain::room::{Property, Room};
use crate::error::{PricingError, Result};
use crate::ports::pricing_repository::PricingRepository;

/// Seed data for the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub peak_seasons: Vec<PeakSeason>,
    #[serde(default)]
    pub availability: Vec<RoomAvailability>,
}

impl Fixtures {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&content)?)
    }
}

type AvailabilityKey = (String, NaiveDate);

#[derive(Debug, Default)]
struct State {
    properties: BTreeMap<String, Property>,
    rooms: BTreeMap<String, Room>,
    peak_seasons: BTreeMap<String, PeakSeason>,
    availability: BTreeMap<AvailabilityKey, RoomAvailability>,
}

/// Process-local [`PricingRepository`]. A single write lock covers each
/// batch, so readers see either none or all of it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    sequence: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from fixtures. Peak seasons are stored as given; their
    /// effect on availability rows is not materialized here.
    pub fn from_fixtures(fixtures: Fixtures) -> Result<Self> {
        let mut state = State::default();
        for property in fixtures.properties {
            state.properties.insert(property.id.clone(), property);
        }
        for room in fixtures.rooms {
            if !state.properties.contains_key(&room.property_id) {
                return Err(PricingError::Config(format!(
                    "room {} references unknown property {}",
                    room.id, room.property_id
                )));
            }
            state.rooms.insert(room.id.clone(), room);
        }
        for season in fixtures.peak_seasons {
            if season.start_date > season.end_date {
                return Err(PricingError::Config(format!(
                    "peak season {} ends before it starts",
                    season.id
                )));
            }
            state.peak_seasons.insert(season.id.clone(), season);
        }
        for row in fixtures.availability {
            if !state.rooms.contains_key(&row.room_id) {
                return Err(PricingError::Config(format!(
                    "availability row references unknown room {}",
                    row.room_id
                )));
            }
            row.validate()?;
            state
                .availability
                .insert((row.room_id.clone(), row.date), row);
        }
        Ok(Self {
            state: RwLock::new(state),
            sequence: AtomicU64::new(0),
        })
    }

    pub async fn insert_property(&self, property: Property) {
        self.state
            .write()
            .await
            .properties
            .insert(property.id.clone(), property);
    }

    pub async fn insert_room(&self, room: Room) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.properties.contains_key(&room.property_id) {
            return Err(PricingError::not_found("Property", room.property_id));
        }
        state.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    pub async fn get_availability(&self, room_id: &str, date: NaiveDate) -> Option<RoomAvailability> {
        self.state
            .read()
            .await
            .availability
            .get(&(room_id.to_string(), date))
            .cloned()
    }

    pub async fn availability_count(&self) -> usize {
        self.state.read().await.availability.len()
    }

    pub async fn rooms(&self) -> Vec<Room> {
        self.state.read().await.rooms.values().cloned().collect()
    }

    pub async fn peak_seasons(&self) -> Vec<PeakSeason> {
        self.state.read().await.peak_seasons.values().cloned().collect()
    }
}

#[async_trait]
impl PricingRepository for InMemoryStore {
    async fn find_rooms_by_property_ids(&self, property_ids: &[String]) -> Result<Vec<Room>> {
        let wanted: HashSet<&str> = property_ids.iter().map(String::as_str).collect();
        Ok(self
            .state
            .read()
            .await
            .rooms
            .values()
            .filter(|r| !r.deleted && wanted.contains(r.property_id.as_str()))
            .cloned()
            .collect())
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<Room>> {
        Ok(self
            .state
            .read()
            .await
            .rooms
            .get(room_id)
            .filter(|r| !r.deleted)
            .cloned())
    }

    async fn find_bulk_availability(
        &self,
        room_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RoomAvailability>> {
        if from > to {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        let mut rows = Vec::new();
        for room_id in room_ids {
            rows.extend(
                state
                    .availability
                    .range((room_id.clone(), from)..=(room_id.clone(), to))
                    .map(|(_, row)| row.clone()),
            );
        }
        Ok(rows)
    }

    async fn find_peak_seasons_overlapping_range(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PeakSeason>> {
        let mut seasons: Vec<PeakSeason> = self
            .state
            .read()
            .await
            .peak_seasons
            .values()
            .filter(|s| s.tenant_id == tenant_id && s.start_date <= to && s.end_date >= from)
            .cloned()
            .collect();
        seasons.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        Ok(seasons)
    }

    async fn find_peak_seasons_by_tenant(&self, tenant_id: &str) -> Result<Vec<PeakSeason>> {
        let mut seasons: Vec<PeakSeason> = self
            .state
            .read()
            .await
            .peak_seasons
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        seasons.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        Ok(seasons)
    }

    async fn find_peak_season(&self, tenant_id: &str, id: &str) -> Result<Option<PeakSeason>> {
        Ok(self
            .state
            .read()
            .await
            .peak_seasons
            .get(id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_properties_by_tenant(&self, tenant_id: &str) -> Result<Vec<Property>> {
        Ok(self
            .state
            .read()
            .await
            .properties
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn find_property(&self, property_id: &str) -> Result<Option<Property>> {
        Ok(self.state.read().await.properties.get(property_id).cloned())
    }

    async fn upsert_availability_batch(&self, rows: Vec<AvailabilityUpsert>) -> Result<()> {
        let mut state = self.state.write().await;

        // Stage everything first; nothing touches `state` until all rows pass.
        let mut staged: BTreeMap<AvailabilityKey, RoomAvailability> = BTreeMap::new();
        for upsert in rows {
            let key = (upsert.room_id().to_string(), upsert.date());
            if !state.rooms.contains_key(&key.0) {
                return Err(PricingError::Store(format!(
                    "availability upsert references unknown room {}",
                    key.0
                )));
            }
            let next = match staged.get(&key).or_else(|| state.availability.get(&key)) {
                Some(existing) => {
                    let mut row = existing.clone();
                    row.apply(&upsert.update);
                    row
                }
                None => upsert.create,
            };
            next.validate().map_err(|e| {
                PricingError::Store(format!(
                    "rejected row for room {} on {}: {e}",
                    key.0,
                    format_date_key(key.1)
                ))
            })?;
            staged.insert(key, next);
        }

        state.availability.extend(staged);
        Ok(())
    }

    async fn save_peak_season(&self, season: &PeakSeason) -> Result<()> {
        self.state
            .write()
            .await
            .peak_seasons
            .insert(season.id.clone(), season.clone());
        Ok(())
    }

    async fn delete_peak_season(&self, tenant_id: &str, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        match state.peak_seasons.get(id) {
            Some(season) if season.tenant_id == tenant_id => {
                state.peak_seasons.remove(id);
                Ok(())
            }
            _ => Err(PricingError::not_found("Peak season", id)),
        }
    }

    fn next_peak_season_id(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ps-{}-{n}", Utc::now().timestamp_millis())
    }
}
