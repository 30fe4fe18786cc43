use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::types::{CacheConfig, Config, EngineConfig};
use crate::domain::availability::{
    AvailabilityMap, AvailabilityPatch, AvailabilityUpsert, RoomAvailability,
    build_availability_map,
};
use crate::domain::calendar::RoomCalendar;
use crate::domain::dates::{DateWindow, format_date_key, get_date_range};
use crate::domain::peak_season::{PeakSeason, active_seasons};
use crate::domain::pricing::{PriceBreakdown, calculate_availability_update, get_price_breakdown};
use crate::domain::range_evaluator::{
    RangeAvailability, StayQuote, check_room_range_availability, quote_stay,
};
use crate::domain::room::{Property, Room};
use crate::engine::invalidation::CacheInvalidator;
use crate::error::{PricingError, Result};
use crate::ports::cache::{AVAILABILITY_PREFIX, ResultCache, SEARCH_PREFIX, property_prefix};
use crate::ports::pricing_repository::PricingRepository;

/// Tenant edit of one room/day. `booked_units` is not editable here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SetAvailability {
    /// Open or close the day for booking.
    pub is_available: Option<bool>,
    /// Fixed nightly price overriding every other rule.
    pub custom_price: Option<f64>,
    /// Remove an existing fixed price.
    #[serde(default)]
    pub clear_custom_price: bool,
    /// Amount added to the base price before peak seasons.
    pub price_modifier: Option<f64>,
    #[serde(default)]
    pub clear_price_modifier: bool,
    pub reason: Option<String>,
}

impl SetAvailability {
    fn validate(&self) -> Result<()> {
        if let Some(price) = self.custom_price {
            if !price.is_finite() || price < 0.0 {
                return Err(PricingError::validation(
                    "custom price must be a non-negative number",
                ));
            }
        }
        if self.price_modifier.is_some_and(|m| !m.is_finite()) {
            return Err(PricingError::validation("price modifier must be a finite number"));
        }
        if self.custom_price.is_some() && self.clear_custom_price {
            return Err(PricingError::validation(
                "cannot set and clear the custom price at once",
            ));
        }
        if self.price_modifier.is_some() && self.clear_price_modifier {
            return Err(PricingError::validation(
                "cannot set and clear the price modifier at once",
            ));
        }
        Ok(())
    }

    fn into_patch(self) -> AvailabilityPatch {
        let custom_price = match (self.custom_price, self.clear_custom_price) {
            (Some(price), _) => Some(Some(price)),
            (None, true) => Some(None),
            (None, false) => None,
        };
        let price_modifier = match (self.price_modifier, self.clear_price_modifier) {
            (Some(modifier), _) => Some(Some(modifier)),
            (None, true) => Some(None),
            (None, false) => None,
        };
        AvailabilityPatch {
            is_available: self.is_available,
            custom_price,
            price_modifier,
            reason: self.reason.map(Some),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub tenant_id: String,
    /// Restrict to these properties; empty means every tenant property.
    #[serde(default)]
    pub property_ids: Vec<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: Option<u32>,
}

/// "From" price of one property for a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOffer {
    pub property_id: String,
    pub property_name: String,
    /// Lowest nightly price among the property's bookable rooms.
    pub min_price: i64,
    pub available_rooms: usize,
}

impl std::fmt::Display for PropertyOffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): from {}/night, {} room(s) available",
            self.property_name, self.property_id, self.min_price, self.available_rooms
        )
    }
}

/// Read and write paths over room availability.
///
/// Reads are served from the result cache when possible; every write drops
/// the cached entries of the touched property.
#[derive(Clone)]
pub struct AvailabilityService {
    repository: Arc<dyn PricingRepository>,
    cache: Arc<dyn ResultCache>,
    invalidator: CacheInvalidator,
    engine: EngineConfig,
    cache_config: CacheConfig,
}

impl AvailabilityService {
    pub fn new(
        repository: Arc<dyn PricingRepository>,
        cache: Arc<dyn ResultCache>,
        config: &Config,
    ) -> Self {
        Self {
            repository,
            invalidator: CacheInvalidator::new(Arc::clone(&cache)),
            cache,
            engine: config.engine.clone(),
            cache_config: config.cache.clone(),
        }
    }

    /// Upsert one room/day from a tenant edit and return the stored row.
    ///
    /// When peak seasons are active on the day and the edit does not set a
    /// fixed price, the materialized peak price is recomputed so it reflects
    /// a changed modifier. A reason given with the edit is kept.
    pub async fn set_availability(
        &self,
        room_id: &str,
        date: NaiveDate,
        input: SetAvailability,
    ) -> Result<RoomAvailability> {
        input.validate()?;
        let (room, property) = self.room_context(room_id).await?;
        let existing = self
            .repository
            .find_bulk_availability(std::slice::from_ref(&room.id), date, date)
            .await?
            .into_iter()
            .next();

        let mut patch = input.into_patch();
        if !matches!(patch.custom_price, Some(Some(_))) {
            let seasons = self
                .repository
                .find_peak_seasons_overlapping_range(&property.tenant_id, date, date)
                .await?;
            let active = active_seasons(&seasons, &room.property_id, date);
            if !active.is_empty() {
                let mut preview = existing
                    .clone()
                    .unwrap_or_else(|| RoomAvailability::new(&room.id, date, room.total_units));
                preview.apply(&patch);
                let update = calculate_availability_update(room.base_price, Some(&preview), &active);
                patch.custom_price = Some(update.custom_price);
                if patch.reason.is_none() {
                    patch.reason = Some(update.reason);
                }
            }
        }

        let mut create = RoomAvailability::new(&room.id, date, room.total_units);
        create.apply(&patch);
        let stored = match existing {
            Some(mut row) => {
                row.apply(&patch);
                row
            }
            None => create.clone(),
        };
        stored.validate()?;

        self.repository
            .upsert_availability_batch(vec![AvailabilityUpsert {
                update: patch,
                create,
            }])
            .await?;
        self.invalidator
            .invalidate_properties(&BTreeSet::from([room.property_id.clone()]));
        info!(room_id, date = %format_date_key(date), "availability updated");
        Ok(stored)
    }

    /// Create default rows for `seed_days` days from `from`. Existing rows
    /// are left alone; returns how many rows were created.
    pub async fn seed_room(&self, room_id: &str, from: NaiveDate) -> Result<usize> {
        let (room, property) = self.room_context(room_id).await?;
        let Some(last_offset) = self.engine.seed_days.checked_sub(1) else {
            return Ok(0);
        };
        let to = from
            .checked_add_days(Days::new(u64::from(last_offset)))
            .ok_or_else(|| PricingError::validation("seed window is out of range"))?;
        let window = DateWindow::new(from, to)?;

        let (existing, seasons) = self.load_room_inputs(&room, &property, &window).await?;
        let upserts: Vec<AvailabilityUpsert> = window
            .days()
            .into_iter()
            .filter(|&date| existing.get(&room.id, date).is_none())
            .map(|date| {
                let active = active_seasons(&seasons, &room.property_id, date);
                let update = calculate_availability_update(room.base_price, None, &active);
                AvailabilityUpsert {
                    update: AvailabilityPatch::default(),
                    create: RoomAvailability {
                        custom_price: update.custom_price,
                        reason: update.reason,
                        ..RoomAvailability::new(&room.id, date, room.total_units)
                    },
                }
            })
            .collect();

        let created = upserts.len();
        if created > 0 {
            self.repository.upsert_availability_batch(upserts).await?;
            self.invalidator
                .invalidate_properties(&BTreeSet::from([room.property_id.clone()]));
        }
        info!(room_id, window = %window, rows = created, "room seeded");
        Ok(created)
    }

    /// Availability and "from" price of one room for `[check_in, check_out)`.
    pub async fn check_stay(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<RangeAvailability> {
        let window = self.stay_window(check_in, check_out)?;
        let key = format!(
            "{AVAILABILITY_PREFIX}stay:{room_id}:{}:{}",
            format_date_key(check_in),
            format_date_key(check_out)
        );
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let (room, property) = self.room_context(room_id).await?;
        let (map, seasons) = self.load_room_inputs(&room, &property, &window).await?;
        let result = check_room_range_availability(
            &room.id,
            room.base_price,
            &window.days(),
            &map,
            &scoped_to(&seasons, &room.property_id),
        );

        self.store(&key, &result, self.cache_config.search_ttl_secs);
        Ok(result)
    }

    /// Properties of a tenant with at least one bookable room for the stay,
    /// cheapest first.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<PropertyOffer>> {
        let window = self.stay_window(request.check_in, request.check_out)?;
        let mut scope = request.property_ids.clone();
        scope.sort();
        let key = format!(
            "{SEARCH_PREFIX}{}:{}:{}:{}:{}",
            request.tenant_id,
            scope.join(","),
            format_date_key(request.check_in),
            format_date_key(request.check_out),
            request.guests.unwrap_or(0)
        );
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let properties: Vec<Property> = self
            .repository
            .find_properties_by_tenant(&request.tenant_id)
            .await?
            .into_iter()
            .filter(|p| scope.is_empty() || scope.contains(&p.id))
            .collect();
        let property_ids: Vec<String> = properties.iter().map(|p| p.id.clone()).collect();
        let rooms: Vec<Room> = self
            .repository
            .find_rooms_by_property_ids(&property_ids)
            .await?
            .into_iter()
            .filter(|r| r.fits(request.guests))
            .collect();
        let room_ids: Vec<String> = rooms.iter().map(|r| r.id.clone()).collect();

        let map = build_availability_map(
            self.repository
                .find_bulk_availability(&room_ids, window.start, window.end)
                .await?,
        );
        let seasons = self
            .repository
            .find_peak_seasons_overlapping_range(&request.tenant_id, window.start, window.end)
            .await?;
        let dates = window.days();

        let mut offers: Vec<PropertyOffer> = properties
            .iter()
            .filter_map(|property| {
                let scoped = scoped_to(&seasons, &property.id);
                let bookable: Vec<i64> = rooms
                    .iter()
                    .filter(|r| r.property_id == property.id)
                    .map(|r| {
                        check_room_range_availability(&r.id, r.base_price, &dates, &map, &scoped)
                    })
                    .filter(RangeAvailability::is_bookable)
                    .map(|r| r.min_price)
                    .collect();
                let min_price = bookable.iter().copied().min()?;
                Some(PropertyOffer {
                    property_id: property.id.clone(),
                    property_name: property.name.clone(),
                    min_price,
                    available_rooms: bookable.len(),
                })
            })
            .collect();
        offers.sort_by(|a, b| {
            a.min_price
                .cmp(&b.min_price)
                .then_with(|| a.property_id.cmp(&b.property_id))
        });

        debug!(
            tenant_id = %request.tenant_id,
            rooms = rooms.len(),
            offers = offers.len(),
            "search evaluated"
        );
        self.store(&key, &offers, self.cache_config.search_ttl_secs);
        Ok(offers)
    }

    /// Day-by-day prices for `days` days starting at `from`.
    pub async fn room_calendar(
        &self,
        room_id: &str,
        from: NaiveDate,
        days: u32,
    ) -> Result<RoomCalendar> {
        if days == 0 || days > self.engine.max_range_days {
            return Err(PricingError::validation(format!(
                "calendar length must be between 1 and {} days",
                self.engine.max_range_days
            )));
        }
        let (room, property) = self.room_context(room_id).await?;
        let key = format!(
            "{}calendar:{room_id}:{}:{days}",
            property_prefix(&room.property_id),
            format_date_key(from)
        );
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let to = from
            .checked_add_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| PricingError::validation("calendar window is out of range"))?;
        let window = DateWindow::new(from, to)?;
        let (map, seasons) = self.load_room_inputs(&room, &property, &window).await?;
        let calendar = RoomCalendar::build(&room, &get_date_range(from, to, true), &map, &seasons);

        self.store(&key, &calendar, self.cache_config.calendar_ttl_secs);
        Ok(calendar)
    }

    /// Nightly prices and total for a stay. Fails if any night is blocked.
    pub async fn quote_stay(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<StayQuote> {
        let window = self.stay_window(check_in, check_out)?;
        let (room, property) = self.room_context(room_id).await?;
        let key = format!(
            "{}quote:{room_id}:{}:{}",
            property_prefix(&room.property_id),
            format_date_key(check_in),
            format_date_key(check_out)
        );
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let (map, seasons) = self.load_room_inputs(&room, &property, &window).await?;
        let quote = quote_stay(&room, check_in, check_out, &map, &seasons)?;

        self.store(&key, &quote, self.cache_config.quote_ttl_secs);
        Ok(quote)
    }

    /// Step-by-step price of one room on one day.
    pub async fn price_breakdown(&self, room_id: &str, date: NaiveDate) -> Result<PriceBreakdown> {
        let (room, property) = self.room_context(room_id).await?;
        let window = DateWindow::new(date, date)?;
        let (map, seasons) = self.load_room_inputs(&room, &property, &window).await?;
        let active = active_seasons(&seasons, &room.property_id, date);
        Ok(get_price_breakdown(
            room.base_price,
            map.get(&room.id, date),
            &active,
        ))
    }

    async fn room_context(&self, room_id: &str) -> Result<(Room, Property)> {
        let room = self
            .repository
            .find_room(room_id)
            .await?
            .ok_or_else(|| PricingError::not_found("Room", room_id))?;
        let property = self
            .repository
            .find_property(&room.property_id)
            .await?
            .ok_or_else(|| PricingError::not_found("Property", room.property_id.clone()))?;
        Ok((room, property))
    }

    async fn load_room_inputs(
        &self,
        room: &Room,
        property: &Property,
        window: &DateWindow,
    ) -> Result<(AvailabilityMap, Vec<PeakSeason>)> {
        let rows = self
            .repository
            .find_bulk_availability(std::slice::from_ref(&room.id), window.start, window.end)
            .await?;
        let seasons = self
            .repository
            .find_peak_seasons_overlapping_range(&property.tenant_id, window.start, window.end)
            .await?;
        Ok((build_availability_map(rows), seasons))
    }

    /// Nights of a stay as an inclusive window ending the day before check-out.
    fn stay_window(&self, check_in: NaiveDate, check_out: NaiveDate) -> Result<DateWindow> {
        let last_night = check_out
            .pred_opt()
            .filter(|&night| night >= check_in)
            .ok_or_else(|| {
                PricingError::validation("check-out date must be after check-in date")
            })?;
        let window = DateWindow::new(check_in, last_night)?;
        if window.len_days() > self.engine.max_range_days {
            return Err(PricingError::validation(format!(
                "stay of {} nights exceeds the maximum of {}",
                window.len_days(),
                self.engine.max_range_days
            )));
        }
        Ok(window)
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    fn store<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        match serde_json::to_string(value) {
            Ok(json) => self.cache.set(key, &json, Duration::from_secs(ttl_secs)),
            Err(e) => warn!(key, error = %e, "failed to serialize result for cache"),
        }
    }
}

fn scoped_to(seasons: &[PeakSeason], property_id: &str) -> Vec<PeakSeason> {
    seasons
        .iter()
        .filter(|s| s.applies_to_property(property_id))
        .cloned()
        .collect()
}

impl std::fmt::Debug for AvailabilityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityService")
            .field("engine", &self.engine)
            .field("cache_config", &self.cache_config)
            .finish_non_exhaustive()
    }
}
