use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::dates::format_date_key;
use crate::error::{PricingError, Result};

/// Stored state of one room on one calendar day. Unique per `(room_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_id: String,
    pub date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_available: bool,
    /// Absolute nightly price override.
    #[serde(default)]
    pub custom_price: Option<f64>,
    /// Additive delta applied to the base price.
    #[serde(default)]
    pub price_modifier: Option<f64>,
    #[serde(default)]
    pub booked_units: u32,
    #[serde(default = "default_units")]
    pub total_units: u32,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_units() -> u32 {
    1
}

impl RoomAvailability {
    pub fn new(room_id: impl Into<String>, date: NaiveDate, total_units: u32) -> Self {
        Self {
            room_id: room_id.into(),
            date,
            is_available: true,
            custom_price: None,
            price_modifier: None,
            booked_units: 0,
            total_units,
            reason: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.booked_units > self.total_units {
            return Err(PricingError::validation(format!(
                "room {} on {}: booked units {} exceed total units {}",
                self.room_id,
                format_date_key(self.date),
                self.booked_units,
                self.total_units
            )));
        }
        for (field, value) in [
            ("custom price", self.custom_price),
            ("price modifier", self.price_modifier),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(PricingError::validation(format!(
                    "{field} must be a finite number"
                )));
            }
        }
        Ok(())
    }

    pub fn has_bookings(&self) -> bool {
        self.booked_units >= 1
    }

    pub fn apply(&mut self, patch: &AvailabilityPatch) {
        if let Some(is_available) = patch.is_available {
            self.is_available = is_available;
        }
        if let Some(custom_price) = patch.custom_price {
            self.custom_price = custom_price;
        }
        if let Some(price_modifier) = patch.price_modifier {
            self.price_modifier = price_modifier;
        }
        if let Some(reason) = &patch.reason {
            self.reason.clone_from(reason);
        }
    }
}

/// Partial update of a stored row. `None` leaves a field untouched; the
/// nested options clear or set nullable columns. There is deliberately no
/// `booked_units` field: bookings own that column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPatch {
    pub is_available: Option<bool>,
    pub custom_price: Option<Option<f64>>,
    pub price_modifier: Option<Option<f64>>,
    pub reason: Option<Option<String>>,
}

/// Update-or-create instruction for one `(room_id, date)` row.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityUpsert {
    /// Applied to the existing row.
    pub update: AvailabilityPatch,
    /// Inserted when no row exists.
    pub create: RoomAvailability,
}

impl AvailabilityUpsert {
    pub fn room_id(&self) -> &str {
        &self.create.room_id
    }

    pub fn date(&self) -> NaiveDate {
        self.create.date
    }
}

/// `"{room_id}-{YYYY-MM-DD}"`.
pub fn availability_key(room_id: &str, date: NaiveDate) -> String {
    format!("{room_id}-{}", format_date_key(date))
}

/// O(1) lookup of availability rows by room and day. Build once per batch.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityMap {
    entries: HashMap<String, RoomAvailability>,
}

impl AvailabilityMap {
    pub fn get(&self, room_id: &str, date: NaiveDate) -> Option<&RoomAvailability> {
        self.entries.get(&availability_key(room_id, date))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<RoomAvailability> for AvailabilityMap {
    fn from_iter<I: IntoIterator<Item = RoomAvailability>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|record| (availability_key(&record.room_id, record.date), record))
            .collect();
        Self { entries }
    }
}

pub fn build_availability_map(records: Vec<RoomAvailability>) -> AvailabilityMap {
    records.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    #[test]
    fn key_uses_padded_date() {
        assert_eq!(availability_key("room-1", d(5)), "room-1-2024-07-05");
    }

    #[test]
    fn map_lookup_by_room_and_date() {
        let map = build_availability_map(vec![
            RoomAvailability::new("r1", d(1), 1),
            RoomAvailability {
                custom_price: Some(90.0),
                ..RoomAvailability::new("r1", d(2), 1)
            },
            RoomAvailability::new("r2", d(1), 3),
        ]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("r1", d(2)).unwrap().custom_price, Some(90.0));
        assert_eq!(map.get("r2", d(1)).unwrap().total_units, 3);
        assert!(map.get("r2", d(2)).is_none());
    }

    #[test]
    fn later_duplicate_wins() {
        let map = build_availability_map(vec![
            RoomAvailability::new("r1", d(1), 1),
            RoomAvailability {
                is_available: false,
                ..RoomAvailability::new("r1", d(1), 1)
            },
        ]);
        assert_eq!(map.len(), 1);
        assert!(!map.get("r1", d(1)).unwrap().is_available);
    }

    #[test]
    fn validate_rejects_overbooking() {
        let row = RoomAvailability {
            booked_units: 3,
            ..RoomAvailability::new("r1", d(1), 2)
        };
        let err = row.validate().unwrap_err();
        assert!(err.to_string().contains("exceed total units"));
    }

    #[test]
    fn validate_rejects_non_finite_price() {
        let row = RoomAvailability {
            custom_price: Some(f64::INFINITY),
            ..RoomAvailability::new("r1", d(1), 1)
        };
        assert!(row.validate().is_err());
    }

    #[test]
    fn patch_touches_only_given_fields() {
        let mut row = RoomAvailability {
            booked_units: 1,
            price_modifier: Some(15.0),
            ..RoomAvailability::new("r1", d(1), 2)
        };
        row.apply(&AvailabilityPatch {
            custom_price: Some(Some(240.0)),
            reason: Some(Some("Peak Season: Summer".into())),
            ..AvailabilityPatch::default()
        });
        assert_eq!(row.custom_price, Some(240.0));
        assert_eq!(row.reason.as_deref(), Some("Peak Season: Summer"));
        assert_eq!(row.price_modifier, Some(15.0));
        assert_eq!(row.booked_units, 1);
        assert!(row.is_available);
    }

    #[test]
    fn patch_can_clear_nullable_fields() {
        let mut row = RoomAvailability {
            custom_price: Some(100.0),
            reason: Some("old".into()),
            ..RoomAvailability::new("r1", d(1), 1)
        };
        row.apply(&AvailabilityPatch {
            custom_price: Some(None),
            reason: Some(None),
            ..AvailabilityPatch::default()
        });
        assert!(row.custom_price.is_none());
        assert!(row.reason.is_none());
    }

    #[test]
    fn row_defaults_from_yaml() {
        let row: RoomAvailability =
            serde_yml::from_str("room_id: r1\ndate: 2024-07-01").unwrap();
        assert!(row.is_available);
        assert_eq!(row.total_units, 1);
        assert_eq!(row.booked_units, 0);
    }
}
