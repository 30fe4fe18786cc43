use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::availability::AvailabilityMap;
use crate::domain::dates::{format_date_key, get_date_range};
use crate::domain::peak_season::{PeakSeason, active_seasons};
use crate::domain::pricing::calculate_final_room_price;
use crate::domain::room::Room;
use crate::error::{PricingError, Result};

/// Outcome of scanning a date range for one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeAvailability {
    pub is_available: bool,
    /// Lowest nightly price in the range ("from X/night"), not the stay total.
    /// Zero when the range is blocked or empty.
    pub min_price: i64,
    /// Days that produced a price. Zero for an empty range.
    pub priced_days: usize,
}

impl RangeAvailability {
    pub const BLOCKED: Self = Self {
        is_available: false,
        min_price: 0,
        priced_days: 0,
    };

    /// Available with a meaningful minimum price.
    pub fn is_bookable(&self) -> bool {
        self.is_available && self.priced_days > 0
    }
}

/// Walk `date_range` for one room and reduce it to availability plus the
/// minimum nightly price.
///
/// A single day with a booking or an `is_available = false` row blocks the
/// whole range. `peak_seasons` must already be limited to seasons that apply
/// to the room's property; only their dates are checked here.
pub fn check_room_range_availability(
    room_id: &str,
    base_price: i64,
    date_range: &[NaiveDate],
    availability_map: &AvailabilityMap,
    peak_seasons: &[PeakSeason],
) -> RangeAvailability {
    let mut min_price = i64::MAX;
    let mut priced_days = 0;

    for &date in date_range {
        let record = availability_map.get(room_id, date);
        if record.is_some_and(|r| r.has_bookings() || !r.is_available) {
            return RangeAvailability::BLOCKED;
        }
        let active: Vec<&PeakSeason> = peak_seasons
            .iter()
            .filter(|s| s.is_active_on(date))
            .collect();
        if let Some(price) = calculate_final_room_price(base_price, record, &active).price {
            priced_days += 1;
            min_price = min_price.min(price);
        }
    }

    RangeAvailability {
        is_available: true,
        min_price: if priced_days == 0 { 0 } else { min_price },
        priced_days,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightlyPrice {
    pub date: NaiveDate,
    pub price: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Nightly prices and total for a stay `[check_in, check_out)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayQuote {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: Vec<NightlyPrice>,
    pub total: i64,
}

impl StayQuote {
    pub fn average_nightly(&self) -> Option<i64> {
        let count = i64::try_from(self.nights.len()).ok().filter(|n| *n > 0)?;
        Some(self.total / count)
    }
}

impl std::fmt::Display for StayQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Stay quote for room {} ({} to {}, {} nights)",
            self.room_id,
            format_date_key(self.check_in),
            format_date_key(self.check_out),
            self.nights.len()
        )?;
        for night in &self.nights {
            write!(f, "  {}  {:>8}", format_date_key(night.date), night.price)?;
            if let Some(reason) = &night.reason {
                write!(f, "  {reason}")?;
            }
            writeln!(f)?;
        }
        write!(f, "Total: {}", self.total)
    }
}

/// Price every night of a stay. Fails on the first blocked night.
pub fn quote_stay(
    room: &Room,
    check_in: NaiveDate,
    check_out: NaiveDate,
    availability_map: &AvailabilityMap,
    peak_seasons: &[PeakSeason],
) -> Result<StayQuote> {
    if check_out <= check_in {
        return Err(PricingError::validation(
            "check-out date must be after check-in date",
        ));
    }

    let mut nights = Vec::new();
    for date in get_date_range(check_in, check_out, false) {
        let record = availability_map.get(&room.id, date);
        if record.is_some_and(|r| r.has_bookings() || !r.is_available) {
            return Err(PricingError::validation(format!(
                "room {} is not available on {}",
                room.id,
                format_date_key(date)
            )));
        }
        let active = active_seasons(peak_seasons, &room.property_id, date);
        let calculated = calculate_final_room_price(room.base_price, record, &active);
        let Some(price) = calculated.price else {
            return Err(PricingError::validation(format!(
                "room {} has no price on {}",
                room.id,
                format_date_key(date)
            )));
        };
        nights.push(NightlyPrice {
            date,
            price,
            reason: record.and_then(|r| r.reason.clone()),
        });
    }

    let total = nights.iter().map(|n| n.price).sum();
    Ok(StayQuote {
        room_id: room.id.clone(),
        check_in,
        check_out,
        nights,
        total,
    })
}
