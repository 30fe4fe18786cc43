#![allow(clippy::cast_precision_loss)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::availability::{AvailabilityMap, RoomAvailability};
use crate::domain::dates::format_date_key;
use crate::domain::peak_season::{PeakSeason, active_seasons};
use crate::domain::pricing::calculate_final_room_price;
use crate::domain::room::Room;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub price: Option<i64>,
    pub available: bool,
    pub remaining_units: u32,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCalendar {
    pub room_id: String,
    pub property_id: String,
    pub days: Vec<CalendarDay>,
    #[serde(default)]
    pub average_price: Option<f64>,
    #[serde(default)]
    pub occupancy_rate: Option<f64>,
    #[serde(default)]
    pub min_price: Option<i64>,
    #[serde(default)]
    pub max_price: Option<i64>,
}

impl RoomCalendar {
    /// Price every day in `dates` for `room`. A day is available when its row
    /// allows it and carries no booking, the same rule stay checks use;
    /// `remaining_units` is reported separately.
    pub fn build(
        room: &Room,
        dates: &[NaiveDate],
        availability_map: &AvailabilityMap,
        peak_seasons: &[PeakSeason],
    ) -> Self {
        let days = dates
            .iter()
            .map(|&date| {
                let record = availability_map.get(&room.id, date);
                let active = active_seasons(peak_seasons, &room.property_id, date);
                let calculated = calculate_final_room_price(room.base_price, record, &active);
                let remaining_units = record.map_or(room.total_units, |r| {
                    r.total_units.saturating_sub(r.booked_units)
                });
                CalendarDay {
                    date,
                    price: calculated.price,
                    available: calculated.available
                        && !record.is_some_and(RoomAvailability::has_bookings),
                    remaining_units,
                    reason: record.and_then(|r| r.reason.clone()),
                }
            })
            .collect();

        let mut calendar = Self {
            room_id: room.id.clone(),
            property_id: room.property_id.clone(),
            days,
            average_price: None,
            occupancy_rate: None,
            min_price: None,
            max_price: None,
        };
        calendar.compute_stats();
        calendar
    }

    /// Compute summary statistics from the day-by-day data.
    pub fn compute_stats(&mut self) {
        let prices: Vec<i64> = self
            .days
            .iter()
            .filter(|d| d.available)
            .filter_map(|d| d.price)
            .collect();
        if !prices.is_empty() {
            self.average_price = Some(prices.iter().sum::<i64>() as f64 / prices.len() as f64);
            self.min_price = prices.iter().copied().min();
            self.max_price = prices.iter().copied().max();
        }
        let total = self.days.len();
        if total > 0 {
            let unavailable = self.days.iter().filter(|d| !d.available).count();
            self.occupancy_rate = Some(unavailable as f64 / total as f64 * 100.0);
        }
    }
}

impl std::fmt::Display for RoomCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Calendar for room {} (property {})",
            self.room_id, self.property_id
        )?;
        if let Some(occ) = self.occupancy_rate {
            writeln!(f, "Occupancy: {occ:.1}%")?;
        }
        if let Some(avg) = self.average_price {
            write!(f, "Avg price: {avg:.0}")?;
            if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
                write!(f, " (range: {min}-{max})")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "{:<12} {:>8} {:>10} {:>6}  Reason",
            "Date", "Price", "Available", "Left"
        )?;
        writeln!(f, "{}", "-".repeat(52))?;
        for day in &self.days {
            let price = day
                .price
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            let available = if day.available { "Yes" } else { "No" };
            writeln!(
                f,
                "{:<12} {:>8} {:>10} {:>6}  {}",
                format_date_key(day.date),
                price,
                available,
                day.remaining_units,
                day.reason.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}
