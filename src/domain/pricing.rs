//! Nightly price computation.
//!
//! Pure functions, no I/O. Evaluation order is fixed:
//! 1. an unavailable day has no price;
//! 2. a custom price replaces everything else;
//! 3. otherwise base price, plus the modifier, then the summed percentage of
//!    every active season, then the summed nominal amount, rounded and
//!    clamped at zero.
//!
//! Percentages from stacked seasons are added together before being applied
//! once, so two +10% seasons give +20%, not +21%.

use serde::{Deserialize, Serialize};

use crate::domain::availability::RoomAvailability;
use crate::domain::peak_season::{ChangeType, PeakSeason};

/// Price and bookability of one room on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedPrice {
    pub available: bool,
    pub price: Option<i64>,
}

impl CalculatedPrice {
    pub const UNAVAILABLE: Self = Self {
        available: false,
        price: None,
    };

    pub fn priced(price: i64) -> Self {
        Self {
            available: true,
            price: Some(price),
        }
    }
}

/// Round half toward positive infinity (`2.5 -> 3`, `-2.5 -> -2`).
#[allow(clippy::cast_possible_truncation)]
pub fn round_price(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Summed effect of every active season.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SeasonTotals {
    percentage: f64,
    nominal: f64,
}

impl SeasonTotals {
    fn fold(seasons: &[&PeakSeason]) -> Self {
        seasons
            .iter()
            .fold(Self::default(), |mut acc, season| {
                match season.change_type {
                    ChangeType::Percentage => acc.percentage += season.change_value,
                    ChangeType::Nominal => acc.nominal += season.change_value,
                }
                acc
            })
    }
}

pub fn calculate_final_room_price(
    base_price: i64,
    availability: Option<&RoomAvailability>,
    peak_seasons: &[&PeakSeason],
) -> CalculatedPrice {
    if let Some(row) = availability {
        if !row.is_available {
            return CalculatedPrice::UNAVAILABLE;
        }
        if let Some(custom) = row.custom_price {
            return CalculatedPrice::priced(round_price(custom));
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mut price = base_price as f64;
    if let Some(modifier) = availability.and_then(|row| row.price_modifier) {
        price += modifier;
    }
    let totals = SeasonTotals::fold(peak_seasons);
    price *= 1.0 + totals.percentage / 100.0;
    price += totals.nominal;

    CalculatedPrice::priced(round_price(price).max(0))
}

/// One step of a price computation, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PriceStep {
    Unavailable,
    CustomPrice {
        custom_price: f64,
        price: i64,
    },
    Base {
        price: f64,
    },
    Modifier {
        delta: f64,
        price: f64,
    },
    Percentage {
        total: f64,
        seasons: Vec<String>,
        price: f64,
    },
    Nominal {
        total: f64,
        seasons: Vec<String>,
        price: f64,
    },
    Rounded {
        price: i64,
    },
}

impl std::fmt::Display for PriceStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Unavailable: no price"),
            Self::CustomPrice {
                custom_price,
                price,
            } => write!(f, "Custom price {custom_price} overrides everything -> {price}"),
            Self::Base { price } => write!(f, "Base price {price:.2}"),
            Self::Modifier { delta, price } => {
                write!(f, "Modifier {delta:+} -> {price:.2}")
            }
            Self::Percentage {
                total,
                seasons,
                price,
            } => write!(
                f,
                "Peak season {total:+}% ({}) -> {price:.2}",
                seasons.join(", ")
            ),
            Self::Nominal {
                total,
                seasons,
                price,
            } => write!(
                f,
                "Peak season {total:+} ({}) -> {price:.2}",
                seasons.join(", ")
            ),
            Self::Rounded { price } => write!(f, "Rounded, floor 0 -> {price}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: i64,
    pub steps: Vec<PriceStep>,
    pub result: CalculatedPrice,
}

impl std::fmt::Display for PriceBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{}. {step}", i + 1)?;
        }
        match self.result.price {
            Some(price) if self.result.available => write!(f, "Final price: {price}"),
            _ => write!(f, "Final price: unavailable"),
        }
    }
}

/// Same result as [`calculate_final_room_price`], with a trace of each step.
pub fn get_price_breakdown(
    base_price: i64,
    availability: Option<&RoomAvailability>,
    seasons: &[&PeakSeason],
) -> PriceBreakdown {
    let result = calculate_final_room_price(base_price, availability, seasons);
    let mut steps = Vec::new();

    if let Some(row) = availability {
        if !row.is_available {
            steps.push(PriceStep::Unavailable);
            return PriceBreakdown {
                base_price,
                steps,
                result,
            };
        }
        if let Some(custom_price) = row.custom_price {
            steps.push(PriceStep::CustomPrice {
                custom_price,
                price: round_price(custom_price),
            });
            return PriceBreakdown {
                base_price,
                steps,
                result,
            };
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mut price = base_price as f64;
    steps.push(PriceStep::Base { price });
    if let Some(delta) = availability.and_then(|row| row.price_modifier) {
        price += delta;
        steps.push(PriceStep::Modifier { delta, price });
    }

    let names_of = |kind: ChangeType| -> Vec<String> {
        seasons
            .iter()
            .filter(|s| s.change_type == kind)
            .map(|s| s.name.clone())
            .collect()
    };
    let totals = SeasonTotals::fold(seasons);
    let percentage_names = names_of(ChangeType::Percentage);
    if !percentage_names.is_empty() {
        price *= 1.0 + totals.percentage / 100.0;
        steps.push(PriceStep::Percentage {
            total: totals.percentage,
            seasons: percentage_names,
            price,
        });
    }
    let nominal_names = names_of(ChangeType::Nominal);
    if !nominal_names.is_empty() {
        price += totals.nominal;
        steps.push(PriceStep::Nominal {
            total: totals.nominal,
            seasons: nominal_names,
            price,
        });
    }
    steps.push(PriceStep::Rounded {
        price: result.price.unwrap_or_default(),
    });

    PriceBreakdown {
        base_price,
        steps,
        result,
    }
}

/// What the change applier writes into a stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub custom_price: Option<f64>,
    pub reason: Option<String>,
}

pub const PEAK_SEASON_REASON_PREFIX: &str = "Peak Season: ";

/// Materialize the effect of `active` seasons for one stored row.
///
/// The price is recomputed from base price plus the row's modifier. The row's
/// current custom price and availability flag are ignored so that applying
/// the same seasons again always yields the same value. With no active
/// season both fields are cleared.
pub fn calculate_availability_update(
    base_price: i64,
    existing: Option<&RoomAvailability>,
    active: &[&PeakSeason],
) -> AvailabilityUpdate {
    if active.is_empty() {
        return AvailabilityUpdate {
            custom_price: None,
            reason: None,
        };
    }

    let mut ordered = active.to_vec();
    ordered.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });

    let view = existing.map(|row| RoomAvailability {
        is_available: true,
        custom_price: None,
        ..row.clone()
    });
    let calculated = calculate_final_room_price(base_price, view.as_ref(), &ordered);
    let names: Vec<&str> = ordered.iter().map(|s| s.name.as_str()).collect();

    #[allow(clippy::cast_precision_loss)]
    AvailabilityUpdate {
        custom_price: calculated.price.map(|p| p as f64),
        reason: Some(format!("{PEAK_SEASON_REASON_PREFIX}{}", names.join(", "))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn season(name: &str, change_type: ChangeType, change_value: f64) -> PeakSeason {
        PeakSeason {
            id: format!("ps-{name}"),
            tenant_id: "t1".into(),
            name: name.into(),
            start_date: date(),
            end_date: date(),
            change_type,
            change_value,
            apply_to_all_properties: true,
            property_ids: BTreeSet::new(),
        }
    }

    fn row() -> RoomAvailability {
        RoomAvailability::new("r1", date(), 1)
    }

    #[test]
    fn base_price_without_row_or_seasons() {
        assert_eq!(
            calculate_final_room_price(150, None, &[]),
            CalculatedPrice::priced(150)
        );
    }

    #[test]
    fn unavailable_wins_over_custom_price() {
        let row = RoomAvailability {
            is_available: false,
            custom_price: Some(500.0),
            ..row()
        };
        assert_eq!(
            calculate_final_room_price(100, Some(&row), &[]),
            CalculatedPrice::UNAVAILABLE
        );
    }

    #[test]
    fn custom_price_ignores_modifier_and_seasons() {
        let row = RoomAvailability {
            custom_price: Some(99.6),
            price_modifier: Some(50.0),
            ..row()
        };
        let s = season("Summer", ChangeType::Percentage, 50.0);
        assert_eq!(
            calculate_final_room_price(100, Some(&row), &[&s]),
            CalculatedPrice::priced(100)
        );
    }

    #[test]
    fn stacked_percentages_add_not_compound() {
        let a = season("A", ChangeType::Percentage, 10.0);
        let b = season("B", ChangeType::Percentage, 10.0);
        assert_eq!(
            calculate_final_room_price(100, None, &[&a, &b]).price,
            Some(120)
        );
    }

    #[test]
    fn percentage_applies_before_nominal() {
        let a = season("A", ChangeType::Percentage, 50.0);
        let b = season("B", ChangeType::Nominal, 10.0);
        // order of the input does not matter
        assert_eq!(calculate_final_room_price(100, None, &[&b, &a]).price, Some(160));
    }

    #[test]
    fn modifier_applies_before_percentage() {
        let row = RoomAvailability {
            price_modifier: Some(20.0),
            ..row()
        };
        let a = season("A", ChangeType::Percentage, 50.0);
        assert_eq!(calculate_final_room_price(100, Some(&row), &[&a]).price, Some(180));
    }

    #[test]
    fn mixed_scenario_rounds_result() {
        let a = season("A", ChangeType::Percentage, 20.0);
        let b = season("B", ChangeType::Nominal, 15.0);
        assert_eq!(calculate_final_room_price(200, None, &[&a, &b]).price, Some(255));
    }

    #[test]
    fn negative_result_clamps_to_zero() {
        let a = season("A", ChangeType::Nominal, -500.0);
        assert_eq!(calculate_final_room_price(100, None, &[&a]).price, Some(0));
        let b = season("B", ChangeType::Percentage, -100.0);
        let c = season("C", ChangeType::Percentage, -100.0);
        assert_eq!(calculate_final_room_price(100, None, &[&b, &c]).price, Some(0));
    }

    #[test]
    fn round_price_half_up() {
        assert_eq!(round_price(2.5), 3);
        assert_eq!(round_price(2.4999), 2);
        assert_eq!(round_price(-2.5), -2);
        assert_eq!(round_price(-2.6), -3);
    }

    #[test]
    fn breakdown_matches_calculation() {
        let row = RoomAvailability {
            price_modifier: Some(-10.0),
            ..row()
        };
        let a = season("Summer", ChangeType::Percentage, 25.0);
        let b = season("Festival", ChangeType::Nominal, 7.0);
        let breakdown = get_price_breakdown(110, Some(&row), &[&a, &b]);
        assert_eq!(
            breakdown.result,
            calculate_final_room_price(110, Some(&row), &[&a, &b])
        );
        assert_eq!(breakdown.result.price, Some(132));
        assert_eq!(breakdown.steps.len(), 5);
        let text = breakdown.to_string();
        assert!(text.contains("1. Base price 110.00"));
        assert!(text.contains("Modifier -10 -> 100.00"));
        assert!(text.contains("Peak season +25% (Summer) -> 125.00"));
        assert!(text.contains("Peak season +7 (Festival) -> 132.00"));
        assert!(text.ends_with("Final price: 132"));
    }

    #[test]
    fn breakdown_for_unavailable_day() {
        let row = RoomAvailability {
            is_available: false,
            ..row()
        };
        let breakdown = get_price_breakdown(100, Some(&row), &[]);
        assert_eq!(breakdown.steps, vec![PriceStep::Unavailable]);
        assert!(breakdown.to_string().ends_with("Final price: unavailable"));
    }

    #[test]
    fn breakdown_for_custom_price() {
        let row = RoomAvailability {
            custom_price: Some(80.0),
            ..row()
        };
        let breakdown = get_price_breakdown(100, Some(&row), &[]);
        assert_eq!(
            breakdown.steps,
            vec![PriceStep::CustomPrice {
                custom_price: 80.0,
                price: 80
            }]
        );
    }

    #[test]
    fn availability_update_joins_all_names() {
        let a = season("Summer", ChangeType::Percentage, 10.0);
        let b = season("Festival", ChangeType::Nominal, 5.0);
        let update = calculate_availability_update(100, None, &[&a, &b]);
        assert_eq!(update.custom_price, Some(115.0));
        assert_eq!(update.reason.as_deref(), Some("Peak Season: Festival, Summer"));
    }

    #[test]
    fn availability_update_ignores_materialized_price() {
        let stale = RoomAvailability {
            custom_price: Some(999.0),
            is_available: false,
            price_modifier: Some(10.0),
            ..row()
        };
        let a = season("Summer", ChangeType::Percentage, 10.0);
        let update = calculate_availability_update(100, Some(&stale), &[&a]);
        assert_eq!(update.custom_price, Some(121.0));
    }

    #[test]
    fn availability_update_clears_without_seasons() {
        let update = calculate_availability_update(100, Some(&row()), &[]);
        assert!(update.custom_price.is_none());
        assert!(update.reason.is_none());
    }
}
