use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::types::EngineConfig;
use crate::domain::dates::DateWindow;
use crate::error::{PricingError, Result};

/// How a peak season moves the nightly price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// `change_value` is a percentage of the (modified) base price.
    Percentage,
    /// `change_value` is an absolute amount added after percentages.
    Nominal,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percentage => write!(f, "percentage"),
            Self::Nominal => write!(f, "nominal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakSeason {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub change_type: ChangeType,
    pub change_value: f64,
    #[serde(default)]
    pub apply_to_all_properties: bool,
    /// Empty when `apply_to_all_properties` is set.
    #[serde(default)]
    pub property_ids: BTreeSet<String>,
}

impl PeakSeason {
    pub fn window(&self) -> DateWindow {
        DateWindow {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn applies_to_property(&self, property_id: &str) -> bool {
        self.apply_to_all_properties || self.property_ids.contains(property_id)
    }

    /// Property scopes intersect when either side is global or they share an id.
    pub fn scope_intersects(&self, apply_to_all: bool, property_ids: &BTreeSet<String>) -> bool {
        self.apply_to_all_properties
            || apply_to_all
            || !self.property_ids.is_disjoint(property_ids)
    }

    pub fn overlaps_window(&self, window: &DateWindow) -> bool {
        self.start_date <= window.end && self.end_date >= window.start
    }
}

impl std::fmt::Display for PeakSeason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}: ", self.name, self.id, self.window())?;
        match self.change_type {
            ChangeType::Percentage => write!(f, "{:+}%", self.change_value)?,
            ChangeType::Nominal => write!(f, "{:+}", self.change_value)?,
        }
        if self.apply_to_all_properties {
            write!(f, " on all properties")
        } else {
            let ids: Vec<&str> = self.property_ids.iter().map(String::as_str).collect();
            write!(f, " on {}", ids.join(", "))
        }
    }
}

/// Seasons active on `date` that apply to `property_id`.
pub fn active_seasons<'a>(
    seasons: &'a [PeakSeason],
    property_id: &str,
    date: NaiveDate,
) -> Vec<&'a PeakSeason> {
    seasons
        .iter()
        .filter(|s| s.is_active_on(date) && s.applies_to_property(property_id))
        .collect()
}

/// Tenant input for creating or replacing a peak season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakSeasonDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub change_type: ChangeType,
    pub change_value: f64,
    #[serde(default)]
    pub apply_to_all_properties: bool,
    #[serde(default)]
    pub property_ids: Vec<String>,
}

impl PeakSeasonDraft {
    /// Check the draft and return it normalized: trimmed name, deduplicated
    /// property ids, and no property ids on a global season.
    pub fn validate(self, config: &EngineConfig) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(PricingError::validation("peak season name is required"));
        }
        let window = DateWindow::new(self.start_date, self.end_date)?;
        if window.len_days() > config.max_range_days {
            return Err(PricingError::validation(format!(
                "peak season spans {} days, maximum is {}",
                window.len_days(),
                config.max_range_days
            )));
        }
        if !self.change_value.is_finite() {
            return Err(PricingError::validation("change value must be a finite number"));
        }
        if self.change_type == ChangeType::Percentage
            && !(config.min_percentage..=config.max_percentage).contains(&self.change_value)
        {
            return Err(PricingError::validation(format!(
                "percentage change {} is outside [{}, {}]",
                self.change_value, config.min_percentage, config.max_percentage
            )));
        }

        let property_ids: Vec<String> = if self.apply_to_all_properties {
            Vec::new()
        } else {
            let ids: BTreeSet<String> = self
                .property_ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
            if ids.is_empty() {
                return Err(PricingError::validation(
                    "select at least one property or apply to all properties",
                ));
            }
            ids.into_iter().collect()
        };

        Ok(Self {
            name,
            property_ids,
            ..self
        })
    }

    pub fn into_season(self, id: impl Into<String>, tenant_id: impl Into<String>) -> PeakSeason {
        PeakSeason {
            id: id.into(),
            tenant_id: tenant_id.into(),
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            change_type: self.change_type,
            change_value: self.change_value,
            apply_to_all_properties: self.apply_to_all_properties,
            property_ids: self.property_ids.into_iter().collect(),
        }
    }
}
