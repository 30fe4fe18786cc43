use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub property_id: String,
    #[serde(default)]
    pub name: String,
    /// Nightly price in whole currency units.
    pub base_price: i64,
    #[serde(default = "default_units")]
    pub total_units: u32,
    #[serde(default = "default_units")]
    pub capacity: u32,
    #[serde(default)]
    pub deleted: bool,
}

fn default_units() -> u32 {
    1
}

impl Room {
    pub fn fits(&self, guests: Option<u32>) -> bool {
        guests.is_none_or(|g| g <= self.capacity)
    }
}
