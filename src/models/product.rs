use serde::{Deserialize, Serialize};

/// Catalog product as the booking engine sees it. The catalog itself (titles,
/// content, curation) is managed elsewhere; this crate only reads pricing
/// constraints and bumps the request counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    /// None means "quote on request" — bookings get no total_price.
    pub base_price: Option<i64>,
    pub min_people: Option<i64>,
    pub max_people: Option<i64>,
    pub request_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceOption {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: i64,
    pub price_type: PriceType,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    PerPerson,
    PerRoom,
    Additional,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::PerPerson => "per_person",
            PriceType::PerRoom => "per_room",
            PriceType::Additional => "additional",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "per_person" => PriceType::PerPerson,
            "per_room" => PriceType::PerRoom,
            _ => PriceType::Additional,
        }
    }
}
