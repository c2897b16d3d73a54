use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub booking_number: String,
    pub product_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub people_count: i64,
    pub desired_date: Option<NaiveDate>,
    pub selected_options: Vec<OptionSnapshot>,
    pub total_price: Option<i64>,
    pub requests: Option<String>,
    pub status: BookingStatus,
    pub admin_memo: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A price option as it looked when the booking was created. Stored with the
/// booking so later catalog edits never change historical totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub option_id: String,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Validate a status change. Requesting the current status is a no-op
    /// success; any edge not in the table below is rejected.
    ///
    /// pending -> confirmed | cancelled
    /// confirmed -> completed | cancelled
    /// completed, cancelled -> (terminal)
    pub fn transition(self, requested: BookingStatus) -> Result<BookingStatus, AppError> {
        use BookingStatus::*;

        if self == requested {
            return Ok(self);
        }

        match (self, requested) {
            (Pending, Confirmed) | (Pending, Cancelled) => Ok(requested),
            (Confirmed, Completed) | (Confirmed, Cancelled) => Ok(requested),
            (from, to) => Err(AppError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            }),
        }
    }
}
