use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, OptionSnapshot};
use crate::services::bookings::{create_booking, BookingDraft};
use crate::state::AppState;

/// Customer-facing view of a booking. Deliberately has no `admin_memo` field;
/// the internal annotation never leaves the admin surface.
#[derive(Serialize)]
pub struct PublicBooking {
    pub booking_number: String,
    pub product_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub people_count: i64,
    pub desired_date: Option<String>,
    pub selected_options: Vec<OptionSnapshot>,
    pub total_price: Option<i64>,
    pub requests: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl From<Booking> for PublicBooking {
    fn from(b: Booking) -> Self {
        PublicBooking {
            booking_number: b.booking_number,
            product_id: b.product_id,
            name: b.name,
            phone: b.phone,
            email: b.email,
            people_count: b.people_count,
            desired_date: b.desired_date.map(|d| d.to_string()),
            selected_options: b.selected_options,
            total_price: b.total_price,
            requests: b.requests,
            status: b.status.as_str().to_string(),
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// POST /api/bookings
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> Result<impl IntoResponse, AppError> {
    let booking = {
        let mut db = state.db.lock().unwrap();
        create_booking(&mut db, draft)?
    };
    Ok((StatusCode::CREATED, Json(PublicBooking::from(booking))))
}

// GET /api/bookings/number/:booking_number
pub async fn get_by_number(
    State(state): State<Arc<AppState>>,
    Path(booking_number): Path<String>,
) -> Result<Json<PublicBooking>, AppError> {
    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_number(&db, &booking_number)?
    }
    .ok_or_else(|| AppError::NotFound(format!("booking {booking_number}")))?;

    Ok(Json(PublicBooking::from(booking)))
}
