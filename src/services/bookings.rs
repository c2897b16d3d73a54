use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, OptionSnapshot};
use crate::services::{pricing, sequence};

/// Incoming creation request, as submitted by the storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingDraft {
    pub product_id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub people_count: i64,
    pub desired_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    pub requests: Option<String>,
    /// Advisory only. The authoritative total is always recomputed here from
    /// the catalog's live base price and option prices; a mismatch is rejected.
    pub total_price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    pub option_id: String,
    pub quantity: i64,
}

/// Create a booking: validate against the product, snapshot option prices,
/// compose the total, allocate a number, persist, and bump the product's
/// request counter — all inside one transaction so a failure at any step
/// leaves no partial state behind.
pub fn create_booking(conn: &mut Connection, draft: BookingDraft) -> Result<Booking, AppError> {
    if draft.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if draft.phone.trim().is_empty() {
        return Err(AppError::Validation("phone is required".to_string()));
    }

    let tx = conn.transaction()?;

    let product = queries::get_product(&tx, &draft.product_id)?
        .ok_or_else(|| AppError::NotFound(format!("product {}", draft.product_id)))?;

    pricing::check_people_bounds(draft.people_count, product.min_people, product.max_people)?;

    let snapshots = snapshot_options(&tx, &product.id, &draft.selected_options)?;

    let total_price = pricing::compose(product.base_price, draft.people_count, &snapshots)?;
    if let Some(client_total) = draft.total_price {
        if total_price != Some(client_total) {
            return Err(AppError::Validation(format!(
                "submitted total_price {client_total} does not match the computed total"
            )));
        }
    }

    let now = Utc::now().naive_utc();
    let booking_number = sequence::allocate(&tx, now.date())?;

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        booking_number,
        product_id: product.id.clone(),
        name: draft.name,
        phone: draft.phone,
        email: draft.email,
        people_count: draft.people_count,
        desired_date: draft.desired_date,
        selected_options: snapshots,
        total_price,
        requests: draft.requests,
        status: BookingStatus::Pending,
        admin_memo: None,
        created_at: now,
        updated_at: now,
    };

    queries::insert_booking(&tx, &booking)?;
    queries::increment_request_count(&tx, &product.id)?;

    tx.commit()?;

    tracing::info!(
        booking_number = %booking.booking_number,
        product_id = %booking.product_id,
        people_count = booking.people_count,
        total_price = ?booking.total_price,
        "booking created"
    );

    Ok(booking)
}

/// Resolve the requested options against the product's currently active
/// price options and copy name and unit price into the booking. Later catalog
/// edits never reach back into these snapshots.
fn snapshot_options(
    conn: &Connection,
    product_id: &str,
    selected: &[SelectedOption],
) -> Result<Vec<OptionSnapshot>, AppError> {
    if selected.is_empty() {
        return Ok(vec![]);
    }

    let active = queries::get_active_price_options(conn, product_id)?;

    let mut snapshots = Vec::with_capacity(selected.len());
    for sel in selected {
        if sel.quantity < 1 {
            return Err(AppError::Validation(format!(
                "quantity for option {} must be at least 1",
                sel.option_id
            )));
        }
        let option = active
            .iter()
            .find(|o| o.id == sel.option_id)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "price option {} not found or inactive for this product",
                    sel.option_id
                ))
            })?;
        snapshots.push(OptionSnapshot {
            option_id: option.id.clone(),
            name: option.name.clone(),
            unit_price: option.unit_price,
            quantity: sel.quantity,
        });
    }
    Ok(snapshots)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdate {
    pub status: Option<BookingStatus>,
    /// Internal annotation. Present-and-empty clears it; absent leaves it
    /// untouched. Independent of status, settable in any state.
    pub admin_memo: Option<String>,
}

/// Apply a status transition and/or memo change. Status goes through the
/// transition table; everything else about the record is immutable.
pub fn update_booking(
    conn: &Connection,
    id: &str,
    update: BookingUpdate,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    let new_status = match update.status {
        Some(requested) => {
            let applied = booking.status.transition(requested)?;
            if applied != booking.status {
                tracing::info!(
                    booking_number = %booking.booking_number,
                    from = booking.status.as_str(),
                    to = applied.as_str(),
                    "booking status changed"
                );
            }
            applied
        }
        None => booking.status,
    };

    let new_memo = match update.admin_memo {
        Some(memo) if memo.is_empty() => None,
        Some(memo) => Some(memo),
        None => booking.admin_memo.clone(),
    };

    // Guarded on the status this transition was validated against: if a
    // concurrent writer (possibly another instance) moved the booking in the
    // meantime, the write misses and the caller retries against fresh state.
    let updated =
        queries::update_booking_fields(conn, id, booking.status, new_status, new_memo.as_deref())?;
    if !updated {
        return Err(AppError::Conflict(format!(
            "booking {id} was modified concurrently, retry"
        )));
    }

    queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}
