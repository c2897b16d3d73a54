use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, OptionSnapshot, PriceOption, PriceType, Product};

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Catalog (external collaborator; read-only apart from the counter) ──

pub fn get_product(conn: &Connection, id: &str) -> Result<Option<Product>, AppError> {
    let product = conn
        .query_row(
            "SELECT id, title, base_price, min_people, max_people, request_count
             FROM products WHERE id = ?1",
            params![id],
            |row| {
                Ok(Product {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    base_price: row.get(2)?,
                    min_people: row.get(3)?,
                    max_people: row.get(4)?,
                    request_count: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(product)
}

pub fn get_active_price_options(
    conn: &Connection,
    product_id: &str,
) -> Result<Vec<PriceOption>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, product_id, name, description, unit_price, price_type, is_active
         FROM price_options WHERE product_id = ?1 AND is_active = 1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![product_id], |row| {
        Ok(PriceOption {
            id: row.get(0)?,
            product_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            unit_price: row.get(4)?,
            price_type: {
                let s: String = row.get(5)?;
                PriceType::parse(&s)
            },
            is_active: row.get::<_, i64>(6)? != 0,
        })
    })?;

    let mut options = vec![];
    for row in rows {
        options.push(row?);
    }
    Ok(options)
}

/// Lifetime "times requested" counter. Atomic in-database increment so
/// concurrent creations against one product never lose an update.
pub fn increment_request_count(conn: &Connection, product_id: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE products SET request_count = request_count + 1 WHERE id = ?1",
        params![product_id],
    )?;
    Ok(())
}

pub fn insert_product(conn: &Connection, product: &Product) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO products (id, title, base_price, min_people, max_people, request_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            product.id,
            product.title,
            product.base_price,
            product.min_people,
            product.max_people,
            product.request_count,
        ],
    )?;
    Ok(())
}

pub fn insert_price_option(conn: &Connection, option: &PriceOption) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO price_options (id, product_id, name, description, unit_price, price_type, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            option.id,
            option.product_id,
            option.name,
            option.description,
            option.unit_price,
            option.price_type.as_str(),
            option.is_active as i64,
        ],
    )?;
    Ok(())
}

pub fn set_option_price(conn: &Connection, id: &str, unit_price: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE price_options SET unit_price = ?1 WHERE id = ?2",
        params![unit_price, id],
    )?;
    Ok(())
}

pub fn delete_price_option(conn: &Connection, id: &str) -> Result<(), AppError> {
    conn.execute("DELETE FROM price_options WHERE id = ?1", params![id])?;
    Ok(())
}

// ── Booking number sequence ──

/// Bump and return the per-date sequence. The upsert is a single atomic
/// statement; callers run it inside the creation transaction so a rolled-back
/// creation also rolls the counter back (no burned numbers).
pub fn next_sequence(conn: &Connection, date_key: &str) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO booking_sequences (date, seq) VALUES (?1, 1)
         ON CONFLICT(date) DO UPDATE SET seq = seq + 1",
        params![date_key],
    )?;

    let seq: i64 = conn.query_row(
        "SELECT seq FROM booking_sequences WHERE date = ?1",
        params![date_key],
        |row| row.get(0),
    )?;
    Ok(seq)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO bookings (id, booking_number, product_id, name, phone, email, people_count,
                               desired_date, total_price, requests, status, admin_memo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.booking_number,
            booking.product_id,
            booking.name,
            booking.phone,
            booking.email,
            booking.people_count,
            booking.desired_date.map(|d| d.to_string()),
            booking.total_price,
            booking.requests,
            booking.status.as_str(),
            booking.admin_memo,
            booking.created_at.format(TS_FMT).to_string(),
            booking.updated_at.format(TS_FMT).to_string(),
        ],
    )?;

    for (position, opt) in booking.selected_options.iter().enumerate() {
        conn.execute(
            "INSERT INTO booking_options (booking_id, option_id, name, unit_price, quantity, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                booking.id,
                opt.option_id,
                opt.name,
                opt.unit_price,
                opt.quantity,
                position as i64,
            ],
        )?;
    }
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let row = conn
        .query_row(
            &format!("{BOOKING_SELECT} WHERE id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;

    attach_options(conn, row)
}

pub fn get_booking_by_number(
    conn: &Connection,
    booking_number: &str,
) -> Result<Option<Booking>, AppError> {
    let row = conn
        .query_row(
            &format!("{BOOKING_SELECT} WHERE booking_number = ?1"),
            params![booking_number],
            parse_booking_row,
        )
        .optional()?;

    attach_options(conn, row)
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> Result<Vec<Booking>, AppError> {
    let mut bookings = match status_filter {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "{BOOKING_SELECT} WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status.as_str(), limit], parse_booking_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "{BOOKING_SELECT} ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], parse_booking_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    for booking in &mut bookings {
        booking.selected_options = load_option_snapshots(conn, &booking.id)?;
    }
    Ok(bookings)
}

/// Write back the two mutable fields. `updated_at` is bumped here so every
/// mutation path shares the same clock handling.
///
/// The write is guarded on `expected_status`, the status the caller validated
/// the transition against. Another instance may have moved the booking in
/// between; writing anyway would stitch together an edge the transition table
/// never allowed. Zero affected rows means the guard (or the id) missed and
/// the caller decides which.
pub fn update_booking_fields(
    conn: &Connection,
    id: &str,
    expected_status: BookingStatus,
    status: BookingStatus,
    admin_memo: Option<&str>,
) -> Result<bool, AppError> {
    let now = Utc::now().naive_utc().format(TS_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, admin_memo = ?2, updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![status.as_str(), admin_memo, now, id, expected_status.as_str()],
    )?;
    Ok(count > 0)
}

const BOOKING_SELECT: &str = "SELECT id, booking_number, product_id, name, phone, email, people_count, \
     desired_date, total_price, requests, status, admin_memo, created_at, updated_at FROM bookings";

fn attach_options(
    conn: &Connection,
    booking: Option<Booking>,
) -> Result<Option<Booking>, AppError> {
    match booking {
        Some(mut b) => {
            b.selected_options = load_option_snapshots(conn, &b.id)?;
            Ok(Some(b))
        }
        None => Ok(None),
    }
}

fn load_option_snapshots(
    conn: &Connection,
    booking_id: &str,
) -> Result<Vec<OptionSnapshot>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT option_id, name, unit_price, quantity
         FROM booking_options WHERE booking_id = ?1 ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(OptionSnapshot {
            option_id: row.get(0)?,
            name: row.get(1)?,
            unit_price: row.get(2)?,
            quantity: row.get(3)?,
        })
    })?;

    let mut options = vec![];
    for row in rows {
        options.push(row?);
    }
    Ok(options)
}

fn parse_booking_row(row: &rusqlite::Row) -> Result<Booking, rusqlite::Error> {
    let desired_date: Option<String> = row.get(7)?;
    let status_str: String = row.get(10)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    Ok(Booking {
        id: row.get(0)?,
        booking_number: row.get(1)?,
        product_id: row.get(2)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        people_count: row.get(6)?,
        desired_date: desired_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        selected_options: vec![],
        total_price: row.get(8)?,
        requests: row.get(9)?,
        status: BookingStatus::parse(&status_str).unwrap_or(BookingStatus::Pending),
        admin_memo: row.get(11)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, TS_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        updated_at: NaiveDateTime::parse_from_str(&updated_at_str, TS_FMT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn seed_product(conn: &Connection, id: &str) {
        insert_product(
            conn,
            &Product {
                id: id.to_string(),
                title: "Test Tour".to_string(),
                base_price: Some(100_000),
                min_people: None,
                max_people: None,
                request_count: 0,
            },
        )
        .unwrap();
    }

    fn sample_booking(id: &str, number: &str, product_id: &str) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: id.to_string(),
            booking_number: number.to_string(),
            product_id: product_id.to_string(),
            name: "Kim".to_string(),
            phone: "010-1234-5678".to_string(),
            email: None,
            people_count: 2,
            desired_date: None,
            selected_options: vec![],
            total_price: Some(200_000),
            requests: None,
            status: BookingStatus::Pending,
            admin_memo: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_next_sequence_increments_per_date() {
        let conn = setup_db();
        assert_eq!(next_sequence(&conn, "20250101").unwrap(), 1);
        assert_eq!(next_sequence(&conn, "20250101").unwrap(), 2);
        assert_eq!(next_sequence(&conn, "20250102").unwrap(), 1);
        assert_eq!(next_sequence(&conn, "20250101").unwrap(), 3);
    }

    #[test]
    fn test_booking_number_unique_constraint() {
        let conn = setup_db();
        seed_product(&conn, "p1");
        insert_booking(&conn, &sample_booking("b1", "BK20250101-001", "p1")).unwrap();
        let err = insert_booking(&conn, &sample_booking("b2", "BK20250101-001", "p1"));
        assert!(err.is_err());
    }

    #[test]
    fn test_request_count_increment() {
        let conn = setup_db();
        seed_product(&conn, "p1");
        increment_request_count(&conn, "p1").unwrap();
        increment_request_count(&conn, "p1").unwrap();
        let product = get_product(&conn, "p1").unwrap().unwrap();
        assert_eq!(product.request_count, 2);
    }

    #[test]
    fn test_option_snapshots_round_trip_in_order() {
        let conn = setup_db();
        seed_product(&conn, "p1");
        let mut booking = sample_booking("b1", "BK20250101-001", "p1");
        booking.selected_options = vec![
            OptionSnapshot {
                option_id: "opt-a".to_string(),
                name: "Single room".to_string(),
                unit_price: 200_000,
                quantity: 2,
            },
            OptionSnapshot {
                option_id: "opt-b".to_string(),
                name: "Airport pickup".to_string(),
                unit_price: 50_000,
                quantity: 1,
            },
        ];
        insert_booking(&conn, &booking).unwrap();

        let loaded = get_booking_by_number(&conn, "BK20250101-001")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.selected_options, booking.selected_options);
    }

    #[test]
    fn test_list_newest_first_with_status_filter() {
        let conn = setup_db();
        seed_product(&conn, "p1");

        let early = NaiveDateTime::parse_from_str("2025-01-01 09:00:00", TS_FMT).unwrap();
        let late = NaiveDateTime::parse_from_str("2025-01-02 09:00:00", TS_FMT).unwrap();

        let mut b1 = sample_booking("b1", "BK20250101-001", "p1");
        b1.created_at = early;
        b1.updated_at = early;
        let mut b2 = sample_booking("b2", "BK20250102-001", "p1");
        b2.created_at = late;
        b2.updated_at = late;
        b2.status = BookingStatus::Confirmed;
        insert_booking(&conn, &b1).unwrap();
        insert_booking(&conn, &b2).unwrap();

        let all = list_bookings(&conn, None, 50).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "b2");

        let confirmed = list_bookings(&conn, Some(BookingStatus::Confirmed), 50).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, "b2");
    }

    #[test]
    fn test_update_fields_bumps_updated_at() {
        let conn = setup_db();
        seed_product(&conn, "p1");
        let mut booking = sample_booking("b1", "BK20250101-001", "p1");
        let old = NaiveDateTime::parse_from_str("2025-01-01 09:00:00", TS_FMT).unwrap();
        booking.updated_at = old;
        insert_booking(&conn, &booking).unwrap();

        let found = update_booking_fields(
            &conn,
            "b1",
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            Some("VIP"),
        )
        .unwrap();
        assert!(found);

        let loaded = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::Confirmed);
        assert_eq!(loaded.admin_memo.as_deref(), Some("VIP"));
        assert!(loaded.updated_at > old);
    }

    #[test]
    fn test_update_fields_rejects_stale_expected_status() {
        let conn = setup_db();
        seed_product(&conn, "p1");
        let mut booking = sample_booking("b1", "BK20250101-001", "p1");
        booking.status = BookingStatus::Completed;
        insert_booking(&conn, &booking).unwrap();

        // Caller validated its transition against a status another writer has
        // since moved on from; the guarded write must not land
        let updated = update_booking_fields(
            &conn,
            "b1",
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            None,
        )
        .unwrap();
        assert!(!updated);

        let loaded = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::Completed);
    }
}
