use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;

/// Highest sequence that still fits the three-digit slot of the number format.
const MAX_SEQUENCE: i64 = 999;

/// Allocate the next booking number for `date`: `BK{YYYYMMDD}-{NNN}`.
///
/// Must be called inside the transaction that also inserts the booking. The
/// per-date counter lives in the database and is bumped with a single upsert,
/// which keeps allocation safe across concurrent writers and across multiple
/// service instances; counting existing rows and adding one would hand the
/// same number to two racing requests. Rollback of the enclosing transaction
/// also rolls back the counter, so failed creations burn no numbers.
pub fn allocate(conn: &Connection, date: NaiveDate) -> Result<String, AppError> {
    let date_key = date.format("%Y%m%d").to_string();
    let seq = queries::next_sequence(conn, &date_key)?;

    if seq > MAX_SEQUENCE {
        tracing::warn!(date = %date_key, seq, "daily booking number space exhausted");
        return Err(AppError::AllocationExhausted);
    }

    Ok(format!("BK{date_key}-{seq:03}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_first_allocation_of_day_is_001() {
        let conn = db::init_db(":memory:").unwrap();
        let number = allocate(&conn, date("2025-06-15")).unwrap();
        assert_eq!(number, "BK20250615-001");
    }

    #[test]
    fn test_allocations_are_sequential_and_zero_padded() {
        let conn = db::init_db(":memory:").unwrap();
        let d = date("2025-06-15");
        for expected in ["BK20250615-001", "BK20250615-002", "BK20250615-003"] {
            assert_eq!(allocate(&conn, d).unwrap(), expected);
        }
    }

    #[test]
    fn test_date_rollover_restarts_sequence() {
        let conn = db::init_db(":memory:").unwrap();
        allocate(&conn, date("2025-06-15")).unwrap();
        allocate(&conn, date("2025-06-15")).unwrap();
        let number = allocate(&conn, date("2025-06-16")).unwrap();
        assert_eq!(number, "BK20250616-001");
    }

    #[test]
    fn test_exhaustion_past_999() {
        let conn = db::init_db(":memory:").unwrap();
        let d = date("2025-06-15");
        // Pre-load the counter to the ceiling instead of looping 999 inserts
        conn.execute(
            "INSERT INTO booking_sequences (date, seq) VALUES ('20250615', 999)",
            [],
        )
        .unwrap();
        let err = allocate(&conn, d).unwrap_err();
        assert!(matches!(err, AppError::AllocationExhausted));
    }

    #[test]
    fn test_rollback_returns_sequence() {
        let mut conn = db::init_db(":memory:").unwrap();
        let d = date("2025-06-15");

        let tx = conn.transaction().unwrap();
        assert_eq!(allocate(&tx, d).unwrap(), "BK20250615-001");
        tx.rollback().unwrap();

        // Aborted creation must not burn the number
        assert_eq!(allocate(&conn, d).unwrap(), "BK20250615-001");
    }
}
