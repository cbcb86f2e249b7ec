//! Shared helpers for Diesel repository implementations.
//!
//! Every repository reports failures as [`PersistenceError`], so pool and
//! Diesel errors are mapped here once. Row conversion helpers translate the
//! signed integer columns PostgreSQL offers into the unsigned domain types.

use std::str::FromStr;

use tracing::{debug, warn};

use crate::domain::ports::PersistenceError;

use super::pool::PoolError;

/// Map pool errors to connection failures.
pub fn map_pool_error(error: PoolError) -> PersistenceError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            PersistenceError::connection(message)
        }
    }
}

/// Map Diesel errors to persistence errors.
///
/// Unique violations become [`PersistenceError::Conflict`] carrying the
/// constraint name so adapters can phrase a domain message.
pub fn map_diesel_error(error: diesel::result::Error) -> PersistenceError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => PersistenceError::query("record not found"),
        DieselError::QueryBuilderError(_) => PersistenceError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            PersistenceError::conflict(info.constraint_name().unwrap_or("unique constraint"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            warn!(
                constraint_name = ?info.constraint_name(),
                "foreign key violation reached the persistence layer"
            );
            PersistenceError::query("referenced record does not exist")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            PersistenceError::connection("database connection error")
        }
        _ => PersistenceError::query("database error"),
    }
}

/// Replace the constraint name of a conflict with a domain message.
pub fn with_conflict_message(error: PersistenceError, message: &str) -> PersistenceError {
    match error {
        PersistenceError::Conflict { .. } => PersistenceError::conflict(message),
        other => other,
    }
}

/// Parse a stored enumeration column.
pub fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T, PersistenceError> {
    value
        .parse()
        .map_err(|_| PersistenceError::query(format!("unrecognised {column} value: {value}")))
}

/// Convert a non-negative integer column to its domain type.
pub fn to_u32(value: i32, column: &str) -> Result<u32, PersistenceError> {
    u32::try_from(value)
        .map_err(|_| PersistenceError::query(format!("negative {column} value: {value}")))
}

/// Convert a domain count to an integer column.
pub fn to_i32(value: u32, column: &str) -> Result<i32, PersistenceError> {
    i32::try_from(value)
        .map_err(|_| PersistenceError::query(format!("{column} value too large: {value}")))
}

/// Convert a `COUNT(*)` result.
pub fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Collect row conversion results, stopping at the first failure.
pub fn collect_rows<T>(
    results: impl Iterator<Item = Result<T, PersistenceError>>,
) -> Result<Vec<T>, PersistenceError> {
    results.collect()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::AppointmentStatus;
    use rstest::rstest;

    #[rstest]
    fn pool_errors_are_connection_failures() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, PersistenceError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn not_found_is_a_query_failure() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert_eq!(err, PersistenceError::query("record not found"));
    }

    #[rstest]
    fn conflicts_take_the_domain_message() {
        let err = with_conflict_message(
            PersistenceError::conflict("users_email_key"),
            "email already registered",
        );
        assert_eq!(err, PersistenceError::conflict("email already registered"));
        let untouched = with_conflict_message(PersistenceError::query("boom"), "ignored");
        assert_eq!(untouched, PersistenceError::query("boom"));
    }

    #[rstest]
    #[case("scheduled", Some(AppointmentStatus::Scheduled))]
    #[case("no_show", Some(AppointmentStatus::NoShow))]
    #[case("SCHEDULED?", None)]
    fn enum_columns_parse(#[case] raw: &str, #[case] expected: Option<AppointmentStatus>) {
        assert_eq!(parse_column::<AppointmentStatus>(raw, "status").ok(), expected);
    }

    #[rstest]
    fn integer_columns_reject_negatives() {
        assert_eq!(to_u32(3, "quantity").ok(), Some(3));
        assert!(to_u32(-1, "quantity").is_err());
        assert!(to_i32(u32::MAX, "quantity").is_err());
        assert_eq!(to_count(-5), 0);
    }
}
