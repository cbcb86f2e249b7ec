//! Shared validation helpers for inbound HTTP adapters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pagination::{PageBounds, PageRequest, PaginationError};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{Email, Error, FullName, UserId};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidUuid,
    InvalidTimestamp,
    InvalidEmail,
    InvalidValue,
    OutOfRange,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidTimestamp => "invalid_timestamp",
            ErrorCode::InvalidEmail => "invalid_email",
            ErrorCode::InvalidValue => "invalid_value",
            ErrorCode::OutOfRange => "out_of_range",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(&self) -> &str {
        self.0
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn invalid_uuid_error(field: FieldName, value: &str) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("{field} must be a valid UUID"))
        .with_value(ErrorCode::InvalidUuid, value)
}

pub(crate) fn parse_uuid(value: &str, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(value.trim()).map_err(|_| invalid_uuid_error(field, value))
}

pub(crate) fn parse_user_id(value: &str, field: FieldName) -> Result<UserId, Error> {
    parse_uuid(value, field).map(UserId::from_uuid)
}

pub(crate) fn parse_optional_uuid(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<Uuid>, Error> {
    value.map(|raw| parse_uuid(raw, field)).transpose()
}

pub(crate) fn invalid_timestamp_error(field: FieldName, value: &str) -> Error {
    let field = field.as_str();
    ValidationError::new(field, format!("{field} must be an RFC 3339 timestamp"))
        .with_value(ErrorCode::InvalidTimestamp, value)
}

pub(crate) fn parse_rfc3339_timestamp(
    value: &str,
    field: FieldName,
) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|_| invalid_timestamp_error(field, value))
}

pub(crate) fn parse_optional_rfc3339_timestamp(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<DateTime<Utc>>, Error> {
    value
        .map(|raw| parse_rfc3339_timestamp(raw, field))
        .transpose()
}

pub(crate) fn parse_email(value: &str, field: FieldName) -> Result<Email, Error> {
    Email::parse(value).map_err(|err| {
        ValidationError::new(field.as_str(), err.to_string()).with_code(ErrorCode::InvalidEmail)
    })
}

pub(crate) fn parse_full_name(value: &str, field: FieldName) -> Result<FullName, Error> {
    FullName::new(value).map_err(|err| {
        ValidationError::new(field.as_str(), err.to_string()).with_code(ErrorCode::InvalidValue)
    })
}

/// Parse a named enum value such as a role or status.
pub(crate) fn parse_choice<T>(value: &str, field: FieldName) -> Result<T, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|err| {
        ValidationError::new(field.as_str(), err.to_string())
            .with_value(ErrorCode::InvalidValue, value)
    })
}

pub(crate) fn parse_optional_choice<T>(
    value: Option<&str>,
    field: FieldName,
) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.map(|raw| parse_choice(raw, field)).transpose()
}

/// Reject values outside `min..=max` characters.
pub(crate) fn check_length(
    value: &str,
    field: FieldName,
    min: usize,
    max: usize,
) -> Result<(), Error> {
    let length = value.chars().count();
    if (min..=max).contains(&length) {
        return Ok(());
    }
    let field = field.as_str();
    Err(Error::invalid_request(format!(
        "{field} must be between {min} and {max} characters"
    ))
    .with_details(json!({
        "field": field,
        "min": min,
        "max": max,
        "length": length,
        "code": ErrorCode::OutOfRange.as_str(),
    })))
}

pub(crate) fn check_optional_max(
    value: Option<&String>,
    field: FieldName,
    max: usize,
) -> Result<(), Error> {
    match value {
        Some(value) => check_length(value, field, 0, max),
        None => Ok(()),
    }
}

/// Resolve `skip`/`limit` query parameters against `bounds`.
pub(crate) fn page_request(
    skip: Option<u32>,
    limit: Option<u32>,
    bounds: PageBounds,
) -> Result<PageRequest, Error> {
    PageRequest::from_query(skip, limit, bounds).map_err(|err| {
        let max = match err {
            PaginationError::LimitTooLarge { max } => max,
            _ => bounds.max_limit(),
        };
        Error::invalid_request(err.to_string()).with_details(json!({
            "field": "limit",
            "min": 1,
            "max": max,
            "code": ErrorCode::OutOfRange.as_str(),
        }))
    })
}

/// Resolve a bare `limit` parameter used by non-paged listings.
pub(crate) fn bounded_limit(limit: Option<u32>, bounds: PageBounds) -> Result<u32, Error> {
    page_request(None, limit, bounds).map(|page| page.limit())
}
