//! Query parameter parsing.
//!
//! Query strings are taken as text and parsed here so that a malformed value
//! is answered with the same JSON error body as every other failure.

use chrono::NaiveDate;
use obrafin_core::normalize::MonthKey;

use crate::error::ApiError;

/// Parses a comma separated id list such as `1,2, 7`.
///
/// # Errors
///
/// Returns a validation error for an empty list or a non-numeric id.
pub fn project_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| ApiError::validation(format!("Invalid project id: {part}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ApiError::validation("At least one project must be selected"));
    }
    Ok(ids)
}

/// Parses an integer id such as a project id.
///
/// # Errors
///
/// Returns a validation error naming `field` if the value is not an integer.
pub fn id(field: &str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::validation(format!("Invalid {field}: {raw}")))
}

/// Parses an optional count of months; blank reads as absent.
///
/// # Errors
///
/// Returns a validation error if the value is not a non-negative integer.
pub fn opt_months(raw: Option<&str>) -> Result<Option<u32>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ApiError::validation(format!("Invalid months: {value}"))),
    }
}

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns a validation error naming `field` if the value is not a date.
pub fn date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("Invalid {field}: expected YYYY-MM-DD")))
}

/// Parses an optional `YYYY-MM-DD` date; blank reads as absent.
///
/// # Errors
///
/// Returns a validation error naming `field` if the value is not a date.
pub fn opt_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => date(field, value).map(Some),
    }
}

/// Parses a `Mon-YY` month key.
///
/// # Errors
///
/// Returns a validation error if the token is not a month key.
pub fn month(raw: &str) -> Result<MonthKey, ApiError> {
    raw.parse::<MonthKey>()
        .map_err(|err| ApiError::validation(err.to_string()))
}
