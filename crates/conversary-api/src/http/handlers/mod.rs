//! HTTP request handlers for the REST API.

pub mod conversation;
pub mod health;
pub mod summary;

use chrono::NaiveDate;

use crate::http::error::AppError;

/// Parse a `YYYY-MM-DD` path segment.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}
