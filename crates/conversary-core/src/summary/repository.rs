//! SummaryRepository trait definition.

use chrono::NaiveDate;
use conversary_types::conversation::{DailySummary, NewDailySummary};
use conversary_types::error::RepositoryError;

/// Repository trait for daily summaries. One summary per calendar day.
pub trait SummaryRepository: Send + Sync {
    /// Store a summary. Fails with [`RepositoryError::Conflict`] when the day
    /// already has one.
    fn create(
        &self,
        summary: &NewDailySummary,
    ) -> impl std::future::Future<Output = Result<DailySummary, RepositoryError>> + Send;

    fn get_by_date(
        &self,
        date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Option<DailySummary>, RepositoryError>> + Send;
}
