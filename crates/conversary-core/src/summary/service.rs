//! Summary service: validation around the summary repository.

use chrono::{Local, NaiveDate, Utc};
use conversary_types::conversation::{DailySummary, NewDailySummary};
use conversary_types::error::{ConversationError, RepositoryError};
use tracing::info;

use crate::summary::repository::SummaryRepository;

pub struct SummaryService<S: SummaryRepository> {
    repo: S,
}

impl<S: SummaryRepository> SummaryService<S> {
    pub fn new(repo: S) -> Self {
        Self { repo }
    }

    /// Store today's summary.
    pub async fn create(
        &self,
        summary_text: &str,
        sentiment_score: Option<f64>,
        notes: Option<String>,
    ) -> Result<DailySummary, ConversationError> {
        self.create_on(Local::now().date_naive(), summary_text, sentiment_score, notes)
            .await
    }

    /// Store the summary for `date`. Fails with a repository conflict when
    /// that day already has one.
    pub async fn create_on(
        &self,
        date: NaiveDate,
        summary_text: &str,
        sentiment_score: Option<f64>,
        notes: Option<String>,
    ) -> Result<DailySummary, ConversationError> {
        if summary_text.trim().is_empty() {
            return Err(ConversationError::InvalidInput(
                "summary_text must not be empty".to_string(),
            ));
        }
        if let Some(score) = sentiment_score {
            if !score.is_finite() {
                return Err(ConversationError::InvalidInput(
                    "sentiment_score must be a finite number".to_string(),
                ));
            }
        }

        let summary = self
            .repo
            .create(&NewDailySummary {
                date,
                summary_text: summary_text.to_string(),
                sentiment_score,
                notes: notes.filter(|n| !n.trim().is_empty()),
                created_at: Utc::now(),
            })
            .await?;

        info!(summary_id = summary.id, date = %summary.date, "Daily summary created");
        Ok(summary)
    }

    /// The summary for `date`, or [`RepositoryError::NotFound`].
    pub async fn for_date(&self, date: NaiveDate) -> Result<DailySummary, RepositoryError> {
        self.repo
            .get_by_date(date)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemorySummaryRepository;

    fn service() -> SummaryService<InMemorySummaryRepository> {
        SummaryService::new(InMemorySummaryRepository::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let service = service();
        let created = service
            .create_on(day(1), "A calm day.", Some(0.6), Some("walked".to_string()))
            .await
            .unwrap();

        let fetched = service.for_date(day(1)).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.sentiment_score, Some(0.6));
        assert_eq!(fetched.notes.as_deref(), Some("walked"));
    }

    #[tokio::test]
    async fn test_second_summary_for_same_day_conflicts() {
        let service = service();
        service.create_on(day(2), "first", None, None).await.unwrap();

        let err = service.create_on(day(2), "second", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Repository(RepositoryError::Conflict(_))
        ));
        assert_eq!(service.for_date(day(2)).await.unwrap().summary_text, "first");
    }

    #[tokio::test]
    async fn test_missing_summary_is_not_found() {
        let err = service().for_date(day(3)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_rejects_non_finite_sentiment_and_empty_text() {
        let service = service();

        let err = service
            .create_on(day(4), "ok", Some(f64::NAN), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::InvalidInput(_)));

        let err = service.create_on(day(4), "  ", None, None).await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidInput(_)));

        assert!(service.for_date(day(4)).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_notes_are_dropped() {
        let summary = service()
            .create_on(day(5), "fine", None, Some("   ".to_string()))
            .await
            .unwrap();
        assert_eq!(summary.notes, None);
    }
}
