//! SQLite daily summary repository implementation.

use chrono::NaiveDate;
use conversary_core::summary::repository::SummaryRepository;
use conversary_types::conversation::{DailySummary, NewDailySummary};
use conversary_types::error::RepositoryError;
use sqlx::Row;

use super::conversation::{format_date, format_datetime, parse_date, parse_datetime};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SummaryRepository`.
pub struct SqliteSummaryRepository {
    pool: DatabasePool,
}

impl SqliteSummaryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct DailySummaryRow {
    id: i64,
    date: String,
    summary_text: String,
    sentiment_score: Option<f64>,
    notes: Option<String>,
    created_at: String,
}

impl DailySummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            date: row.try_get("date")?,
            summary_text: row.try_get("summary_text")?,
            sentiment_score: row.try_get("sentiment_score")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_summary(self) -> Result<DailySummary, RepositoryError> {
        Ok(DailySummary {
            id: self.id,
            date: parse_date(&self.date)?,
            summary_text: self.summary_text,
            sentiment_score: self.sentiment_score,
            notes: self.notes,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl SummaryRepository for SqliteSummaryRepository {
    async fn create(&self, summary: &NewDailySummary) -> Result<DailySummary, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO daily_summaries (date, summary_text, sentiment_score, notes, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(format_date(&summary.date))
        .bind(&summary.summary_text)
        .bind(summary.sentiment_score)
        .bind(&summary.notes)
        .bind(format_datetime(&summary.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(result) => Ok(DailySummary {
                id: result.last_insert_rowid(),
                date: summary.date,
                summary_text: summary.summary_text.clone(),
                sentiment_score: summary.sentiment_score,
                notes: summary.notes.clone(),
                created_at: summary.created_at,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("summary for {} already exists", summary.date)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailySummary>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM daily_summaries WHERE date = ?")
            .bind(format_date(&date))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let summary_row = DailySummaryRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(summary_row.into_summary()?))
            }
            None => Ok(None),
        }
    }
}
