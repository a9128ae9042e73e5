//! SQLite conversation repository implementation.
//!
//! Raw queries, a private row struct for mapping, reads on the reader pool
//! and inserts on the writer pool.

use chrono::{DateTime, NaiveDate, Utc};
use conversary_core::conversation::repository::ConversationRepository;
use conversary_types::conversation::{ConversationEntry, NewConversationEntry};
use conversary_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ConversationEntryRow {
    id: i64,
    date: String,
    user_message: String,
    ai_response: String,
    created_at: String,
}

impl ConversationEntryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            date: row.try_get("date")?,
            user_message: row.try_get("user_message")?,
            ai_response: row.try_get("ai_response")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_entry(self) -> Result<ConversationEntry, RepositoryError> {
        Ok(ConversationEntry {
            id: self.id,
            date: parse_date(&self.date)?,
            user_message: self.user_message,
            ai_response: self.ai_response,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| RepositoryError::Query(format!("invalid date '{s}': {e}")))
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ConversationEntry>, RepositoryError> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let entry_row = ConversationEntryRow::from_row(row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        entries.push(entry_row.into_entry()?);
    }
    Ok(entries)
}

impl ConversationRepository for SqliteConversationRepository {
    async fn save(&self, entry: &NewConversationEntry) -> Result<ConversationEntry, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO conversation_entries (date, user_message, ai_response, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(format_date(&entry.date))
        .bind(&entry.user_message)
        .bind(&entry.ai_response)
        .bind(format_datetime(&entry.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(ConversationEntry {
            id: result.last_insert_rowid(),
            date: entry.date,
            user_message: entry.user_message.clone(),
            ai_response: entry.ai_response.clone(),
            created_at: entry.created_at,
        })
    }

    async fn recent_for_date(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_entries WHERE date = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(format_date(&date))
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut entries = map_rows(&rows)?;
        entries.reverse();
        Ok(entries)
    }

    async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<ConversationEntry>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM conversation_entries WHERE date = ? ORDER BY id ASC")
            .bind(format_date(&date))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }

    async fn list_all(&self) -> Result<Vec<ConversationEntry>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM conversation_entries ORDER BY id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> SqliteConversationRepository {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        SqliteConversationRepository::new(pool)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn new_entry(date: NaiveDate, n: usize) -> NewConversationEntry {
        NewConversationEntry {
            date,
            user_message: format!("user {n}"),
            ai_response: format!("ai {n}"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_assigns_increasing_ids() {
        let repo = test_repo().await;
        let first = repo.save(&new_entry(day(1), 0)).await.unwrap();
        let second = repo.save(&new_entry(day(1), 1)).await.unwrap();
        assert!(second.id > first.id);

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_message, "user 0");
        assert_eq!(all[1].ai_response, "ai 1");
        assert_eq!(all[0].date, day(1));
    }

    #[tokio::test]
    async fn test_recent_for_date_returns_tail_oldest_first() {
        let repo = test_repo().await;
        for n in 0..12 {
            repo.save(&new_entry(day(2), n)).await.unwrap();
        }
        repo.save(&new_entry(day(3), 99)).await.unwrap();

        let recent = repo.recent_for_date(day(2), 10).await.unwrap();
        let messages: Vec<&str> = recent.iter().map(|e| e.user_message.as_str()).collect();
        assert_eq!(messages.len(), 10);
        assert_eq!(messages.first(), Some(&"user 2"));
        assert_eq!(messages.last(), Some(&"user 11"));
    }

    #[tokio::test]
    async fn test_list_for_date_filters_by_day() {
        let repo = test_repo().await;
        repo.save(&new_entry(day(4), 0)).await.unwrap();
        repo.save(&new_entry(day(5), 1)).await.unwrap();
        repo.save(&new_entry(day(4), 2)).await.unwrap();

        let entries = repo.list_for_date(day(4)).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.date == day(4)));
        assert!(repo.list_for_date(day(6)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_is_stored_verbatim() {
        let repo = test_repo().await;
        let mut entry = new_entry(day(7), 0);
        entry.user_message = "{{ user_message }} 'quoted' \"double\" \n newline 🙂".to_string();
        repo.save(&entry).await.unwrap();

        let stored = repo.list_for_date(day(7)).await.unwrap();
        assert_eq!(stored[0].user_message, entry.user_message);
    }
}
