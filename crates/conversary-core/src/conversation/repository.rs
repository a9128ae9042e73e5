//! ConversationRepository trait definition.
//!
//! Append-only store of completed exchanges, queried by calendar day.

use chrono::NaiveDate;
use conversary_types::conversation::{ConversationEntry, NewConversationEntry};
use conversary_types::error::RepositoryError;

/// Repository trait for conversation entry persistence.
///
/// Implementations live in conversary-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ConversationRepository: Send + Sync {
    /// Append an entry and return it with its assigned id.
    fn save(
        &self,
        entry: &NewConversationEntry,
    ) -> impl std::future::Future<Output = Result<ConversationEntry, RepositoryError>> + Send;

    /// The `limit` most recent entries for `date`, ordered oldest to newest.
    fn recent_for_date(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationEntry>, RepositoryError>> + Send;

    /// All entries for `date`, ordered by id ascending.
    fn list_for_date(
        &self,
        date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationEntry>, RepositoryError>> + Send;

    /// Every stored entry, ordered by id ascending.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationEntry>, RepositoryError>> + Send;
}
