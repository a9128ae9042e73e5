//! Conversation service: the caller side of the response pipeline.
//!
//! Retrieves the day's most recent exchanges, hands them to the pipeline as
//! the history window, and appends the completed exchange to the store.
//! History is scoped to the local calendar day of the request.

use chrono::{Local, NaiveDate, Utc};
use conversary_types::conversation::{
    ConversationEntry, HISTORY_WINDOW_SIZE, HistoryWindow, NewConversationEntry,
};
use conversary_types::error::{ConversationError, RepositoryError};
use tracing::info;

use crate::conversation::repository::ConversationRepository;
use crate::pipeline::ConversationPipeline;
use crate::runtime::InferenceBackend;

/// Orchestrates history retrieval, response generation, and persistence.
///
/// Generic over `ConversationRepository` and `InferenceBackend` to maintain
/// clean architecture (conversary-core never depends on conversary-infra).
pub struct ConversationService<C: ConversationRepository, B: InferenceBackend> {
    repo: C,
    pipeline: ConversationPipeline<B>,
}

impl<C: ConversationRepository, B: InferenceBackend> ConversationService<C, B> {
    pub fn new(repo: C, pipeline: ConversationPipeline<B>) -> Self {
        Self { repo, pipeline }
    }

    pub fn repo(&self) -> &C {
        &self.repo
    }

    pub fn pipeline(&self) -> &ConversationPipeline<B> {
        &self.pipeline
    }

    /// Send a message as part of today's conversation.
    pub async fn send(&self, user_message: &str) -> Result<ConversationEntry, ConversationError> {
        self.send_on(Local::now().date_naive(), user_message).await
    }

    /// Send a message as part of the conversation for `date`.
    ///
    /// Only exchanges from `date` are used as context. Nothing is persisted
    /// when generation fails.
    pub async fn send_on(
        &self,
        date: NaiveDate,
        user_message: &str,
    ) -> Result<ConversationEntry, ConversationError> {
        if user_message.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let history = self.history_for(date).await?;
        let ai_response = self.pipeline.respond(user_message, &history).await?;

        let entry = self
            .repo
            .save(&NewConversationEntry {
                date,
                user_message: user_message.to_string(),
                ai_response,
                created_at: Utc::now(),
            })
            .await?;

        info!(entry_id = entry.id, date = %entry.date, "Conversation entry saved");
        Ok(entry)
    }

    /// The history window for `date`: its most recent exchanges, oldest first.
    pub async fn history_for(&self, date: NaiveDate) -> Result<HistoryWindow, RepositoryError> {
        let recent = self.repo.recent_for_date(date, HISTORY_WINDOW_SIZE).await?;
        Ok(recent.iter().map(ConversationEntry::to_exchange).collect())
    }

    pub async fn entries_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ConversationEntry>, RepositoryError> {
        self.repo.list_for_date(date).await
    }

    pub async fn all_entries(&self) -> Result<Vec<ConversationEntry>, RepositoryError> {
        self.repo.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{PromptBuilder, PromptTemplates};
    use crate::runtime::ModelRuntime;
    use crate::testing::{FakeBackend, InMemoryConversationRepository, settings};
    use conversary_types::error::{GenerationError, PipelineError};
    use std::sync::Arc;

    fn service(
        backend: FakeBackend,
    ) -> ConversationService<InMemoryConversationRepository, FakeBackend> {
        let runtime = Arc::new(ModelRuntime::new(backend, settings()));
        let templates =
            PromptTemplates::compile("You are helpful.", "User: {{ user_message }}\nAI:").unwrap();
        let pipeline = ConversationPipeline::new(runtime, PromptBuilder::new(templates));
        ConversationService::new(InMemoryConversationRepository::default(), pipeline)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_send_persists_exchange() {
        let service = service(FakeBackend::echoing().with_reply("Nice to meet you."));

        let entry = service.send_on(day(1), "My name is Johnson").await.unwrap();
        assert_eq!(entry.user_message, "My name is Johnson");
        assert_eq!(entry.ai_response, "Nice to meet you.");
        assert_eq!(entry.date, day(1));

        let stored = service.entries_for_date(day(1)).await.unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[tokio::test]
    async fn test_history_is_scoped_to_the_day() {
        let backend = FakeBackend::echoing();
        let counters = backend.counters();
        let service = service(backend);

        service.send_on(day(1), "yesterday's note").await.unwrap();
        service.send_on(day(2), "My name is Johnson").await.unwrap();
        service.send_on(day(2), "What is my name?").await.unwrap();

        let prompts = counters.prompts();
        let last = prompts.last().unwrap();
        assert!(last.contains("User: My name is Johnson"));
        assert!(!last.contains("yesterday's note"));
    }

    #[tokio::test]
    async fn test_history_window_holds_latest_ten_oldest_first() {
        let service = service(FakeBackend::echoing());
        for i in 0..13 {
            service.send_on(day(3), &format!("message {i}")).await.unwrap();
        }

        let window = service.history_for(day(3)).await.unwrap();
        assert_eq!(window.len(), HISTORY_WINDOW_SIZE);
        assert_eq!(window.exchanges()[0].user_text(), "message 3");
        assert_eq!(window.exchanges()[9].user_text(), "message 12");
    }

    #[tokio::test]
    async fn test_failed_generation_persists_nothing() {
        let service = service(FakeBackend::echoing().failing_generations());

        let err = service.send_on(day(4), "hello").await.unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Pipeline(PipelineError::Generation(GenerationError::OutOfMemory(_)))
        ));
        assert!(service.all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_generation() {
        let backend = FakeBackend::echoing();
        let counters = backend.counters();
        let service = service(backend);

        let err = service.send_on(day(5), "   ").await.unwrap_err();
        assert!(matches!(err, ConversationError::EmptyMessage));
        assert_eq!(counters.loads(), 0);
    }
}
