//! In-process fakes for exercising the runtime, pipeline, and services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use conversary_types::conversation::{
    ConversationEntry, DailySummary, NewConversationEntry, NewDailySummary,
};
use conversary_types::error::{GenerationError, ModelLoadError, RepositoryError};
use conversary_types::model::{ComputeDevice, EngineKind, RawGeneration};

use crate::conversation::repository::ConversationRepository;
use crate::runtime::{InferenceBackend, InferenceEngine, RuntimeSettings};
use crate::summary::repository::SummaryRepository;

pub fn settings() -> RuntimeSettings {
    RuntimeSettings {
        model_id: "fake-model".to_string(),
        engine: EngineKind::LlamaServer,
        max_new_tokens: 100,
    }
}

/// Counters shared between a [`FakeBackend`], its engines, and the test.
#[derive(Default)]
pub struct Counters {
    loads: AtomicUsize,
    generations: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    token_limits: Mutex<Vec<u32>>,
}

impl Counters {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn token_limits(&self) -> Vec<u32> {
        self.token_limits.lock().unwrap().clone()
    }
}

#[derive(Clone)]
enum ReplyMode {
    /// Return the prompt followed by the reply, like a full-sequence decoder.
    Echo(String),
    /// Return only the given text.
    Plain(String),
}

#[derive(Clone)]
pub struct FakeBackend {
    mode: ReplyMode,
    load_delay: Duration,
    generate_delay: Duration,
    failing_loads: Arc<AtomicUsize>,
    fail_generations: bool,
    counters: Arc<Counters>,
}

impl FakeBackend {
    pub fn echoing() -> Self {
        Self {
            mode: ReplyMode::Echo("ok".to_string()),
            load_delay: Duration::ZERO,
            generate_delay: Duration::ZERO,
            failing_loads: Arc::new(AtomicUsize::new(0)),
            fail_generations: false,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn replying_without_echo(text: &str) -> Self {
        Self {
            mode: ReplyMode::Plain(text.to_string()),
            ..Self::echoing()
        }
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.mode = ReplyMode::Echo(reply.to_string());
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    /// The first `n` loads fail with `WeightsUnavailable`.
    pub fn failing_loads(self, n: usize) -> Self {
        self.failing_loads.store(n, Ordering::SeqCst);
        self
    }

    /// Every generation fails with `OutOfMemory`.
    pub fn failing_generations(mut self) -> Self {
        self.fail_generations = true;
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

impl InferenceBackend for FakeBackend {
    type Engine = FakeEngine;

    async fn load(&self) -> Result<FakeEngine, ModelLoadError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        let should_fail = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ModelLoadError::WeightsUnavailable(
                "fake weights missing".to_string(),
            ));
        }

        Ok(FakeEngine {
            device: ComputeDevice::cpu(),
            mode: self.mode.clone(),
            generate_delay: self.generate_delay,
            fail: self.fail_generations,
            counters: Arc::clone(&self.counters),
        })
    }
}

pub struct FakeEngine {
    device: ComputeDevice,
    mode: ReplyMode,
    generate_delay: Duration,
    fail: bool,
    counters: Arc<Counters>,
}

impl InferenceEngine for FakeEngine {
    fn device(&self) -> &ComputeDevice {
        &self.device
    }

    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<RawGeneration, GenerationError> {
        let counters = &self.counters;
        counters.generations.fetch_add(1, Ordering::SeqCst);
        counters.prompts.lock().unwrap().push(prompt.to_string());
        counters.token_limits.lock().unwrap().push(max_new_tokens);

        let current = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.generate_delay.is_zero() {
            tokio::time::sleep(self.generate_delay).await;
        }
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(GenerationError::OutOfMemory("fake allocation failure".to_string()));
        }

        let text = match &self.mode {
            ReplyMode::Echo(reply) => format!("{prompt} {reply}"),
            ReplyMode::Plain(text) => text.clone(),
        };
        Ok(RawGeneration::text(text))
    }
}

/// Vec-backed conversation store with store-assigned ids.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    entries: Mutex<Vec<ConversationEntry>>,
}

impl ConversationRepository for InMemoryConversationRepository {
    async fn save(&self, entry: &NewConversationEntry) -> Result<ConversationEntry, RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        let stored = ConversationEntry {
            id: entries.len() as i64 + 1,
            date: entry.date,
            user_message: entry.user_message.clone(),
            ai_response: entry.ai_response.clone(),
            created_at: entry.created_at,
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn recent_for_date(
        &self,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>, RepositoryError> {
        let for_date = self.list_for_date(date).await?;
        let skip = for_date.len().saturating_sub(limit);
        Ok(for_date.into_iter().skip(skip).collect())
    }

    async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<ConversationEntry>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.date == date)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ConversationEntry>, RepositoryError> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct InMemorySummaryRepository {
    summaries: Mutex<Vec<DailySummary>>,
}

impl SummaryRepository for InMemorySummaryRepository {
    async fn create(&self, summary: &NewDailySummary) -> Result<DailySummary, RepositoryError> {
        let mut summaries = self.summaries.lock().unwrap();
        if summaries.iter().any(|s| s.date == summary.date) {
            return Err(RepositoryError::Conflict(format!(
                "summary for {} already exists",
                summary.date
            )));
        }
        let stored = DailySummary {
            id: summaries.len() as i64 + 1,
            date: summary.date,
            summary_text: summary.summary_text.clone(),
            sentiment_score: summary.sentiment_score,
            notes: summary.notes.clone(),
            created_at: summary.created_at,
        };
        summaries.push(stored.clone());
        Ok(stored)
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailySummary>, RepositoryError> {
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.date == date)
            .cloned())
    }
}
