//! Contextual response pipeline.
//!
//! One `respond` call: ensure the model is loaded, render the prompt from the
//! caller-supplied history window, run exactly one generation pass, strip the
//! echoed prompt. Errors from the runtime are propagated unchanged and never
//! retried here; the caller decides whether to retry the whole request.
//!
//! History is supplied per request by the caller (the conversation service
//! passes the current day's most recent exchanges). The pipeline keeps no
//! history of its own.

use std::sync::Arc;
use std::time::Instant;

use conversary_types::conversation::HistoryWindow;
use conversary_types::error::PipelineError;
use tracing::{debug, info, instrument};

use crate::prompt::PromptBuilder;
use crate::runtime::{InferenceBackend, ModelRuntime};
use crate::sanitizer::ResponseSanitizer;

pub struct ConversationPipeline<B: InferenceBackend> {
    runtime: Arc<ModelRuntime<B>>,
    prompts: PromptBuilder,
}

impl<B: InferenceBackend> ConversationPipeline<B> {
    pub fn new(runtime: Arc<ModelRuntime<B>>, prompts: PromptBuilder) -> Self {
        Self { runtime, prompts }
    }

    pub fn runtime(&self) -> &Arc<ModelRuntime<B>> {
        &self.runtime
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Produce a sanitized reply to `user_message` given `history`.
    #[instrument(skip_all, fields(history_len = history.len(), message_len = user_message.len()))]
    pub async fn respond(
        &self,
        user_message: &str,
        history: &HistoryWindow,
    ) -> Result<String, PipelineError> {
        self.runtime.ensure_loaded().await?;

        let prompt = self.prompts.render(user_message, history.exchanges());
        debug!(prompt_len = prompt.len(), "Prompt rendered");

        let start = Instant::now();
        let raw = self.runtime.generate(&prompt).await?;

        let reply = ResponseSanitizer::clean_generation(&prompt, &raw);
        info!(
            prompt_tokens = raw.prompt_tokens,
            completion_tokens = raw.completion_tokens,
            reply_len = reply.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Response generated"
        );

        Ok(reply)
    }
}
