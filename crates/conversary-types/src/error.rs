use thiserror::Error;

/// The model could not be made ready for generation.
///
/// Unrecoverable for the current attempt: the runtime stays unloaded and a
/// later `ensure_loaded` may try again once the cause is fixed.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model weights unavailable: {0}")]
    WeightsUnavailable(String),

    #[error("incompatible model format: {0}")]
    IncompatibleFormat(String),

    #[error("checksum mismatch: expected '{expected}', got '{actual}'")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("out of memory while loading model: {0}")]
    OutOfMemory(String),

    #[error("compute device error: {0}")]
    Device(String),

    #[error("inference backend failed to start: {0}")]
    Backend(String),
}

/// A single generation pass failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model is not loaded")]
    NotLoaded,

    #[error("out of memory during generation: {0}")]
    OutOfMemory(String),

    #[error("prompt of {prompt_tokens} tokens exceeds context window of {context_size}")]
    ContextOverflow { prompt_tokens: u32, context_size: u32 },

    #[error("inference backend error: {0}")]
    Backend(String),
}

/// A prompt template cannot be compiled.
///
/// Raised once at startup when templates are loaded, never per request.
#[derive(Debug, Error)]
pub enum PromptRenderError {
    #[error("{template} template has no '{placeholder}' placeholder")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("{template} template has {count} '{placeholder}' placeholders, expected exactly one")]
    DuplicatePlaceholder {
        template: &'static str,
        placeholder: &'static str,
        count: usize,
    },

    #[error("failed to read {template} template: {message}")]
    Unreadable {
        template: &'static str,
        message: String,
    },
}

/// Errors surfaced by `ConversationPipeline::respond`.
///
/// Wraps runtime errors unchanged so callers can map each kind separately.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Errors from repository operations (used by trait definitions in conversary-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the conversation and summary services.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
