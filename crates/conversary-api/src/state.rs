//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository and inference traits, but AppState
//! pins them to the concrete infra implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use conversary_core::conversation::ConversationService;
use conversary_core::pipeline::ConversationPipeline;
use conversary_core::prompt::PromptBuilder;
use conversary_core::runtime::{ModelRuntime, RuntimeSettings};
use conversary_core::summary::SummaryService;
use conversary_infra::config::{ensure_data_dirs, load_app_config, resolve_data_dir};
use conversary_infra::llm::LocalBackend;
use conversary_infra::sqlite::{DatabasePool, SqliteConversationRepository, SqliteSummaryRepository};
use conversary_infra::templates::load_prompt_templates;
use conversary_types::config::AppConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteConversationService =
    ConversationService<SqliteConversationRepository, LocalBackend>;

pub type ConcreteSummaryService = SummaryService<SqliteSummaryRepository>;

pub type ConcreteRuntime = ModelRuntime<LocalBackend>;

/// Shared application state holding all services.
///
/// The model runtime is created once here and shared: the conversation
/// pipeline holds one handle, health reporting and the CLI hold another.
#[derive(Clone)]
pub struct AppState {
    pub conversation_service: Arc<ConcreteConversationService>,
    pub summary_service: Arc<ConcreteSummaryService>,
    pub runtime: Arc<ConcreteRuntime>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state from the resolved data directory.
    pub async fn init(show_progress: bool) -> anyhow::Result<Self> {
        Self::init_in(resolve_data_dir(), show_progress).await
    }

    /// Initialize against an explicit data directory: create its layout,
    /// read `config.toml`, then wire services.
    pub async fn init_in(data_dir: PathBuf, show_progress: bool) -> anyhow::Result<Self> {
        ensure_data_dirs(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        let config = load_app_config(&data_dir).await;
        Self::build(data_dir, config, show_progress).await
    }

    /// Wire services from an already loaded config. The model is not loaded
    /// here; the runtime loads it on first use.
    pub async fn build(
        data_dir: PathBuf,
        config: AppConfig,
        show_progress: bool,
    ) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::open_in(&data_dir)
            .await
            .context("failed to open database")?;

        let templates = load_prompt_templates(&data_dir, &config.prompts)
            .await
            .context("invalid prompt templates")?;

        let runtime = Arc::new(build_runtime(&data_dir, &config, show_progress)?);
        let pipeline = ConversationPipeline::new(Arc::clone(&runtime), PromptBuilder::new(templates));

        let conversation_service =
            ConversationService::new(SqliteConversationRepository::new(db_pool.clone()), pipeline);
        let summary_service = SummaryService::new(SqliteSummaryRepository::new(db_pool.clone()));

        Ok(Self {
            conversation_service: Arc::new(conversation_service),
            summary_service: Arc::new(summary_service),
            runtime,
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }
}

fn build_runtime(
    data_dir: &Path,
    config: &AppConfig,
    show_progress: bool,
) -> anyhow::Result<ConcreteRuntime> {
    let backend = LocalBackend::from_config(data_dir, config, show_progress)?;
    let settings = RuntimeSettings {
        model_id: config.model.id.clone(),
        engine: config.model.engine,
        max_new_tokens: config.model.max_new_tokens,
    };
    Ok(ModelRuntime::new(backend, settings))
}
