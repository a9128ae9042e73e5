//! Prompt template loading.
//!
//! Templates are read once at startup. Each of the two templates comes from
//! its configured override file when set, otherwise from the built-in copy.

use std::path::Path;

use conversary_core::prompt::PromptTemplates;
use conversary_core::prompt::template::{BUILTIN_SYSTEM, BUILTIN_USER};
use conversary_types::config::PromptConfig;
use conversary_types::error::PromptRenderError;

use crate::config::resolve_path;

/// Load and compile the prompt templates named by `config`.
pub async fn load_prompt_templates(
    data_dir: &Path,
    config: &PromptConfig,
) -> Result<PromptTemplates, PromptRenderError> {
    let system = match &config.system_path {
        Some(path) => read_template(data_dir, path, "system").await?,
        None => BUILTIN_SYSTEM.to_string(),
    };
    let user = match &config.user_path {
        Some(path) => read_template(data_dir, path, "user").await?,
        None => BUILTIN_USER.to_string(),
    };

    let templates = PromptTemplates::compile(&system, &user)?;
    tracing::debug!(
        system_override = config.system_path.is_some(),
        user_override = config.user_path.is_some(),
        "Prompt templates compiled"
    );
    Ok(templates)
}

async fn read_template(
    data_dir: &Path,
    path: &Path,
    template: &'static str,
) -> Result<String, PromptRenderError> {
    let path = resolve_path(data_dir, path);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| PromptRenderError::Unreadable {
            template,
            message: format!("{}: {e}", path.display()),
        })
}
