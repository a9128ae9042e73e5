//! Local GGUF weights store: `{data_dir}/models/`.
//!
//! Downloads stream into a `.part` file while being hashed, and are renamed
//! into place only after the checksum (when configured) and the GGUF magic
//! both check out, so a file at the final path is always complete.

use std::path::{Path, PathBuf};

use conversary_types::config::ModelConfig;
use conversary_types::error::ModelLoadError;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// First four bytes of every GGUF file.
const GGUF_MAGIC: &[u8; 4] = b"GGUF";

/// A weights file present in the store.
#[derive(Debug, Clone)]
pub struct InstalledModel {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

pub struct ModelStore {
    models_dir: PathBuf,
    client: reqwest::Client,
}

impl ModelStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            models_dir: data_dir.join("models"),
            client: reqwest::Client::new(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn path_for(&self, model: &ModelConfig) -> PathBuf {
        self.models_dir.join(&model.filename)
    }

    pub fn is_installed(&self, model: &ModelConfig) -> bool {
        self.path_for(model).is_file()
    }

    /// List `.gguf` files in the store, sorted by name.
    pub async fn list_installed(&self) -> std::io::Result<Vec<InstalledModel>> {
        let mut models = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.models_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(models),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "gguf") {
                let metadata = entry.metadata().await?;
                models.push(InstalledModel {
                    filename: entry.file_name().to_string_lossy().into_owned(),
                    path,
                    size_bytes: metadata.len(),
                });
            }
        }

        models.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(models)
    }

    /// Path to usable weights for `model`, downloading them first if missing.
    pub async fn ensure_available(
        &self,
        model: &ModelConfig,
        show_progress: bool,
    ) -> Result<PathBuf, ModelLoadError> {
        let path = self.path_for(model);
        if path.is_file() {
            verify_gguf_header(&path).await?;
            debug!(path = %path.display(), "Model weights present");
            return Ok(path);
        }

        info!(model = %model.id, "Model weights missing, downloading");
        self.download(model, show_progress).await
    }

    /// Download `model` into the store, replacing any existing file.
    pub async fn download(
        &self,
        model: &ModelConfig,
        show_progress: bool,
    ) -> Result<PathBuf, ModelLoadError> {
        tokio::fs::create_dir_all(&self.models_dir)
            .await
            .map_err(|e| weights_unavailable(&self.models_dir, e))?;

        let dest_path = self.path_for(model);
        let part_path = dest_path.with_extension("gguf.part");

        info!(model = %model.id, url = %model.url, dest = %dest_path.display(), "Downloading model weights");

        let response = self
            .client
            .get(&model.url)
            .send()
            .await
            .map_err(|e| ModelLoadError::WeightsUnavailable(format!("{}: {e}", model.url)))?;

        if !response.status().is_success() {
            return Err(ModelLoadError::WeightsUnavailable(format!(
                "HTTP {}: {}",
                response.status(),
                model.url
            )));
        }

        let pb = progress_bar(response.content_length(), show_progress);

        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| weights_unavailable(&part_path, e))?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    pb.abandon();
                    remove_quietly(&part_path).await;
                    return Err(ModelLoadError::WeightsUnavailable(format!(
                        "download interrupted: {e}"
                    )));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                pb.abandon();
                remove_quietly(&part_path).await;
                return Err(weights_unavailable(&part_path, e));
            }
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await.map_err(|e| weights_unavailable(&part_path, e))?;
        drop(file);
        pb.finish_and_clear();

        let actual = format!("{:x}", hasher.finalize());
        if let Some(expected) = &model.sha256 {
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                remove_quietly(&part_path).await;
                return Err(ModelLoadError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!(sha256 = %actual, "Checksum verified");
        }

        if let Err(e) = verify_gguf_header(&part_path).await {
            remove_quietly(&part_path).await;
            return Err(e);
        }

        tokio::fs::rename(&part_path, &dest_path)
            .await
            .map_err(|e| weights_unavailable(&dest_path, e))?;

        info!(model = %model.id, bytes = downloaded, sha256 = %actual, "Model weights downloaded");
        Ok(dest_path)
    }
}

/// Check that `path` starts with the GGUF magic bytes.
pub async fn verify_gguf_header(path: &Path) -> Result<(), ModelLoadError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| weights_unavailable(path, e))?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).await.is_err() || &magic != GGUF_MAGIC {
        return Err(ModelLoadError::IncompatibleFormat(format!(
            "{} is not a GGUF file",
            path.display()
        )));
    }
    Ok(())
}

fn weights_unavailable(path: &Path, e: std::io::Error) -> ModelLoadError {
    ModelLoadError::WeightsUnavailable(format!("{}: {e}", path.display()))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial download");
    }
}

fn progress_bar(total: Option<u64>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    match total {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
            {
                pb.set_style(style);
            }
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use tempfile::TempDir;

    const WEIGHTS: &[u8] = b"GGUF\x03\x00\x00\x00fake tensor data";

    async fn serve(body: &'static [u8]) -> String {
        let app = Router::new().route("/model.gguf", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/model.gguf")
    }

    fn model(url: String, sha256: Option<String>) -> ModelConfig {
        ModelConfig {
            filename: "test.gguf".to_string(),
            url,
            sha256,
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn download_verifies_checksum_and_installs() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::new(tmp.path());
        let expected = format!("{:x}", Sha256::digest(WEIGHTS));
        let model = model(serve(WEIGHTS).await, Some(expected));

        assert!(!store.is_installed(&model));
        let path = store.ensure_available(&model, false).await.unwrap();

        assert_eq!(path, tmp.path().join("models").join("test.gguf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), WEIGHTS);
        assert!(!path.with_extension("gguf.part").exists());

        let installed = store.list_installed().await.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].size_bytes, WEIGHTS.len() as u64);
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::new(tmp.path());
        let model = model(serve(WEIGHTS).await, Some("00".repeat(32)));

        let err = store.download(&model, false).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::ChecksumMismatch { .. }));
        assert!(!store.is_installed(&model));
        assert!(store.list_installed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_gguf_download_is_incompatible() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::new(tmp.path());
        let model = model(serve(b"<html>not a model</html>").await, None);

        let err = store.download(&model, false).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::IncompatibleFormat(_)));
        assert!(!store.is_installed(&model));
    }

    #[tokio::test]
    async fn unreachable_url_is_weights_unavailable() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::new(tmp.path());
        let model = model("http://127.0.0.1:9/model.gguf".to_string(), None);

        let err = store.ensure_available(&model, false).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::WeightsUnavailable(_)));
    }

    #[tokio::test]
    async fn existing_file_is_used_without_download() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::new(tmp.path());
        let model = model("http://127.0.0.1:9/unused.gguf".to_string(), None);
        tokio::fs::create_dir_all(store.models_dir()).await.unwrap();
        tokio::fs::write(store.path_for(&model), WEIGHTS).await.unwrap();

        let path = store.ensure_available(&model, false).await.unwrap();
        assert_eq!(path, store.path_for(&model));
    }

    #[tokio::test]
    async fn existing_non_gguf_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = ModelStore::new(tmp.path());
        let model = model("http://127.0.0.1:9/unused.gguf".to_string(), None);
        tokio::fs::create_dir_all(store.models_dir()).await.unwrap();
        tokio::fs::write(store.path_for(&model), b"GG").await.unwrap();

        let err = store.ensure_available(&model, false).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::IncompatibleFormat(_)));
    }
}
