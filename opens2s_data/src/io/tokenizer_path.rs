//! Tokenizer path resolution, with HuggingFace Hub fallback.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};

/// Resolve `--tokenizer-path` to a local model directory.
///
/// An existing directory is used as-is. Otherwise a value that looks like
/// an `org/name` model id is downloaded from HuggingFace Hub.
pub fn resolve_tokenizer_path(source: &str) -> Result<PathBuf> {
    let path = PathBuf::from(source);
    if path.is_dir() {
        return Ok(path);
    }

    if !looks_like_model_id(source) {
        bail!("Tokenizer path does not exist: {}", source);
    }

    tracing::info!(model_id = %source, "Downloading tokenizer from HuggingFace");

    let api = Api::new().context("Failed to create HuggingFace API")?;
    let repo = api.repo(Repo::new(source.to_string(), RepoType::Model));

    let mut model_dir: Option<PathBuf> = None;
    for filename in &["config.json", "model.safetensors"] {
        let path = repo
            .get(filename)
            .with_context(|| format!("Failed to download {}", filename))?;
        tracing::debug!(file = %filename, "Downloaded");
        if model_dir.is_none() {
            model_dir = path.parent().map(|p| p.to_path_buf());
        }
    }

    // Optional: the checkpoint works with defaults when this is absent.
    match repo.get("preprocessor_config.json") {
        Ok(_) => tracing::debug!(file = "preprocessor_config.json", "Downloaded"),
        Err(_) => tracing::debug!(file = "preprocessor_config.json", "Optional, skipped"),
    }

    model_dir.context("Hub download yielded no local directory")
}

/// A model id is `org/name` with exactly one slash and no path-like parts.
fn looks_like_model_id(source: &str) -> bool {
    if source.starts_with('/') || source.starts_with('.') || source.starts_with("~") {
        return false;
    }
    let parts: Vec<&str> = source.split('/').collect();
    parts.len() == 2 && parts.iter().all(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_model_id() {
        assert!(looks_like_model_id("zai-org/glm-4-voice-tokenizer"));
        assert!(!looks_like_model_id("/share/models/tokenizer"));
        assert!(!looks_like_model_id("./tokenizer"));
        assert!(!looks_like_model_id("a/b/c"));
        assert!(!looks_like_model_id("just-a-name"));
    }

    #[test]
    fn test_missing_local_path_fails() {
        assert!(resolve_tokenizer_path("/nonexistent/tokenizer/dir").is_err());
    }
}
