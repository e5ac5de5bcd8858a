//! Locating tokenizer, config and weights for a sentence-transformers model.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;

const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn is_safetensors(&self) -> bool {
        self.weights.extension().is_some_and(|e| e == "safetensors")
    }
}

/// Resolve from a local directory when given, else from the Hugging Face
/// hub cache (downloading on first use).
pub fn resolve(model_id: &str, model_dir: Option<&Path>) -> Result<ModelFiles> {
    match model_dir {
        Some(dir) => from_dir(dir),
        None => from_hub(model_id),
    }
}

pub fn from_dir(dir: &Path) -> Result<ModelFiles> {
    if !dir.is_dir() {
        return Err(anyhow!("model directory not found: {}", dir.display()));
    }
    let weights = WEIGHT_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("no model weights ({}) in {}", WEIGHT_FILES.join(" or "), dir.display()))?;
    info!(dir = %dir.display(), "using local model files");
    Ok(ModelFiles { config: dir.join("config.json"), tokenizer: dir.join("tokenizer.json"), weights })
}

fn from_hub(model_id: &str) -> Result<ModelFiles> {
    info!(model = model_id, "fetching model files from the Hugging Face hub");
    let api = hf_hub::api::sync::Api::new().context("create HF API")?;
    let repo = api.model(model_id.to_string());

    let config = repo.get("config.json").context("config.json")?;
    let tokenizer = repo.get("tokenizer.json").context("tokenizer.json")?;
    let weights = match repo.get(WEIGHT_FILES[0]) {
        Ok(path) => path,
        Err(_) => repo.get(WEIGHT_FILES[1]).context(WEIGHT_FILES[1])?,
    };
    Ok(ModelFiles { config, tokenizer, weights })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_dir_prefers_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path();
        std::fs::write(tmp.join("pytorch_model.bin"), b"").unwrap();
        std::fs::write(tmp.join("model.safetensors"), b"").unwrap();

        let files = from_dir(tmp).unwrap();
        assert!(files.is_safetensors());
        assert_eq!(files.tokenizer, tmp.join("tokenizer.json"));
    }

    #[test]
    fn missing_dir_is_an_error() {
        assert!(from_dir(Path::new("/definitely/not/a/model/dir")).is_err());
    }
}
