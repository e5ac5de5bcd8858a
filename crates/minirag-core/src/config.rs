//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g. `APP_SERVER__PORT`).
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const MAX_K: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub debug: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self { name: "Mini-RAG".to_string(), debug: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub path: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { path: "./data/vectorstore".to_string() }
    }
}

impl IndexSettings {
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Hugging Face model id, also recorded in every index built with it.
    pub model: String,
    /// Local directory holding `config.json`, `tokenizer.json` and weights.
    /// When unset the files are fetched through the Hugging Face hub cache.
    pub model_dir: Option<String>,
    /// Use the deterministic hashing embedder instead of a neural model.
    pub use_fake: bool,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            use_fake: false,
            dim: 384,
            max_len: 256,
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolved_model_dir(&self) -> Option<PathBuf> {
        self.model_dir.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// On generator failure, answer with contexts only instead of a 503.
    pub fallback_to_retrieval: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
            fallback_to_retrieval: true,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_k: 4, chunk_size: 800, chunk_overlap: 150 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(Error::InvalidConfig("retrieval.chunk_size must be > 0".into()));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "retrieval.chunk_overlap ({}) must be smaller than retrieval.chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        if !(1..=MAX_K).contains(&r.default_k) {
            return Err(Error::InvalidConfig(format!("retrieval.default_k must be in 1..={MAX_K}, got {}", r.default_k)));
        }
        if self.embedding.timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(Error::InvalidConfig("timeouts must be at least one second".into()));
        }
        if self.embedding.batch_size == 0 || self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size and embedding.dim must be > 0".into()));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Self::from_figment(figment)
    }

    /// Build from arbitrary providers layered over the built-in defaults.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(figment);
        let settings: Settings = figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(Self { figment, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(s: &str) -> Result<Config> {
        Config::from_figment(Figment::new().merge(Toml::string(s)))
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = from_toml("").expect("defaults");
        let s = config.settings();
        assert_eq!(s.index.path, "./data/vectorstore");
        assert_eq!(s.embedding.model, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(s.llm.base_url, "http://localhost:11434");
        assert_eq!(s.llm.model, "llama3");
        assert_eq!((s.retrieval.default_k, s.retrieval.chunk_size, s.retrieval.chunk_overlap), (4, 800, 150));
        assert_eq!(s.server.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = from_toml("[server]\nport = 9001\n[llm]\nmodel = \"mistral\"\n").expect("config");
        assert_eq!(config.settings().server.port, 9001);
        assert_eq!(config.settings().server.host, "0.0.0.0");
        assert_eq!(config.settings().llm.model, "mistral");
        assert!(config.settings().llm.fallback_to_retrieval);
        let port: u16 = config.get("server.port").expect("key");
        assert_eq!(port, 9001);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = from_toml("[retrieval]\nchunk_size = 100\nchunk_overlap = 100\n").err().expect("invalid");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn default_k_is_bounded() {
        assert!(from_toml("[retrieval]\ndefault_k = 21\n").is_err());
        assert!(from_toml("[retrieval]\ndefault_k = 0\n").is_err());
        assert!(from_toml("[retrieval]\ndefault_k = 20\n").is_ok());
    }

    #[test]
    fn expand_path_resolves_env_vars() {
        std::env::set_var("MINIRAG_TEST_ROOT", "/srv/rag");
        assert_eq!(expand_path("$MINIRAG_TEST_ROOT/store"), PathBuf::from("/srv/rag/store"));
    }
}
