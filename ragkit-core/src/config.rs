//! Configuration system for ragkit.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> explicit config file -> environment.
//! Configuration is loaded from `~/.config/ragkit/config.toml` and/or
//! `.ragkit/config.toml` in the workspace directory.

use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a ragkit workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

/// Chat-completion provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai" or any OpenAI-compatible endpoint.
    pub provider: String,
    /// Model identifier used for answer generation.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Sampling temperature for answers. Provider default when unset.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate in a response.
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Upper bound on a single chat request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Inline API key. Takes precedence over `api_key_env`; not serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: None,
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            api_key: None,
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

impl LlmConfig {
    /// The inline key, else the value of `api_key_env`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "openai" (default) or "local".
    pub provider: String,
    /// Provider-specific model name.
    pub model: String,
    /// Embedding dimensionality. Must match what the collection was built with.
    pub dimensions: usize,
    #[serde(default)]
    pub base_url: Option<String>,
    pub api_key_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Vector store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the sqlite backend.
    pub path: PathBuf,
    /// Collection that ingestion writes and retrieval reads.
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("vector_store/ragkit.db"),
            collection: "knowledge_base".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding one YAML file per prompt version.
    pub dir: PathBuf,
    /// Prompt used by the answer generator.
    pub name: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("prompts"),
            name: "customer_support".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages handed to the answer generator.
    pub n_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { n_results: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/sample_docs.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the interaction log (`queries.jsonl`).
    pub query_log_dir: PathBuf,
    pub log_queries: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            query_log_dir: PathBuf::from("logs"),
            log_queries: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Directory for `eval_<timestamp>.json` run reports.
    pub results_dir: PathBuf,
    pub judge_model: String,
    pub judge_temperature: f32,
    /// Cases evaluated at once. 1 keeps the run strictly sequential.
    pub concurrency: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("evaluation_results"),
            judge_model: "gpt-4o-mini".to_string(),
            judge_temperature: 0.0,
            concurrency: 1,
        }
    }
}

impl RagConfig {
    /// Validate this config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Problems are reported as
    /// human-readable messages rather than errors.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.embedding.dimensions == 0 {
            warnings.push("embedding.dimensions is 0; every embedding will be empty".to_string());
        }
        if self.retrieval.n_results == 0 {
            warnings.push("retrieval.n_results is 0; no context will be retrieved".to_string());
        }
        if self.eval.concurrency == 0 {
            warnings.push("eval.concurrency is 0; treating it as 1".to_string());
        }
        if let Some(t) = self.llm.temperature
            && !(0.0..=2.0).contains(&t)
        {
            warnings.push(format!(
                "llm.temperature ({t}) is outside the typical range 0.0–2.0"
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            warnings.push("llm.request_timeout_secs is 0; every chat request will time out".into());
        }
        warnings
    }

    /// Resolve every relative path in this config against `workspace`.
    pub fn resolve_paths(&mut self, workspace: &Path) {
        for path in [
            &mut self.store.path,
            &mut self.prompts.dir,
            &mut self.corpus.path,
            &mut self.logging.query_log_dir,
            &mut self.eval.results_dir,
        ] {
            if path.is_relative() {
                *path = workspace.join(&*path);
            }
        }
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "ragkit", "ragkit")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ragkit").join("config.toml")
}

/// Load configuration with layered sources.
///
/// An explicit `config_file` must exist; the user and workspace files are
/// optional. Relative paths in the result are left as written; call
/// [`RagConfig::resolve_paths`] to anchor them to a workspace.
pub fn load_config(workspace: Option<&Path>, config_file: Option<&Path>) -> Result<RagConfig> {
    let mut figment = Figment::from(Serialized::defaults(RagConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Explicit --config file
    if let Some(path) = config_file {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (RAGKIT_LLM__MODEL, RAGKIT_STORE__BACKEND, etc.)
    figment = figment.merge(Env::prefixed("RAGKIT_").split("__"));

    figment.extract().map_err(|e| {
        ConfigError::ParseError {
            message: e.to_string(),
        }
        .into()
    })
}
