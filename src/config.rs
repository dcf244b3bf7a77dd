use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::llm::{
    DisabledTranslator, EmbeddingModel, GeminiClient, GoogleTranslateClient, LlmClient, LlmError,
    OllamaClient, OllamaEmbedder, TranslationClient, DEFAULT_OLLAMA_URL,
};
use crate::pipeline::vectordb::SqliteVectorStore;
use crate::pipeline::Collaborators;

/// Application-level constants
pub const APP_NAME: &str = "VisitTriage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8001";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OLLAMA_GENERATE_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_AUX_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PIPELINE_BUDGET_SECS: u64 = 300;

const DB_FILE_NAME: &str = "visit_triage.db";

/// Get the application data directory (~/VisitTriage/).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the SQLite database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join(DB_FILE_NAME)
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "visit_triage_lib=info,visit_triage=info,tower_http=info"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown LLM provider: {other}")),
        }
    }
}

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub cors_origin: String,
    pub llm_provider: LlmProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ollama_url: String,
    pub ollama_generate_model: String,
    pub ollama_embed_model: String,
    pub google_project_id: Option<String>,
    pub google_translate_token: Option<String>,
    pub llm_timeout_secs: u64,
    pub aux_timeout_secs: u64,
    pub pipeline_budget: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Blank values count as unset;
    /// unparsable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let gemini_api_key = get("GEMINI_API_KEY");
        let default_provider = if gemini_api_key.is_some() {
            LlmProvider::Gemini
        } else {
            LlmProvider::Ollama
        };

        Self {
            bind_addr: parsed(&get, "TRIAGE_BIND_ADDR", default_bind_addr()),
            db_path: get("TRIAGE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            cors_origin: text("TRIAGE_CORS_ORIGIN", DEFAULT_CORS_ORIGIN),
            llm_provider: parsed(&get, "TRIAGE_LLM_PROVIDER", default_provider),
            gemini_api_key,
            gemini_model: text("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            ollama_url: text("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            ollama_generate_model: text("OLLAMA_GENERATE_MODEL", DEFAULT_OLLAMA_GENERATE_MODEL),
            ollama_embed_model: text("OLLAMA_EMBED_MODEL", DEFAULT_OLLAMA_EMBED_MODEL),
            google_project_id: get("GOOGLE_PROJECT_ID"),
            google_translate_token: get("GOOGLE_TRANSLATE_TOKEN"),
            llm_timeout_secs: parsed(&get, "TRIAGE_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS),
            aux_timeout_secs: parsed(&get, "TRIAGE_AUX_TIMEOUT_SECS", DEFAULT_AUX_TIMEOUT_SECS),
            pipeline_budget: Duration::from_secs(parsed(
                &get,
                "TRIAGE_PIPELINE_BUDGET_SECS",
                DEFAULT_PIPELINE_BUDGET_SECS,
            )),
        }
    }

    /// Wire the configured providers into a collaborator set.
    ///
    /// Builds blocking HTTP clients, so call this off the async runtime.
    pub fn build_collaborators(&self) -> Result<Collaborators, LlmError> {
        let llm: Arc<dyn LlmClient> = match self.llm_provider {
            LlmProvider::Gemini => {
                let key = self.gemini_api_key.as_deref().ok_or_else(|| {
                    LlmError::NotConfigured("GEMINI_API_KEY is required for the gemini provider".into())
                })?;
                Arc::new(GeminiClient::new(key, &self.gemini_model, self.llm_timeout_secs)?)
            }
            LlmProvider::Ollama => Arc::new(OllamaClient::new(
                &self.ollama_url,
                &self.ollama_generate_model,
                self.llm_timeout_secs,
            )?),
        };

        let embedder: Arc<dyn EmbeddingModel> = Arc::new(OllamaEmbedder::new(
            &self.ollama_url,
            &self.ollama_embed_model,
            self.aux_timeout_secs,
        )?);

        let translator: Arc<dyn TranslationClient> =
            match (&self.google_project_id, &self.google_translate_token) {
                (Some(project), Some(token)) => Arc::new(GoogleTranslateClient::new(
                    project,
                    token,
                    self.aux_timeout_secs,
                )?),
                _ => {
                    tracing::warn!("Translation not configured, responses stay in English");
                    Arc::new(DisabledTranslator)
                }
            };

        tracing::info!(
            provider = ?self.llm_provider,
            embed_model = %self.ollama_embed_model,
            db_path = %self.db_path.display(),
            "Collaborators configured"
        );

        Ok(Collaborators {
            llm,
            embedder,
            vectors: Arc::new(SqliteVectorStore::new(self.db_path.clone())),
            translator,
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8001))
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "Invalid configuration value, using default");
            default
        }),
    }
}
