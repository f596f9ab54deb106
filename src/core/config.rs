use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Typed service configuration.
///
/// Resolution order: serde defaults, then an optional YAML file
/// (`RAGPORT_CONFIG_PATH` or `./config.yml`), then environment overrides
/// for the deploy-time values (API key, store URL, bind address).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub chroma: ChromaSettings,
    pub gemini: GeminiSettings,
    pub rag: RagSettings,
    pub upload: UploadSettings,
    pub conversations: ConversationSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub allowed_origins: Vec<String>,
    /// Per-client request budget per minute.
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaSettings {
    pub base_url: String,
    pub tenant: String,
    pub database: String,
    pub collection_name: String,
    /// Bounded-retry policy for the initial connection.
    pub connect_max_attempts: u32,
    pub connect_retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Cosine-distance cutoff: a match is included when
    /// `distance < distance_threshold`. Useful range is (0, 2];
    /// 0 or negative excludes everything.
    pub distance_threshold: f64,
    /// Documents requested from the store per chat query.
    pub max_context_docs: usize,
    /// Source preview truncation, in characters.
    pub preview_length: usize,
    /// `n_results` used by the search endpoint when the caller omits it.
    pub default_search_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_file_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub db_path: PathBuf,
    /// Sliding TTL applied on every save.
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "ragport".to_string(),
            allowed_origins: vec!["*".to_string()],
            rate_limit_per_minute: 100,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for ChromaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            collection_name: "documents".to_string(),
            connect_max_attempts: 10,
            connect_retry_delay_secs: 5,
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            embedding_dimension: 768,
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            distance_threshold: 0.8,
            max_context_docs: 3,
            preview_length: 100,
            default_search_limit: 5,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/conversations.db"),
            ttl_secs: 86_400,
            sweep_interval_secs: 3_600,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings::default(),
            server: ServerSettings::default(),
            chroma: ChromaSettings::default(),
            gemini: GeminiSettings::default(),
            rag: RagSettings::default(),
            upload: UploadSettings::default(),
            conversations: ConversationSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ApiError> {
        let path = config_path();
        let mut settings = match path {
            Some(path) => Self::from_file(&path)?,
            None => Settings::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ApiError::Internal(format!("failed to read config {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            ApiError::Internal(format!("failed to parse config {}: {}", path.display(), e))
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("GEMINI_API_KEY") {
            self.gemini.api_key = key;
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Ok(url) = env::var("CHROMA_URL") {
            self.chroma.base_url = url;
        }
        if let Ok(name) = env::var("CHROMA_COLLECTION_NAME") {
            self.chroma.collection_name = name;
        }
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
    }

    /// Logs warnings for suspicious values. Never rejects: the assembler
    /// accepts any finite threshold by contract.
    pub fn validate(&self) {
        if self.gemini.api_key.is_empty() {
            tracing::warn!("gemini.api_key is not configured; chat requests will fail");
        }
        let t = self.rag.distance_threshold;
        if !t.is_finite() || t <= 0.0 || t > 2.0 {
            tracing::warn!(
                "rag.distance_threshold={} is outside the useful range (0, 2]",
                t
            );
        }
        if self.rag.max_context_docs == 0 {
            tracing::warn!("rag.max_context_docs=0; chat will never retrieve context");
        }
        if self.app.rate_limit_per_minute == 0 {
            tracing::warn!("app.rate_limit_per_minute=0; treating as 1");
        }
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("RAGPORT_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from("config.yml");
    local.exists().then_some(local)
}
