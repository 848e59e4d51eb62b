//! Configuration management for docsage.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - The workspace config file (`.docsage/config.yaml`)
//! - Environment variables (`DOCSAGE_*`)
//! - Command-line flags
//!
//! The result is an explicit value handed to every component at construction.
//! Nothing here is a process-wide singleton.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];
const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["trigram", "ollama", "openai"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docsage/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("openai" or "ollama")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// API key for the completion provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Provider table from config.yaml
    pub llm: Option<LlmConfig>,

    /// Completion options shared by query engines and agents
    pub generation: GenerationConfig,

    /// Embedding capability selection
    pub embedding: EmbeddingSettings,

    /// Chunking defaults used when building an index
    pub chunking: ChunkingConfig,

    /// Root directory for persisted indexes (relative paths resolve against the workspace)
    pub storage_dir: PathBuf,

    /// Named indexes known to this workspace
    pub indexes: BTreeMap<String, IndexDefinition>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider", default)]
    pub active_embedding_provider: Option<String>,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Completion model for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    pub fn embedding_model(&self) -> Option<&str> {
        match self {
            Self::OpenAI {
                embedding_model, ..
            }
            | Self::Ollama {
                embedding_model, ..
            } => embedding_model.as_deref(),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Sampling and output options for completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub system_instruction: Option<String>,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    1000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            system_instruction: None,
        }
    }
}

/// Which embedding capability builds and queries indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "trigram" (offline), "ollama" or "openai"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Overrides the provider's configured embedding model
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "trigram".to_string()
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_embedding_batch() -> usize {
    32
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dimensions: default_embedding_dimensions(),
            batch_size: default_embedding_batch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    64
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// A named index declared in config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    /// Tool description shown to the routing agent
    #[serde(default)]
    pub description: String,

    /// Files or directories to ingest
    pub sources: Vec<PathBuf>,

    #[serde(default)]
    pub recursive: bool,

    /// Extension allow-list for directory sources (without the dot)
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Split each file into one document per page
    #[serde(default)]
    pub per_page: bool,

    /// Overrides `<storage_dir>/<name>`
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,

    /// Questions the LLM writes into each fragment's metadata (0 disables)
    #[serde(default)]
    pub questions: usize,

    /// Have the LLM summarize each fragment into its metadata
    #[serde(default)]
    pub summaries: bool,
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    generation: Option<GenerationConfig>,
    embedding: Option<EmbeddingSettings>,
    chunking: Option<ChunkingConfig>,
    storage: Option<StorageConfig>,
    #[serde(default)]
    indexes: BTreeMap<String, IndexDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageConfig {
    dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            json_logs: false,
            verbose: false,
            no_color: false,
            llm: None,
            generation: GenerationConfig::default(),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingConfig::default(),
            storage_dir: PathBuf::from(".docsage/storage"),
            indexes: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the workspace config file and the environment.
    ///
    /// Environment variables:
    /// - `DOCSAGE_WORKSPACE`: Override workspace path
    /// - `DOCSAGE_CONFIG`: Path to config file
    /// - `DOCSAGE_PROVIDER`: Completion provider
    /// - `DOCSAGE_MODEL`: Completion model
    /// - `DOCSAGE_API_KEY`: API key
    /// - `DOCSAGE_STORAGE_DIR`: Persisted index root
    /// - `DOCSAGE_LOG_FORMAT`: `json` for JSON log lines
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`load`](Self::load), with an explicit workspace and config file
    /// taking precedence over `DOCSAGE_WORKSPACE` and `DOCSAGE_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace = workspace.or_else(|| env_path("DOCSAGE_WORKSPACE"));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| env_path("DOCSAGE_CONFIG"));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.docsage_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(provider) = std::env::var("DOCSAGE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCSAGE_MODEL") {
            config.model = model;
        }

        if let Ok(dir) = std::env::var("DOCSAGE_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        if let Ok(format) = std::env::var("DOCSAGE_LOG_FORMAT") {
            config.json_logs = format.eq_ignore_ascii_case("json");
        }

        config.api_key = std::env::var("DOCSAGE_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.json_logs = format.eq_ignore_ascii_case("json");
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            if let Some(ref embedding_provider) = llm.active_embedding_provider {
                result.embedding.provider = embedding_provider.clone();
            }
            result.llm = Some(llm);
        }

        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }

        // An explicit embedding section wins over activeEmbeddingProvider.
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }

        if let Some(dir) = config_file.storage.and_then(|s| s.dir) {
            result.storage_dir = dir;
        }

        result.indexes.extend(config_file.indexes);

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the .docsage directory.
    pub fn docsage_dir(&self) -> PathBuf {
        self.workspace.join(".docsage")
    }

    /// Ensure the .docsage directory exists.
    pub fn ensure_docsage_dir(&self) -> AppResult<()> {
        let dir = self.docsage_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docsage directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Root directory for persisted indexes.
    pub fn storage_root(&self) -> PathBuf {
        self.resolve_path(&self.storage_dir)
    }

    /// Persisted location for a named index.
    pub fn persist_dir_for(&self, index_id: &str) -> PathBuf {
        match self
            .indexes
            .get(index_id)
            .and_then(|def| def.persist_dir.as_ref())
        {
            Some(dir) => self.resolve_path(dir),
            None => self.storage_root().join(index_id),
        }
    }

    /// Look up a declared index.
    pub fn index(&self, index_id: &str) -> AppResult<&IndexDefinition> {
        self.indexes.get(index_id).ok_or_else(|| {
            let known: Vec<&str> = self.indexes.keys().map(String::as_str).collect();
            AppError::Config(format!(
                "Index '{}' is not declared in config. Known indexes: {}",
                index_id,
                if known.is_empty() {
                    "(none)".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })
    }

    /// Get a provider's configuration block.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for a provider, if any.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// Embedding model for the active embedding provider.
    pub fn embedding_model(&self) -> Option<String> {
        self.embedding.model.clone().or_else(|| {
            self.get_provider_config(&self.embedding.provider)
                .and_then(|pc| pc.embedding_model())
                .map(str::to_string)
        })
    }

    /// Resolve the API key for a provider.
    ///
    /// `DOCSAGE_API_KEY` wins; otherwise the provider's `apiKeyEnv` is read.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            Some(ProviderConfig::Ollama { .. }) => None,
            None if provider == "openai" => std::env::var("OPENAI_API_KEY").ok(),
            None => None,
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.provider == "openai" && self.resolve_api_key("openai").is_none() {
            return Err(AppError::Config(
                "API key for openai not found (set DOCSAGE_API_KEY or the provider's apiKeyEnv)"
                    .to_string(),
            ));
        }

        let temperature = self.generation.temperature;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(AppError::Config(format!(
                "generation.temperature must be within [0, 1], got {}",
                temperature
            )));
        }

        if self.generation.max_output_tokens == 0 {
            return Err(AppError::Config(
                "generation.maxOutputTokens must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunking.chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        for (name, def) in &self.indexes {
            if def.sources.is_empty() {
                return Err(AppError::Config(format!(
                    "Index '{}' declares no sources",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
llm:
  activeProvider: ollama
  activeEmbeddingProvider: ollama
  providers:
    ollama:
      endpoint: http://gpu-box:11434
      model: mistral
      embeddingModel: nomic-embed-text
logging:
  level: warn
  format: json
generation:
  temperature: 0.2
  maxOutputTokens: 256
  systemInstruction: Answer briefly.
chunking:
  chunkSize: 256
  chunkOverlap: 32
indexes:
  lyft:
    description: Lyft 2021 annual report
    sources: [data/10k/lyft_2021.pdf]
    perPage: true
    questions: 3
    summaries: true
  uber:
    description: Uber 2021 annual report
    sources: [data/10k/uber_2021.pdf]
    persistDir: cache/uber
"#;

    fn sample_config() -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let base = AppConfig {
            workspace: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let merged = base.merge_yaml(&path).unwrap();
        (dir, merged)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 64);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_docsage_dir() {
        let config = AppConfig::default();
        assert!(config.docsage_dir().ends_with(".docsage"));
    }

    #[test]
    fn test_merge_yaml() {
        let (_dir, config) = sample_config();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "mistral");
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(
            config.embedding_model().as_deref(),
            Some("nomic-embed-text")
        );
        assert_eq!(
            config.provider_endpoint("ollama").as_deref(),
            Some("http://gpu-box:11434")
        );
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert!(config.json_logs);
        assert_eq!(config.generation.max_output_tokens, 256);
        assert_eq!(
            config.generation.system_instruction.as_deref(),
            Some("Answer briefly.")
        );
        assert_eq!(config.chunking.chunk_size, 256);
        assert_eq!(config.indexes.len(), 2);
        assert!(config.indexes["lyft"].per_page);
        assert_eq!(config.indexes["lyft"].questions, 3);
        assert!(config.indexes["lyft"].summaries);
        assert_eq!(config.indexes["uber"].questions, 0);
    }

    #[test]
    fn test_persist_dir_for() {
        let (dir, config) = sample_config();
        assert_eq!(
            config.persist_dir_for("lyft"),
            dir.path().join(".docsage/storage").join("lyft")
        );
        assert_eq!(config.persist_dir_for("uber"), dir.path().join("cache/uber"));
    }

    #[test]
    fn test_unknown_index() {
        let (_dir, config) = sample_config();
        let err = config.index("tesla").unwrap_err();
        assert!(err.to_string().contains("lyft, uber"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let config = AppConfig {
            provider: "unknown".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = AppConfig::default();
        config.generation.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_chunk_overlap() {
        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }
}
