//! ask-dbx configuration types and loading

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::retriever::SearchMode;

/// Main ask-dbx configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Databricks workspace URL (e.g. `https://adb-123.azuredatabricks.net`)
    pub databricks_host: Option<String>,

    pub llm: LlmConfig,

    pub gateway: GatewayConfig,

    pub retriever: RetrieverConfig,

    pub planning: PlanningConfig,

    pub agent: AgentConfig,

    pub storage: StorageConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".ask-dbx.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from {}: {}", local_config.display(), e),
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ask-dbx").join("ask-dbx.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => warn!("Failed to load config from {}: {}", user_config.display(), e),
                }
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("DATABRICKS_HOST") {
            debug!(%host, "apply_env_overrides: DATABRICKS_HOST");
            self.databricks_host = Some(host);
        }
        if let Some(secs) = parse_env(&lookup, "AGENT_TIMEOUT") {
            self.agent.timeout_secs = secs;
        }
        // Log level precedence is config file over environment
        if self.log_level.is_none()
            && let Some(level) = lookup("AGENT_LOG_LEVEL")
        {
            self.log_level = Some(level);
        }
        if let Some(endpoint) = lookup("RETRIEVER_ENDPOINT") {
            self.retriever.endpoint = Some(endpoint);
        }
        if let Some(path) = lookup("STATE_DB_PATH") {
            self.storage.state_db_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("MARKDOWN_PATH") {
            self.storage.markdown_path = PathBuf::from(path);
        }
        if let Some(retries) = parse_env(&lookup, "SDK_RETRY_COUNT") {
            self.llm.max_retries = retries;
        }
        if let Some(secs) = parse_env::<u64>(&lookup, "SDK_TIMEOUT") {
            self.llm.timeout_ms = secs * 1000;
        }
    }

    /// Validate configuration before use
    ///
    /// Checks value ranges and that the credentials the configured backends need
    /// are available. Call early in startup to fail fast.
    pub fn validate(&self) -> Result<()> {
        self.planning.validate()?;

        if self.gateway.max_concurrency == 0 {
            bail!("gateway.max-concurrency must be at least 1");
        }
        if self.agent.timeout_secs == 0 {
            bail!("agent.timeout-secs must be at least 1");
        }
        if std::env::var(&self.llm.api_key_env).is_err() {
            bail!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            );
        }
        if self.llm.provider == LlmProvider::Databricks && self.llm.base_url.is_none() && self.databricks_host.is_none()
        {
            bail!("Databricks host not set. Set DATABRICKS_HOST or databricks-host in the config file.");
        }
        if self.retriever.backend == RetrieverBackend::VectorSearch {
            if self.retriever_host().is_none() {
                bail!("Vector search needs a host. Set RETRIEVER_ENDPOINT or DATABRICKS_HOST.");
            }
            if self.retriever.index.trim().is_empty() {
                bail!("retriever.index must name a vector search index");
            }
        }
        Ok(())
    }

    /// Host used for vector-search queries: explicit retriever endpoint, else the workspace host
    pub fn retriever_host(&self) -> Option<&str> {
        self.retriever
            .endpoint
            .as_deref()
            .or(self.databricks_host.as_deref())
    }

    /// Token for Databricks REST calls (read from `llm.api-key-env`)
    pub fn api_token(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).context(format!("{} is not set", self.llm.api_key_env))
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(%key, %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Chat model provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProvider {
    /// Databricks model serving (`{host}/serving-endpoints/chat/completions`)
    #[default]
    Databricks,
    /// OpenAI (`{base}/v1/chat/completions`)
    Openai,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Databricks => write!(f, "databricks"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    pub provider: LlmProvider,

    /// Model or serving endpoint name
    pub model: String,

    /// Environment variable containing the API token
    pub api_key_env: String,

    /// API base URL; defaults to the workspace host (databricks) or api.openai.com
    pub base_url: Option<String>,

    pub max_tokens: u32,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Retries for transient HTTP failures
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Databricks,
            model: "databricks-meta-llama-3-3-70b-instruct".to_string(),
            api_key_env: "DATABRICKS_TOKEN".to_string(),
            base_url: None,
            max_tokens: 4096,
            timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    /// Resolve endpoint URL and API key from the process environment
    pub fn resolve(&self, host: Option<&str>) -> Result<ResolvedLlmConfig> {
        self.resolve_with(host, |key| std::env::var(key).ok())
    }

    /// Resolve endpoint URL and API key using an arbitrary variable lookup
    pub fn resolve_with(&self, host: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Result<ResolvedLlmConfig> {
        let api_key = lookup(&self.api_key_env).ok_or_else(|| {
            eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })?;

        let endpoint_url = match self.provider {
            LlmProvider::Databricks => {
                let base = self
                    .base_url
                    .as_deref()
                    .or(host)
                    .ok_or_else(|| eyre::eyre!("Databricks host not set for the databricks provider"))?;
                format!("{}/serving-endpoints/chat/completions", base.trim_end_matches('/'))
            }
            LlmProvider::Openai => {
                let base = self.base_url.as_deref().unwrap_or("https://api.openai.com");
                format!("{}/v1/chat/completions", base.trim_end_matches('/'))
            }
        };

        Ok(ResolvedLlmConfig {
            provider: self.provider,
            model: self.model.clone(),
            api_key,
            endpoint_url,
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
        })
    }
}

/// Fully resolved client settings
#[derive(Clone)]
pub struct ResolvedLlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    /// Complete chat-completions URL
    pub endpoint_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl fmt::Debug for ResolvedLlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedLlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Model gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Maximum in-flight model calls within one batch
    pub max_concurrency: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Which document retriever to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrieverBackend {
    /// Databricks vector search index
    #[default]
    VectorSearch,
    /// Offline docstore directory
    Local,
}

/// Document retriever configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrieverConfig {
    pub backend: RetrieverBackend,

    /// Vector search host override (defaults to the workspace host)
    pub endpoint: Option<String>,

    /// Fully qualified vector search index name
    pub index: String,

    /// Columns requested when a query names none
    pub columns: Vec<String>,

    /// Column holding the chunk id
    pub id_column: String,

    /// Column holding the chunk text
    pub text_column: String,

    /// Docstore directory for the local backend
    pub docstore_dir: Option<PathBuf>,

    /// Docstore context for the local backend (defaults to the newest)
    pub context_id: Option<String>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            backend: RetrieverBackend::VectorSearch,
            endpoint: None,
            index: "main.default.databricks_docs_index".to_string(),
            columns: vec!["id".to_string(), "content".to_string(), "url".to_string()],
            id_column: "id".to_string(),
            text_column: "content".to_string(),
            docstore_dir: None,
            context_id: None,
        }
    }
}

/// Planning loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlanningConfig {
    /// Upper bound on retrieve iterations
    pub max_iterations: u32,

    /// Minimum rating for a fully supported plan to be accepted; never below 4
    pub acceptance_rating: u8,

    /// Chunks requested per retrieval
    pub top_k: usize,

    pub search_mode: SearchMode,

    /// Columns sent with each query; empty means the retriever's defaults
    pub columns: Vec<String>,

    /// Split the final plan into several tasks with the model
    pub decompose: bool,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            acceptance_rating: 4,
            top_k: 10,
            search_mode: SearchMode::Hybrid,
            columns: Vec::new(),
            decompose: true,
        }
    }
}

/// Lowest rating that can ever count as an accepted plan
pub const MIN_ACCEPTANCE_RATING: u8 = 4;

impl PlanningConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("planning.max-iterations must be at least 1");
        }
        if self.top_k == 0 {
            bail!("planning.top-k must be at least 1");
        }
        if !(MIN_ACCEPTANCE_RATING..=5).contains(&self.acceptance_rating) {
            bail!(
                "planning.acceptance-rating must be between {} and 5, got {}",
                MIN_ACCEPTANCE_RATING,
                self.acceptance_rating
            );
        }
        Ok(())
    }
}

/// Agent run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AgentConfig {
    /// Wall-clock limit for one run, in seconds
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// SQLite task-state database
    pub state_db_path: PathBuf,

    /// Markdown task report
    pub markdown_path: PathBuf,

    /// Directory for per-run JSONL logs
    pub runs_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_db_path: PathBuf::from("data/state.db"),
            markdown_path: PathBuf::from("data/tasks.md"),
            runs_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ask-dbx")
                .join("runs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, LlmProvider::Databricks);
        assert_eq!(config.llm.api_key_env, "DATABRICKS_TOKEN");
        assert_eq!(config.planning.max_iterations, 5);
        assert_eq!(config.planning.acceptance_rating, 4);
        assert_eq!(config.planning.top_k, 10);
        assert_eq!(config.planning.search_mode, SearchMode::Hybrid);
        assert_eq!(config.agent.timeout_secs, 60);
        assert_eq!(config.storage.state_db_path, PathBuf::from("data/state.db"));
        assert_eq!(config.storage.markdown_path, PathBuf::from("data/tasks.md"));
        assert!(config.planning.validate().is_ok());
    }

    #[test]
    fn test_parse_kebab_case_yaml() {
        let yaml = r#"
databricks-host: https://adb-1.example.net
log-level: debug
llm:
  provider: openai
  model: gpt-4o
  api-key-env: OPENAI_API_KEY
  max-retries: 1
gateway:
  max-concurrency: 8
retriever:
  backend: local
  docstore-dir: /tmp/docs
planning:
  max-iterations: 3
  acceptance-rating: 5
  top-k: 4
  search-mode: ann
  decompose: false
storage:
  markdown-path: out/report.md
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.databricks_host.as_deref(), Some("https://adb-1.example.net"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.llm.provider, LlmProvider::Openai);
        assert_eq!(config.llm.max_retries, 1);
        // Unspecified fields keep their defaults
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.gateway.max_concurrency, 8);
        assert_eq!(config.retriever.backend, RetrieverBackend::Local);
        assert_eq!(config.retriever.docstore_dir, Some(PathBuf::from("/tmp/docs")));
        assert_eq!(config.planning.max_iterations, 3);
        assert_eq!(config.planning.search_mode, SearchMode::Ann);
        assert!(!config.planning.decompose);
        assert_eq!(config.storage.markdown_path, PathBuf::from("out/report.md"));
        assert_eq!(config.storage.state_db_path, PathBuf::from("data/state.db"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides_from(lookup_from(&[
            ("DATABRICKS_HOST", "https://host.example"),
            ("AGENT_TIMEOUT", "120"),
            ("AGENT_LOG_LEVEL", "WARN"),
            ("RETRIEVER_ENDPOINT", "https://vs.example"),
            ("STATE_DB_PATH", "/tmp/s.db"),
            ("MARKDOWN_PATH", "/tmp/t.md"),
            ("SDK_RETRY_COUNT", "7"),
            ("SDK_TIMEOUT", "45"),
        ]));

        assert_eq!(config.databricks_host.as_deref(), Some("https://host.example"));
        assert_eq!(config.agent.timeout_secs, 120);
        assert_eq!(config.log_level.as_deref(), Some("WARN"));
        assert_eq!(config.retriever_host(), Some("https://vs.example"));
        assert_eq!(config.storage.state_db_path, PathBuf::from("/tmp/s.db"));
        assert_eq!(config.storage.markdown_path, PathBuf::from("/tmp/t.md"));
        assert_eq!(config.llm.max_retries, 7);
        assert_eq!(config.llm.timeout_ms, 45_000);
    }

    #[test]
    fn test_config_log_level_wins_over_env() {
        let mut config = Config {
            log_level: Some("ERROR".to_string()),
            ..Default::default()
        };
        config.apply_env_overrides_from(lookup_from(&[("AGENT_LOG_LEVEL", "TRACE")]));
        assert_eq!(config.log_level.as_deref(), Some("ERROR"));
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides_from(lookup_from(&[("AGENT_TIMEOUT", "soon")]));
        assert_eq!(config.agent.timeout_secs, 60);
    }

    #[test]
    fn test_retriever_host_falls_back_to_workspace() {
        let config = Config {
            databricks_host: Some("https://ws.example".to_string()),
            ..Default::default()
        };
        assert_eq!(config.retriever_host(), Some("https://ws.example"));
    }

    #[test]
    fn test_planning_validation() {
        let mut planning = PlanningConfig::default();
        planning.max_iterations = 0;
        assert!(planning.validate().is_err());

        let mut planning = PlanningConfig::default();
        planning.top_k = 0;
        assert!(planning.validate().is_err());

        let mut planning = PlanningConfig::default();
        planning.acceptance_rating = 6;
        assert!(planning.validate().is_err());
    }

    #[test]
    fn test_acceptance_rating_cannot_loosen_gate() {
        let mut planning = PlanningConfig::default();
        planning.acceptance_rating = 3;
        let err = planning.validate().unwrap_err();
        assert!(err.to_string().contains("between 4 and 5"));

        planning.acceptance_rating = 2;
        assert!(planning.validate().is_err());

        planning.acceptance_rating = 5;
        assert!(planning.validate().is_ok());
    }

    #[test]
    fn test_resolve_databricks_url() {
        let llm = LlmConfig::default();
        let resolved = llm
            .resolve_with(Some("https://ws.example/"), lookup_from(&[("DATABRICKS_TOKEN", "dapi-1")]))
            .unwrap();
        assert_eq!(resolved.endpoint_url, "https://ws.example/serving-endpoints/chat/completions");
        assert_eq!(resolved.api_key, "dapi-1");
        assert!(!format!("{:?}", resolved).contains("dapi-1"));
    }

    #[test]
    fn test_resolve_openai_url() {
        let llm = LlmConfig {
            provider: LlmProvider::Openai,
            api_key_env: "OPENAI_API_KEY".to_string(),
            ..Default::default()
        };
        let resolved = llm
            .resolve_with(None, lookup_from(&[("OPENAI_API_KEY", "sk-1")]))
            .unwrap();
        assert_eq!(resolved.endpoint_url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_resolve_errors() {
        let llm = LlmConfig::default();
        assert!(llm.resolve_with(Some("https://ws"), lookup_from(&[])).is_err());
        assert!(llm.resolve_with(None, lookup_from(&[("DATABRICKS_TOKEN", "x")])).is_err());
    }

    #[test]
    #[serial]
    fn test_validate_missing_api_key() {
        let config = Config {
            llm: LlmConfig {
                api_key_env: "ASK_DBX_TEST_MISSING_KEY_93121".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("ASK_DBX_TEST_MISSING_KEY_93121"));
    }

    #[test]
    #[serial]
    fn test_validate_with_env() {
        // SAFETY: serialized with other env-mutating tests
        unsafe {
            std::env::set_var("ASK_DBX_TEST_TOKEN", "dapi-test");
        }
        let config = Config {
            databricks_host: Some("https://ws.example".to_string()),
            llm: LlmConfig {
                api_key_env: "ASK_DBX_TEST_TOKEN".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = config.validate();
        assert_eq!(config.api_token().unwrap(), "dapi-test");
        // SAFETY: as above
        unsafe {
            std::env::remove_var("ASK_DBX_TEST_TOKEN");
        }
        assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    #[serial]
    fn test_load_explicit_file_applies_env() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ask-dbx.yml");
        fs::write(&path, "agent:\n  timeout-secs: 5\n").unwrap();

        // SAFETY: serialized with other env-mutating tests
        unsafe {
            std::env::set_var("MARKDOWN_PATH", "/tmp/from-env.md");
        }
        let config = Config::load(Some(&path));
        // SAFETY: as above
        unsafe {
            std::env::remove_var("MARKDOWN_PATH");
        }

        let config = config.unwrap();
        assert_eq!(config.agent.timeout_secs, 5);
        assert_eq!(config.storage.markdown_path, PathBuf::from("/tmp/from-env.md"));
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let missing = PathBuf::from("/nonexistent/ask-dbx.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
