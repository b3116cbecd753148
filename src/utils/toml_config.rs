//! TOML-based configuration for the UBO trace engine
//!
//! This module provides declarative configuration for the research agent,
//! its four stage sessions, the enrichment services and the trace policy via
//! a TOML file (`ubo.toml`). Secrets are never stored in the file; each
//! section names the environment variable that holds them.
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `UboConfigManager` for thread-safe access to the current configuration.

use crate::types::StageId;
use arc_swap::ArcSwap;
use chrono::NaiveDate;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Upper bound accepted for `trace.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Root configuration structure loaded from ubo.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UboConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Research agent used for the primary query of every stage
    pub agent: AgentConfig,

    /// Expert agent that scores candidate domains
    #[serde(default)]
    pub expert: Option<ExpertConfig>,

    /// People enrichment service
    #[serde(default)]
    pub apollo: Option<ApolloConfig>,

    /// Web search used for domain discovery
    #[serde(default)]
    pub searchapi: Option<SearchApiConfig>,

    #[serde(default)]
    pub trace: TraceConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Inference endpoint that accepts agent chat messages
    #[serde(default = "default_agent_url")]
    pub api_url: String,

    /// Environment variable holding the agent API key
    pub api_key_env: String,

    /// Environment variable holding the agent user id
    pub user_id_env: String,

    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,

    /// Per-stage agent and session identifiers, keyed by `stage_1a` .. `stage_2b`
    #[serde(default)]
    pub stages: HashMap<String, StageAgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageAgentConfig {
    pub agent_id: String,
    pub session_id: String,
}

fn default_agent_url() -> String {
    "https://agent-prod.studio.lyzr.ai/v3/inference/chat/".to_string()
}

fn default_agent_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertConfig {
    pub agent_id: String,
    pub session_id: String,
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
}

// ============= Enrichment Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApolloConfig {
    #[serde(default = "default_apollo_url")]
    pub base_url: String,
    pub api_key_env: String,
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
}

fn default_apollo_url() -> String {
    "https://api.apollo.io/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchApiConfig {
    #[serde(default = "default_searchapi_url")]
    pub base_url: String,
    pub api_key_env: String,
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_num_results")]
    pub num_results: u32,
}

fn default_searchapi_url() -> String {
    "https://www.searchapi.io/api/v1/search".to_string()
}

fn default_num_results() -> u32 {
    20
}

fn default_enrichment_timeout() -> u64 {
    30
}

// ============= Trace Policy Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Additional primary-query attempts after a zero-result attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_delay_ms")]
    pub stage_delay_ms: u64,
    /// Lower-bound date injected into time-scoped stages
    #[serde(default = "default_time_filter_from")]
    pub time_filter_from: NaiveDate,
}

fn default_max_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_time_filter_from() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_delay_ms(),
            stage_delay_ms: default_delay_ms(),
            time_filter_from: default_time_filter_from(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    EnrichmentDisabled,
    UnknownStage,
    ZeroDelay,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Stage '{0}' has no agent configured")]
    MissingStage(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl UboConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: UboConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_env_var(&self.agent.api_key_env)?;
        self.validate_env_var(&self.agent.user_id_env)?;

        if self.agent.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.api_url must not be empty".to_string(),
            ));
        }

        for stage in StageId::ALL {
            match self.agent.stages.get(stage.key()) {
                Some(stage_config) if !stage_config.agent_id.trim().is_empty() => {}
                _ => return Err(ConfigError::MissingStage(stage.key().to_string())),
            }
        }

        if self.trace.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "trace.max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.trace.max_retries
            )));
        }

        if self.agent.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and collect non-fatal warnings
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(self.check_enrichments());
        warnings.extend(self.check_unknown_stages());
        warnings.extend(self.check_delays());

        Ok(warnings)
    }

    fn check_enrichments(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        match &self.expert {
            None => warnings.push(disabled("expert", "domain confidence scoring")),
            Some(expert) if expert.agent_id.trim().is_empty() => {
                warnings.push(disabled("expert", "domain confidence scoring"))
            }
            Some(_) => {}
        }

        match &self.apollo {
            Some(apollo) if self.resolve_env(&apollo.api_key_env).is_some() => {}
            _ => warnings.push(disabled("apollo", "people search")),
        }

        match &self.searchapi {
            Some(search) if self.resolve_env(&search.api_key_env).is_some() => {}
            _ => warnings.push(disabled("searchapi", "domain search")),
        }

        warnings
    }

    fn check_unknown_stages(&self) -> Vec<ConfigWarning> {
        self.agent
            .stages
            .keys()
            .filter(|key| StageId::ALL.iter().all(|stage| stage.key() != key.as_str()))
            .map(|key| ConfigWarning {
                kind: ConfigWarningKind::UnknownStage,
                message: format!("agent.stages.{} does not match any stage and is ignored", key),
            })
            .collect()
    }

    fn check_delays(&self) -> Vec<ConfigWarning> {
        if self.trace.stage_delay_ms == 0 {
            vec![ConfigWarning {
                kind: ConfigWarningKind::ZeroDelay,
                message: "trace.stage_delay_ms is 0; stages will hit the agent back to back"
                    .to_string(),
            }]
        } else {
            Vec::new()
        }
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get the agent API key from the environment
    pub fn agent_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.agent.api_key_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.agent.api_key_env.clone()))
    }

    /// Get the agent user id from the environment
    pub fn agent_user_id(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.agent.user_id_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.agent.user_id_env.clone()))
    }

    /// Get the agent session for a stage
    pub fn stage_agent(&self, stage: StageId) -> Option<&StageAgentConfig> {
        self.agent.stages.get(stage.key())
    }

    /// Socket address string for the HTTP server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn disabled(section: &str, feature: &str) -> ConfigWarning {
    ConfigWarning {
        kind: ConfigWarningKind::EnrichmentDisabled,
        message: format!(
            "[{}] is not configured or its key is unset; {} is disabled",
            section, feature
        ),
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Quiet period after the last change event before the file is re-read
const RELOAD_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Shared handle to the live configuration.
///
/// Reads never block. A reload swaps in a new [`UboConfig`] only after it
/// parses and validates, so a broken edit leaves the running config in place.
pub struct UboConfigManager {
    config: Arc<ArcSwap<UboConfig>>,
    config_path: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl UboConfigManager {
    /// Load `path` and keep it as the current configuration
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = UboConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: Mutex::new(None),
        })
    }

    /// Manager over an in-memory config with no backing file
    pub fn from_config(config: UboConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("ubo.toml"),
            watcher: Mutex::new(None),
        }
    }

    /// Current configuration
    pub fn config(&self) -> Arc<UboConfig> {
        self.config.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Re-read the file now
    pub fn reload(&self) -> Result<(), ConfigError> {
        swap_in(&self.config, &self.config_path)
    }

    /// Watch the config file and reload it after each burst of edits.
    ///
    /// Events for other files in the same directory are ignored. The watch
    /// lasts as long as the manager.
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let file_name = self
            .config_path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "{} does not name a file",
                    self.config_path.display()
                ))
            })?;
        let parent = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => error!(error = %e, "Config watcher error"),
            }
        })?;
        // Editors often replace the file, so watch the directory holding it
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;
        *self.watcher.lock() = Some(watcher);

        let config = Arc::clone(&self.config);
        let config_path = self.config_path.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                loop {
                    match tokio::time::timeout(RELOAD_QUIET_PERIOD, rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }

                if let Err(e) = swap_in(&config, &config_path) {
                    warn!(path = %config_path.display(), error = %e, "Config reload rejected; keeping previous config");
                }
            }
            debug!("Config watcher closed");
        });

        info!(path = %self.config_path.display(), "Watching configuration for changes");
        Ok(())
    }
}

/// Parse and validate `path`, then publish it. Nothing is stored on error.
fn swap_in(config: &ArcSwap<UboConfig>, path: &Path) -> Result<(), ConfigError> {
    let next = UboConfig::load(path)?;
    config.store(Arc::new(next));
    info!(path = %path.display(), "Configuration reloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_config(prefix: &str) -> String {
        format!(
            r#"
[server]
host = "0.0.0.0"
port = 9000

[agent]
api_url = "http://localhost:1234/chat"
api_key_env = "{prefix}_AGENT_KEY"
user_id_env = "{prefix}_AGENT_USER"

[agent.stages.stage_1a]
agent_id = "agent-1a"
session_id = "session-1a"

[agent.stages.stage_1b]
agent_id = "agent-1b"
session_id = "session-1b"

[agent.stages.stage_2a]
agent_id = "agent-2a"
session_id = "session-2a"

[agent.stages.stage_2b]
agent_id = "agent-2b"
session_id = "session-2b"

[expert]
agent_id = "expert"
session_id = "expert-session"

[apollo]
api_key_env = "{prefix}_APOLLO_KEY"

[searchapi]
api_key_env = "{prefix}_SEARCH_KEY"
num_results = 10

[trace]
max_retries = 2
retry_delay_ms = 10
stage_delay_ms = 20
time_filter_from = "2024-06-01"
"#
        )
    }

    fn set_agent_env(prefix: &str) {
        // SAFETY: each test uses its own variable prefix
        unsafe {
            std::env::set_var(format!("{prefix}_AGENT_KEY"), "key");
            std::env::set_var(format!("{prefix}_AGENT_USER"), "user");
        }
    }

    #[test]
    fn test_parse_config() {
        let config: UboConfig = toml::from_str(&create_test_config("PARSE")).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.agent.stages.len(), 4);
        assert_eq!(
            config.stage_agent(StageId::Stage2B).unwrap().agent_id,
            "agent-2b"
        );
        assert_eq!(config.searchapi.as_ref().unwrap().num_results, 10);
        assert_eq!(config.trace.max_retries, 2);
        assert_eq!(
            config.trace.time_filter_from,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_defaults() {
        let content = r#"
[agent]
api_key_env = "X"
user_id_env = "Y"
"#;

        let config: UboConfig = toml::from_str(content).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.agent.timeout_secs, 60);
        assert_eq!(config.trace.max_retries, 3);
        assert_eq!(config.trace.retry_delay_ms, 5000);
        assert_eq!(config.trace.stage_delay_ms, 5000);
        assert_eq!(
            config.trace.time_filter_from,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert!(config.expert.is_none());
        assert!(config.apollo.is_none());
    }

    #[test]
    fn test_validation_missing_env_var() {
        let config: UboConfig = toml::from_str(&create_test_config("UNSET_VARS")).unwrap();
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "UNSET_VARS_AGENT_KEY"));
    }

    #[test]
    fn test_validation_missing_stage() {
        set_agent_env("MISSING_STAGE");
        let mut config: UboConfig = toml::from_str(&create_test_config("MISSING_STAGE")).unwrap();
        config.agent.stages.remove("stage_2a");

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::MissingStage(key)) if key == "stage_2a"));
    }

    #[test]
    fn test_validation_retry_limit() {
        set_agent_env("RETRY_LIMIT");
        let mut config: UboConfig = toml::from_str(&create_test_config("RETRY_LIMIT")).unwrap();
        config.trace.max_retries = MAX_RETRIES_LIMIT + 1;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_warnings_for_disabled_enrichments() {
        set_agent_env("WARN_ENRICH");
        let config: UboConfig = toml::from_str(&create_test_config("WARN_ENRICH")).unwrap();

        let warnings = config.validate_with_warnings().unwrap();
        let disabled: Vec<_> = warnings
            .iter()
            .filter(|w| w.kind == ConfigWarningKind::EnrichmentDisabled)
            .collect();

        // Apollo and SearchAPI keys are unset; the expert agent is configured
        assert_eq!(disabled.len(), 2);
        assert!(disabled.iter().any(|w| w.message.contains("people search")));
        assert!(disabled.iter().any(|w| w.message.contains("domain search")));
    }

    #[test]
    fn test_unknown_stage_warning() {
        set_agent_env("WARN_STAGE");
        let mut config: UboConfig = toml::from_str(&create_test_config("WARN_STAGE")).unwrap();
        config.agent.stages.insert(
            "stage_3c".to_string(),
            StageAgentConfig {
                agent_id: "x".to_string(),
                session_id: "y".to_string(),
            },
        );

        let warnings = config.validate_with_warnings().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.kind == ConfigWarningKind::UnknownStage && w.message.contains("stage_3c"))
        );
    }

    #[test]
    fn test_load_from_file_and_reload() {
        set_agent_env("LOAD_FILE");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(create_test_config("LOAD_FILE").as_bytes())
            .unwrap();

        let manager = UboConfigManager::new(file.path()).unwrap();
        assert_eq!(manager.config().server.port, 9000);

        let updated = create_test_config("LOAD_FILE").replace("port = 9000", "port = 9100");
        fs::write(file.path(), updated).unwrap();
        manager.reload().unwrap();

        assert_eq!(manager.config().server.port, 9100);
    }

    async fn wait_for_port(manager: &UboConfigManager, port: u16) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if manager.config().server.port == port {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_watcher_picks_up_edit_right_after_start() {
        set_agent_env("WATCH_EARLY");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubo.toml");
        let original = create_test_config("WATCH_EARLY");
        fs::write(&path, &original).unwrap();

        let manager = UboConfigManager::new(&path).unwrap();
        manager.start_watching().unwrap();
        fs::write(&path, original.replace("port = 9000", "port = 9300")).unwrap();

        assert!(wait_for_port(&manager, 9300).await);
    }

    #[tokio::test]
    async fn test_watcher_rejects_broken_edit_and_ignores_other_files() {
        set_agent_env("WATCH_BROKEN");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubo.toml");
        let original = create_test_config("WATCH_BROKEN");
        fs::write(&path, &original).unwrap();

        let manager = UboConfigManager::new(&path).unwrap();
        manager.start_watching().unwrap();

        fs::write(dir.path().join("notes.toml"), "port = 1").unwrap();
        fs::write(&path, original.replace("[trace]", "[trace")).unwrap();
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(manager.config().server.port, 9000);

        // Retry limit above the cap fails validation
        fs::write(&path, original.replace("max_retries = 2", "max_retries = 99")).unwrap();
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(manager.config().trace.max_retries, 2);

        fs::write(&path, original.replace("port = 9000", "port = 9200")).unwrap();
        assert!(wait_for_port(&manager, 9200).await);
    }

    #[test]
    fn test_load_missing_file() {
        let result = UboConfig::load("/nonexistent/ubo.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_config_manager_from_config() {
        let config: UboConfig = toml::from_str(&create_test_config("MANAGER")).unwrap();

        let manager = UboConfigManager::from_config(config.clone());
        let loaded = manager.config();

        assert_eq!(loaded.server.host, config.server.host);
        assert_eq!(loaded.bind_address(), "0.0.0.0:9000");
    }
}
