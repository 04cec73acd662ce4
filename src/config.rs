use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Config {
    /// Defaults, then global and project files (or one explicit file), then
    /// `FORGE_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILL_FORGE_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(ForgeError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(project_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("skill-forge/config.toml"))
    }

    fn load_project(project_root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&project_root.join(".skill-forge/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| ForgeError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| ForgeError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.pipeline {
            self.pipeline.merge(patch);
        }
        if let Some(patch) = patch.sandbox {
            self.sandbox.merge(patch);
        }
        if let Some(patch) = patch.research {
            self.research.merge(patch);
        }
        if let Some(patch) = patch.llm {
            self.llm.merge(patch);
        }
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.notify {
            self.notify.merge(patch);
        }
        if let Some(patch) = patch.publish {
            self.publish.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_usize("FORGE_MAX_ATTEMPTS")? {
            self.pipeline.max_attempts = value;
        }
        if let Some(value) = env_usize("FORGE_CONCURRENCY")? {
            self.pipeline.concurrency = value;
        }
        if let Some(values) = env_list("FORGE_TOPICS") {
            self.pipeline.topics = values;
        }

        if let Some(value) = env_string("FORGE_SANDBOX_BACKEND") {
            self.sandbox.backend = parse_backend(&value)?;
        }
        if let Some(value) = env_string("FORGE_SANDBOX_IMAGE") {
            self.sandbox.image = value;
        }
        if let Some(value) = env_u64("FORGE_COMMAND_TIMEOUT_SECS")? {
            self.sandbox.per_command_timeout = Duration::from_secs(value);
        }
        if let Some(value) = env_u64("FORGE_TOTAL_TIMEOUT_SECS")? {
            self.sandbox.total_timeout = Duration::from_secs(value);
        }

        if let Some(value) = env_string("FORGE_RESEARCH_BASE_URL") {
            self.research.base_url = value;
        }
        if let Some(value) = env_string("FORGE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = env_string("FORGE_LLM_MODEL") {
            self.llm.model = value;
        }

        if let Some(value) = env_string("FORGE_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string("FORGE_SKILLS_DIR").or_else(|| env_string("SKILLS_DIR")) {
            self.storage.skills_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = env_bool("FORGE_NOTIFY_ENABLED") {
            self.notify.enabled = value;
        }
        if let Some(value) = env_string("FORGE_DASHBOARD_URL").or_else(|| env_string("DASHBOARD_URL")) {
            self.notify.dashboard_url = Some(value);
        }

        if let Some(value) = env_bool("FORGE_PUBLISH_ENABLED") {
            self.publish.enabled = value;
        }
        if let Some(value) = env_string("FORGE_GITHUB_REPO").or_else(|| env_string("GITHUB_SKILLS_REPO")) {
            self.publish.repo = Some(value);
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_attempts == 0 {
            return Err(ForgeError::Config(
                "pipeline.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.concurrency == 0 {
            return Err(ForgeError::Config(
                "pipeline.concurrency must be at least 1".to_string(),
            ));
        }
        if self.sandbox.per_command_timeout.is_zero() || self.sandbox.total_timeout.is_zero() {
            return Err(ForgeError::Config(
                "sandbox timeouts must be greater than zero".to_string(),
            ));
        }
        parse_clock(&self.notify.summary_time)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Draft-and-validate cycles per run.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Topics processed at once by `learn-all`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub topics: Vec<String>,
}

fn default_max_attempts() -> usize {
    3
}

fn default_concurrency() -> usize {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            concurrency: default_concurrency(),
            topics: Vec::new(),
        }
    }
}

impl PipelineConfig {
    fn merge(&mut self, patch: PipelinePatch) {
        if let Some(value) = patch.max_attempts {
            self.max_attempts = value;
        }
        if let Some(value) = patch.concurrency {
            self.concurrency = value;
        }
        if let Some(values) = patch.topics {
            self.topics = values;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SandboxBackendKind {
    Docker,
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_backend")]
    pub backend: SandboxBackendKind,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_cpus")]
    pub cpus: String,
    #[serde(default = "default_network")]
    pub network: String,
    /// Explicit docker binary; looked up on `PATH` when unset.
    #[serde(default)]
    pub docker_binary: Option<PathBuf>,
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub per_command_timeout: Duration,
    #[serde(default = "default_total_timeout", with = "humantime_serde")]
    pub total_timeout: Duration,
}

fn default_backend() -> SandboxBackendKind {
    SandboxBackendKind::Docker
}

fn default_image() -> String {
    "python:3.11-slim".to_string()
}

fn default_memory() -> String {
    "512m".to_string()
}

fn default_cpus() -> String {
    "1".to_string()
}

fn default_network() -> String {
    "none".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_total_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            image: default_image(),
            memory: default_memory(),
            cpus: default_cpus(),
            network: default_network(),
            docker_binary: None,
            per_command_timeout: default_command_timeout(),
            total_timeout: default_total_timeout(),
        }
    }
}

impl SandboxConfig {
    fn merge(&mut self, patch: SandboxPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.image {
            self.image = value;
        }
        if let Some(value) = patch.memory {
            self.memory = value;
        }
        if let Some(value) = patch.cpus {
            self.cpus = value;
        }
        if let Some(value) = patch.network {
            self.network = value;
        }
        if let Some(value) = patch.docker_binary {
            self.docker_binary = Some(value);
        }
        if let Some(value) = patch.per_command_timeout {
            self.per_command_timeout = value;
        }
        if let Some(value) = patch.total_timeout {
            self.total_timeout = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_research_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_research_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_scrape")]
    pub max_scrape: usize,
    /// Characters kept per scraped page.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_research_url() -> String {
    "https://api.firecrawl.dev".to_string()
}

fn default_research_key_env() -> String {
    "FIRECRAWL_API_KEY".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_max_scrape() -> usize {
    3
}

fn default_max_chars() -> usize {
    4000
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_research_url(),
            api_key_env: default_research_key_env(),
            max_results: default_max_results(),
            max_scrape: default_max_scrape(),
            max_chars: default_max_chars(),
            timeout: default_http_timeout(),
        }
    }
}

impl ResearchConfig {
    fn merge(&mut self, patch: ResearchPatch) {
        if let Some(value) = patch.base_url {
            self.base_url = value;
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = value;
        }
        if let Some(value) = patch.max_results {
            self.max_results = value;
        }
        if let Some(value) = patch.max_scrape {
            self.max_scrape = value;
        }
        if let Some(value) = patch.max_chars {
            self.max_chars = value;
        }
        if let Some(value) = patch.timeout {
            self.timeout = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root.
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_llm_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_llm_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.3
}

fn default_llm_timeout() -> Duration {
    Duration::from_secs(180)
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            model: default_model(),
            api_key_env: default_llm_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    fn merge(&mut self, patch: LlmPatch) {
        if let Some(value) = patch.base_url {
            self.base_url = value;
        }
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = value;
        }
        if let Some(value) = patch.max_tokens {
            self.max_tokens = value;
        }
        if let Some(value) = patch.temperature {
            self.temperature = value;
        }
        if let Some(value) = patch.timeout {
            self.timeout = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database; defaults to the platform data dir.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Root for `<name>/SKILL.md` files; defaults to `~/.hermes/skills`.
    #[serde(default)]
    pub skills_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub write_skill_files: bool,
    /// Drop the top-level `version` key from written SKILL.md files.
    #[serde(default)]
    pub sanitize_version: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            skills_dir: None,
            write_skill_files: true,
            sanitize_version: false,
        }
    }
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.db_path {
            self.db_path = Some(value);
        }
        if let Some(value) = patch.skills_dir {
            self.skills_dir = Some(value);
        }
        if let Some(value) = patch.write_skill_files {
            self.write_skill_files = value;
        }
        if let Some(value) = patch.sanitize_version {
            self.sanitize_version = value;
        }
    }

    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(expand_home(path));
        }
        dirs::data_dir()
            .map(|dir| dir.join("skill-forge").join("forge.db"))
            .ok_or_else(|| ForgeError::MissingConfig("data directory not found".to_string()))
    }

    pub fn resolved_skills_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.skills_dir {
            return Ok(expand_home(path));
        }
        dirs::home_dir()
            .map(|home| home.join(".hermes").join("skills"))
            .ok_or_else(|| ForgeError::MissingConfig("home directory not found".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_telegram_api")]
    pub telegram_api: String,
    #[serde(default = "default_token_env")]
    pub bot_token_env: String,
    #[serde(default = "default_chat_env")]
    pub chat_id_env: String,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    /// Local `HH:MM` at which the summary daemon fires.
    #[serde(default = "default_summary_time")]
    pub summary_time: String,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_chat_env() -> String {
    "TELEGRAM_CHAT_ID".to_string()
}

fn default_summary_time() -> String {
    "09:00".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            telegram_api: default_telegram_api(),
            bot_token_env: default_token_env(),
            chat_id_env: default_chat_env(),
            dashboard_url: None,
            summary_time: default_summary_time(),
        }
    }
}

impl NotifyConfig {
    fn merge(&mut self, patch: NotifyPatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.telegram_api {
            self.telegram_api = value;
        }
        if let Some(value) = patch.bot_token_env {
            self.bot_token_env = value;
        }
        if let Some(value) = patch.chat_id_env {
            self.chat_id_env = value;
        }
        if let Some(value) = patch.dashboard_url {
            self.dashboard_url = Some(value);
        }
        if let Some(value) = patch.summary_time {
            self.summary_time = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Push saved skills to a GitHub repo when credentials are present.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_github_token_env")]
    pub token_env: String,
    /// `owner/repo` receiving `<directory>/<name>/SKILL.md`.
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_publish_directory")]
    pub directory: String,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_publish_directory() -> String {
    "skills".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: default_github_api(),
            token_env: default_github_token_env(),
            repo: None,
            branch: default_branch(),
            directory: default_publish_directory(),
        }
    }
}

impl PublishConfig {
    fn merge(&mut self, patch: PublishPatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.api_base {
            self.api_base = value;
        }
        if let Some(value) = patch.token_env {
            self.token_env = value;
        }
        if let Some(value) = patch.repo {
            self.repo = Some(value);
        }
        if let Some(value) = patch.branch {
            self.branch = value;
        }
        if let Some(value) = patch.directory {
            self.directory = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub pipeline: Option<PipelinePatch>,
    pub sandbox: Option<SandboxPatch>,
    pub research: Option<ResearchPatch>,
    pub llm: Option<LlmPatch>,
    pub storage: Option<StoragePatch>,
    pub notify: Option<NotifyPatch>,
    pub publish: Option<PublishPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipelinePatch {
    pub max_attempts: Option<usize>,
    pub concurrency: Option<usize>,
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SandboxPatch {
    pub backend: Option<SandboxBackendKind>,
    pub image: Option<String>,
    pub memory: Option<String>,
    pub cpus: Option<String>,
    pub network: Option<String>,
    pub docker_binary: Option<PathBuf>,
    #[serde(default, with = "humantime_serde")]
    pub per_command_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub total_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResearchPatch {
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub max_results: Option<usize>,
    pub max_scrape: Option<usize>,
    pub max_chars: Option<usize>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmPatch {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    pub db_path: Option<PathBuf>,
    pub skills_dir: Option<PathBuf>,
    pub write_skill_files: Option<bool>,
    pub sanitize_version: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NotifyPatch {
    pub enabled: Option<bool>,
    pub telegram_api: Option<String>,
    pub bot_token_env: Option<String>,
    pub chat_id_env: Option<String>,
    pub dashboard_url: Option<String>,
    pub summary_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PublishPatch {
    pub enabled: Option<bool>,
    pub api_base: Option<String>,
    pub token_env: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub directory: Option<String>,
}

/// Parse a `HH:MM` wall-clock time.
pub fn parse_clock(value: &str) -> Result<chrono::NaiveTime> {
    chrono::NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|err| {
        ForgeError::Config(format!("invalid time {value} (expected HH:MM): {err}"))
    })
}

fn parse_backend(value: &str) -> Result<SandboxBackendKind> {
    match value.to_lowercase().as_str() {
        "docker" => Ok(SandboxBackendKind::Docker),
        "process" | "local" => Ok(SandboxBackendKind::Process),
        _ => Err(ForgeError::Config(format!(
            "invalid sandbox backend {value} (expected docker|process)"
        ))),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<usize>().map(Some).map_err(|err| {
            ForgeError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|err| {
            ForgeError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}
