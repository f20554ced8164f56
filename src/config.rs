//! TOML configuration.
//!
//! Every section except `[db]` and `[server]` is optional and falls back to
//! the defaults documented on its struct. Secrets may be written inline or
//! named by an environment variable (`*_env`); [`load_config`] resolves the
//! environment variables once, so the rest of the program only ever reads
//! the resolved fields.
//!
//! See `config/arcana.example.toml` for a complete file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use arcana_core::chunk::{DEFAULT_OVERLAP, DEFAULT_TARGET_SIZE};
use arcana_core::retrieve::{DEFAULT_LIMIT, MATCH_THRESHOLD};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub interpretation: InterpretationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub credits: CreditsConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    /// Overlap budget in characters; `overlap / 5` words are carried over.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_target_size() -> usize {
    DEFAULT_TARGET_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    /// Chunks returned by `/knowledge/query` when the request has no limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Upper bound on a requested limit.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Chunks passed to the interpretation prompt.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: MATCH_THRESHOLD,
            default_limit: DEFAULT_LIMIT,
            max_limit: default_max_limit(),
            context_limit: default_context_limit(),
        }
    }
}

fn default_match_threshold() -> f64 {
    MATCH_THRESHOLD
}
fn default_limit() -> usize {
    DEFAULT_LIMIT
}
fn default_max_limit() -> usize {
    50
}
fn default_context_limit() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, `ollama`, or `local`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible endpoint or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Maximum embedding calls in flight during one ingestion.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key: None,
            api_key_env: default_openai_key_env(),
            timeout_secs: default_embedding_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `disabled` or `openai` (any OpenAI-compatible chat endpoint).
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key: None,
            api_key_env: default_openai_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2500
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct InterpretationConfig {
    /// Ground interpretations on retrieved knowledge-base excerpts.
    #[serde(default = "default_true")]
    pub use_knowledge: bool,
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            use_knowledge: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_secret_env: default_jwt_secret_env(),
        }
    }
}

fn default_jwt_secret_env() -> String {
    "ARCANA_JWT_SECRET".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CreditsConfig {
    /// Credits granted on a user's first authenticated request.
    #[serde(default = "default_signup_bonus")]
    pub signup_bonus: i64,
    /// Credits debited per saved reading.
    #[serde(default = "default_reading_cost")]
    pub reading_cost: i64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            signup_bonus: default_signup_bonus(),
            reading_cost: default_reading_cost(),
        }
    }
}

fn default_signup_bonus() -> i64 {
    3
}
fn default_reading_cost() -> i64 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_webhook_secret_env")]
    pub webhook_secret_env: String,
    /// Maximum age of a signed webhook timestamp.
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: i64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            webhook_secret_env: default_webhook_secret_env(),
            tolerance_secs: default_tolerance(),
        }
    }
}

fn default_webhook_secret_env() -> String {
    "STRIPE_WEBHOOK_SECRET".to_string()
}
fn default_tolerance() -> i64 {
    300
}

/// Fill `slot` from the environment when it was not set inline.
fn resolve_secret(slot: &mut Option<String>, env_name: &str) {
    if slot.as_deref().map_or(true, str::is_empty) {
        *slot = std::env::var(env_name).ok().filter(|v| !v.is_empty());
    }
}

impl Config {
    /// Resolve every `*_env` secret that was not given inline.
    pub fn resolve_secrets(&mut self) {
        resolve_secret(&mut self.embedding.api_key, &self.embedding.api_key_env);
        resolve_secret(&mut self.llm.api_key, &self.llm.api_key_env);
        resolve_secret(&mut self.auth.jwt_secret, &self.auth.jwt_secret_env);
        resolve_secret(
            &mut self.payments.webhook_secret,
            &self.payments.webhook_secret_env,
        );
    }

    /// Check value ranges and provider names.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.target_size == 0 {
            bail!("chunking.target_size must be > 0");
        }

        if !(-1.0..=1.0).contains(&self.retrieval.match_threshold) {
            bail!("retrieval.match_threshold must be in [-1.0, 1.0]");
        }
        if self.retrieval.default_limit == 0 || self.retrieval.max_limit == 0 {
            bail!("retrieval.default_limit and retrieval.max_limit must be >= 1");
        }
        if self.retrieval.default_limit > self.retrieval.max_limit {
            bail!("retrieval.default_limit must not exceed retrieval.max_limit");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if matches!(self.embedding.provider.as_str(), "openai" | "ollama") {
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        if self.embedding.concurrency == 0 {
            bail!("embedding.concurrency must be >= 1");
        }

        match self.llm.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown llm provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be in [0.0, 2.0]");
        }

        if self.credits.signup_bonus < 0 {
            bail!("credits.signup_bonus must be >= 0");
        }
        if self.credits.reading_cost < 0 {
            bail!("credits.reading_cost must be >= 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.validate()?;
    config.resolve_secrets();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/arcana.sqlite"

[server]
bind = "127.0.0.1:8787"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg: Config = toml::from_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.chunking.target_size, 500);
        assert_eq!(cfg.chunking.overlap, 50);
        assert_eq!(cfg.retrieval.match_threshold, 0.3);
        assert_eq!(cfg.retrieval.default_limit, 5);
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.max_tokens, 2500);
        assert_eq!(cfg.credits.signup_bonus, 3);
        assert_eq!(cfg.credits.reading_cost, 1);
        assert_eq!(cfg.payments.tolerance_secs, 300);
        assert!(!cfg.embedding.is_enabled());
        assert!(cfg.interpretation.use_knowledge);
    }

    #[test]
    fn test_unknown_embedding_provider_rejected() {
        let text = format!("{}\n[embedding]\nprovider = \"magic\"\n", MINIMAL);
        let cfg: Config = toml::from_str(&text).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_openai_embedding_requires_model_and_dims() {
        let text = format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL);
        let cfg: Config = toml::from_str(&text).unwrap();
        assert!(cfg.validate().is_err());

        let text = format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
            MINIMAL
        );
        let cfg: Config = toml::from_str(&text).unwrap();
        cfg.validate().unwrap();
    }

    #[test]
    fn test_inline_secret_wins_over_env() {
        let text = format!(
            "{}\n[auth]\njwt_secret = \"inline\"\njwt_secret_env = \"ARCANA_TEST_UNSET_SECRET\"\n",
            MINIMAL
        );
        let mut cfg: Config = toml::from_str(&text).unwrap();
        cfg.resolve_secrets();
        assert_eq!(cfg.auth.jwt_secret.as_deref(), Some("inline"));
    }

    #[test]
    fn test_missing_env_secret_stays_none() {
        let text = format!(
            "{}\n[payments]\nwebhook_secret_env = \"ARCANA_TEST_DEFINITELY_UNSET\"\n",
            MINIMAL
        );
        let mut cfg: Config = toml::from_str(&text).unwrap();
        cfg.resolve_secrets();
        assert!(cfg.payments.webhook_secret.is_none());
    }
}
