//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services, so
//! nothing reads process-wide environment variables while a request is being handled.
//! Parsing goes through a lookup closure, which keeps it testable without touching the real
//! environment.

use crate::constants::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_MODEL, DEFAULT_LLM_PROVIDER, DEFAULT_LLM_TIMEOUT_SECS,
    DEFAULT_MAX_RETRIEVAL_RESULTS, DEFAULT_REST_ADDR, DEFAULT_STORE_PATH, LLM_MAX_ATTEMPTS,
    REASONING_DEADLINE_MARGIN_SECS,
};
use crate::embedding::{Embedder, HashingEmbedder, LlmEmbedder};
use crate::error::{CorepError, CorepResult};
use crate::reasoning::{
    FallbackReasoner, HeuristicReasoner, LlmChatBackend, LlmReasoner, LlmSettings, Reasoner,
    ReasoningMode,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which embedder produces document and query vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Hashing,
    Llm,
}

impl FromStr for EmbeddingMode {
    type Err = CorepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hashing" => Ok(EmbeddingMode::Hashing),
            "llm" => Ok(EmbeddingMode::Llm),
            other => Err(CorepError::InvalidConfig(format!(
                "unknown embedding mode: {other} (expected hashing or llm)"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    rest_addr: String,
    store_path: PathBuf,
    reasoning_mode: ReasoningMode,
    fallback_to_heuristic: bool,
    llm: LlmSettings,
    reasoning_deadline_secs: u64,
    embedding_mode: EmbeddingMode,
    embedding_model: String,
    max_retrieval_results: usize,
}

impl Default for CoreConfig {
    /// Offline defaults: heuristic reasoning, hashing embedder, no API key.
    fn default() -> Self {
        Self {
            rest_addr: DEFAULT_REST_ADDR.into(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            reasoning_mode: ReasoningMode::Heuristic,
            fallback_to_heuristic: true,
            llm: LlmSettings {
                provider: DEFAULT_LLM_PROVIDER.into(),
                model: DEFAULT_LLM_MODEL.into(),
                api_key: String::new(),
                timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            },
            reasoning_deadline_secs: default_reasoning_deadline_secs(DEFAULT_LLM_TIMEOUT_SECS),
            embedding_mode: EmbeddingMode::Hashing,
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            max_retrieval_results: DEFAULT_MAX_RETRIEVAL_RESULTS,
        }
    }
}

impl CoreConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> CorepResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for unparseable values, an unknown provider, or a model-backed
    /// mode without an API key for a provider that needs one.
    pub fn from_lookup<F>(lookup: F) -> CorepResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| non_empty(lookup(key));

        let api_key = get("COREP_LLM_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .unwrap_or_default();

        let timeout_secs = parse_env_value(
            "COREP_LLM_TIMEOUT_SECS",
            get("COREP_LLM_TIMEOUT_SECS"),
            defaults.llm.timeout_secs,
        )?;

        let config = Self {
            rest_addr: get("COREP_REST_ADDR").unwrap_or(defaults.rest_addr),
            store_path: get("COREP_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            reasoning_mode: parse_env_value(
                "COREP_REASONING_MODE",
                get("COREP_REASONING_MODE"),
                defaults.reasoning_mode,
            )?,
            fallback_to_heuristic: bool_from_env_value(
                "COREP_FALLBACK_TO_HEURISTIC",
                get("COREP_FALLBACK_TO_HEURISTIC"),
                defaults.fallback_to_heuristic,
            )?,
            llm: LlmSettings {
                provider: get("COREP_LLM_PROVIDER").unwrap_or(defaults.llm.provider),
                model: get("COREP_LLM_MODEL").unwrap_or(defaults.llm.model),
                api_key,
                timeout_secs,
            },
            reasoning_deadline_secs: parse_env_value(
                "COREP_REASONING_DEADLINE_SECS",
                get("COREP_REASONING_DEADLINE_SECS"),
                default_reasoning_deadline_secs(timeout_secs),
            )?,
            embedding_mode: parse_env_value(
                "COREP_EMBEDDING_MODE",
                get("COREP_EMBEDDING_MODE"),
                defaults.embedding_mode,
            )?,
            embedding_model: get("COREP_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            max_retrieval_results: parse_env_value(
                "COREP_MAX_RETRIEVAL_RESULTS",
                get("COREP_MAX_RETRIEVAL_RESULTS"),
                defaults.max_retrieval_results,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn uses_llm(&self) -> bool {
        self.reasoning_mode == ReasoningMode::Llm || self.embedding_mode == EmbeddingMode::Llm
    }

    fn validate(&self) -> CorepResult<()> {
        if self.max_retrieval_results == 0 {
            return Err(CorepError::InvalidConfig(
                "COREP_MAX_RETRIEVAL_RESULTS must be at least 1".into(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(CorepError::InvalidConfig(
                "COREP_LLM_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        if self.reasoning_deadline_secs == 0 {
            return Err(CorepError::InvalidConfig(
                "COREP_REASONING_DEADLINE_SECS must be at least 1".into(),
            ));
        }
        if self.reasoning_mode == ReasoningMode::Llm
            && self.reasoning_deadline_secs < self.llm.timeout_secs * u64::from(LLM_MAX_ATTEMPTS)
        {
            return Err(CorepError::InvalidConfig(format!(
                "COREP_REASONING_DEADLINE_SECS ({}) must cover {} model attempts of {} seconds",
                self.reasoning_deadline_secs, LLM_MAX_ATTEMPTS, self.llm.timeout_secs
            )));
        }
        if self.uses_llm() {
            crate::reasoning::llm::map_backend(&self.llm.provider)?;
            let needs_key = !self.llm.provider.eq_ignore_ascii_case("ollama");
            if needs_key && self.llm.api_key.is_empty() {
                return Err(CorepError::InvalidConfig(format!(
                    "provider {} needs COREP_LLM_API_KEY (or OPENAI_API_KEY)",
                    self.llm.provider
                )));
            }
        }
        Ok(())
    }

    pub fn rest_addr(&self) -> &str {
        &self.rest_addr
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Override the snapshot location (the CLI's `--store` flag).
    pub fn with_store_path(mut self, store_path: PathBuf) -> Self {
        self.store_path = store_path;
        self
    }

    pub fn reasoning_mode(&self) -> ReasoningMode {
        self.reasoning_mode
    }

    pub fn fallback_to_heuristic(&self) -> bool {
        self.fallback_to_heuristic
    }

    pub fn llm(&self) -> &LlmSettings {
        &self.llm
    }

    /// Deadline for the whole reasoning stage of one query, retries and fallback included.
    pub fn reasoning_deadline(&self) -> Duration {
        Duration::from_secs(self.reasoning_deadline_secs)
    }

    pub fn embedding_mode(&self) -> EmbeddingMode {
        self.embedding_mode
    }

    pub fn max_retrieval_results(&self) -> usize {
        self.max_retrieval_results
    }

    /// Build the configured embedder.
    pub fn embedder(&self) -> CorepResult<Arc<dyn Embedder>> {
        Ok(match self.embedding_mode {
            EmbeddingMode::Hashing => Arc::new(HashingEmbedder::default()),
            EmbeddingMode::Llm => Arc::new(LlmEmbedder::new(
                &self.llm.provider,
                &self.embedding_model,
                &self.llm.api_key,
            )?),
        })
    }

    /// Build the configured reasoning strategy.
    pub fn reasoner(&self) -> CorepResult<Arc<dyn Reasoner>> {
        match self.reasoning_mode {
            ReasoningMode::Heuristic => Ok(Arc::new(HeuristicReasoner::new())),
            ReasoningMode::Llm => {
                let backend = Arc::new(LlmChatBackend::new(self.llm.clone())?);
                let llm = LlmReasoner::new(backend, Duration::from_secs(self.llm.timeout_secs));
                if self.fallback_to_heuristic {
                    Ok(Arc::new(FallbackReasoner::new(
                        Box::new(llm),
                        HeuristicReasoner::new(),
                    )))
                } else {
                    Ok(Arc::new(llm))
                }
            }
        }
    }
}

fn default_reasoning_deadline_secs(timeout_secs: u64) -> u64 {
    timeout_secs * u64::from(LLM_MAX_ATTEMPTS) + REASONING_DEADLINE_MARGIN_SECS
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional environment value, falling back to `default` when it is unset.
pub fn parse_env_value<T>(name: &str, value: Option<String>, default: T) -> CorepResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(value) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|e| CorepError::InvalidConfig(format!("{name}={v}: {e}"))),
    }
}

/// Parse a boolean flag, accepting `true/false`, `1/0`, `yes/no` and `on/off`.
pub fn bool_from_env_value(name: &str, value: Option<String>, default: bool) -> CorepResult<bool> {
    match non_empty(value).map(|v| v.to_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(CorepError::InvalidConfig(format!(
            "{name}={other}: expected true or false"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> CorepResult<CoreConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_offline() {
        let config = config_from(&[]).expect("defaults should be valid");
        assert_eq!(config.rest_addr(), "0.0.0.0:8000");
        assert_eq!(config.store_path(), Path::new("data/document_store.json"));
        assert_eq!(config.reasoning_mode(), ReasoningMode::Heuristic);
        assert_eq!(config.embedding_mode(), EmbeddingMode::Hashing);
        assert_eq!(config.max_retrieval_results(), 5);
        assert_eq!(config.llm().model, "gpt-4o-mini");
        assert!(config.fallback_to_heuristic());
    }

    #[test]
    fn test_llm_mode_requires_api_key() {
        let err = config_from(&[("COREP_REASONING_MODE", "llm")]).expect_err("should fail");
        assert!(matches!(err, CorepError::InvalidConfig(msg) if msg.contains("API_KEY")));
    }

    #[test]
    fn test_llm_mode_accepts_openai_key_alias() {
        let config = config_from(&[
            ("COREP_REASONING_MODE", "llm"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .expect("should be valid");
        assert_eq!(config.llm().api_key, "sk-test");
        assert_eq!(config.reasoner().expect("should build").mode(), ReasoningMode::Llm);
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = config_from(&[
            ("COREP_REASONING_MODE", "llm"),
            ("COREP_LLM_PROVIDER", "ollama"),
            ("COREP_LLM_MODEL", "llama3"),
        ]);
        assert!(config.is_ok());
    }

    #[test]
    fn test_unknown_provider_is_rejected_in_llm_mode() {
        let err = config_from(&[
            ("COREP_REASONING_MODE", "llm"),
            ("COREP_LLM_PROVIDER", "acme"),
            ("COREP_LLM_API_KEY", "k"),
        ])
        .expect_err("should fail");
        assert!(matches!(err, CorepError::InvalidConfig(msg) if msg.contains("acme")));
    }

    #[test]
    fn test_numeric_and_boolean_values_are_parsed() {
        let config = config_from(&[
            ("COREP_MAX_RETRIEVAL_RESULTS", "8"),
            ("COREP_LLM_TIMEOUT_SECS", "12"),
            ("COREP_FALLBACK_TO_HEURISTIC", "no"),
            ("COREP_STORE_PATH", " /tmp/store.json "),
        ])
        .expect("should be valid");
        assert_eq!(config.max_retrieval_results(), 8);
        assert_eq!(config.llm().timeout_secs, 12);
        assert!(!config.fallback_to_heuristic());
        assert_eq!(config.store_path(), Path::new("/tmp/store.json"));
    }

    #[test]
    fn test_bad_values_name_the_variable() {
        let err = config_from(&[("COREP_MAX_RETRIEVAL_RESULTS", "many")]).expect_err("should fail");
        assert!(matches!(err, CorepError::InvalidConfig(msg) if msg.starts_with("COREP_MAX_RETRIEVAL_RESULTS")));

        let err = config_from(&[("COREP_MAX_RETRIEVAL_RESULTS", "0")]).expect_err("should fail");
        assert!(matches!(err, CorepError::InvalidConfig(_)));

        let err = bool_from_env_value("X", Some("maybe".into()), true).expect_err("should fail");
        assert!(matches!(err, CorepError::InvalidConfig(_)));
    }

    #[test]
    fn test_reasoning_deadline_covers_every_attempt() {
        let config = config_from(&[]).expect("defaults should be valid");
        assert_eq!(config.reasoning_deadline(), Duration::from_secs(65));

        let config = config_from(&[("COREP_LLM_TIMEOUT_SECS", "10")]).expect("should be valid");
        assert_eq!(config.reasoning_deadline(), Duration::from_secs(25));

        let config = config_from(&[("COREP_REASONING_DEADLINE_SECS", "90")]).expect("should be valid");
        assert_eq!(config.reasoning_deadline(), Duration::from_secs(90));
    }

    #[test]
    fn test_llm_deadline_shorter_than_attempts_is_rejected() {
        let err = config_from(&[
            ("COREP_REASONING_MODE", "llm"),
            ("COREP_LLM_API_KEY", "k"),
            ("COREP_REASONING_DEADLINE_SECS", "30"),
        ])
        .expect_err("should fail");
        assert!(matches!(err, CorepError::InvalidConfig(msg) if msg.starts_with("COREP_REASONING_DEADLINE_SECS")));
    }

    #[test]
    fn test_heuristic_reasoner_is_built_by_default() {
        let config = CoreConfig::default();
        assert_eq!(config.reasoner().expect("should build").mode(), ReasoningMode::Heuristic);
        assert_eq!(config.embedder().expect("should build").model_id(), "hashing-256");
    }
}
