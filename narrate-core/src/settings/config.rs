use crate::chunker::SplitMode;
use crate::pipeline::{FailurePolicy, MergeSettings, DEFAULT_MAX_CHUNK_LEN};
use crate::synthesis::client::{DEFAULT_MODEL, DEFAULT_TIMEOUT_MS};
use crate::synthesis::openai::DEFAULT_BASE_URL;
use crate::synthesis::retry::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_ATTEMPTS};
use crate::synthesis::{AudioFormat, SpeechOptions, Voice};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TIMEOUT_ENV_VAR: &str = "NARRATE_TIMEOUT_MS";
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "openai")]
    OpenAi {
        /// Falls back to `OPENAI_API_KEY` when unset
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        response_format: AudioFormat,
    },
    #[serde(rename = "mock")]
    Mock {
        #[serde(default)]
        behavior: crate::synthesis::mock::MockBehavior,
        #[serde(default)]
        response_format: AudioFormat,
    },
}

impl ProviderConfig {
    pub fn openai() -> Self {
        ProviderConfig::OpenAi {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            response_format: AudioFormat::default(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAi { model, .. } => model.as_str(),
            ProviderConfig::Mock { .. } => "mock",
        }
    }

    pub fn response_format(&self) -> AudioFormat {
        match self {
            ProviderConfig::OpenAi {
                response_format, ..
            }
            | ProviderConfig::Mock {
                response_format, ..
            } => *response_format,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts per segment, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit; attempt N waits N times this
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Core application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// The name of the currently active provider
    #[serde(default)]
    pub active_provider: Option<String>,

    /// Map of provider name to configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Voice used when the caller does not pick one
    #[serde(default)]
    pub voice: Voice,

    /// Style instructions used when the caller does not supply any
    #[serde(default)]
    pub instructions: String,

    /// Default delivery adjustments
    #[serde(default)]
    pub speech: SpeechOptions,

    /// Maximum characters per segment
    #[serde(default = "default_max_chunk_len")]
    pub max_chunk_len: i64,

    #[serde(default)]
    pub split_mode: SplitMode,

    /// Per-attempt timeout for the remote call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Segments synthesized concurrently; 1 is sequential
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Documents longer than this are refused before synthesis starts
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,

    #[serde(default)]
    pub merge: MergeSettings,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

fn default_max_chunk_len() -> i64 {
    DEFAULT_MAX_CHUNK_LEN
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_concurrency() -> usize {
    1
}

fn default_max_document_chars() -> usize {
    100_000
}

impl Default for Settings {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), ProviderConfig::openai());

        Self {
            active_provider: Some("openai".to_string()),
            providers,
            voice: Voice::default(),
            instructions: String::new(),
            speech: SpeechOptions::default(),
            max_chunk_len: default_max_chunk_len(),
            split_mode: SplitMode::default(),
            timeout_ms: default_timeout_ms(),
            retry: RetrySettings::default(),
            failure_policy: FailurePolicy::default(),
            max_concurrency: default_max_concurrency(),
            max_document_chars: default_max_document_chars(),
            merge: MergeSettings::default(),
        }
    }
}

impl Settings {
    /// Get the active provider configuration
    pub fn active_provider(&self) -> Option<&ProviderConfig> {
        let provider = self.active_provider.as_ref()?;
        self.providers.get(provider)
    }

    /// Set the active provider (returns error if provider doesn't exist)
    pub fn set_active_provider(&mut self, name: &str) -> Result<(), String> {
        if self.providers.contains_key(name) {
            self.active_provider = Some(name.to_string());
            Ok(())
        } else {
            Err(format!("Provider '{name}' not found"))
        }
    }

    /// Add or update a provider configuration
    pub fn add_provider(&mut self, name: String, config: ProviderConfig) {
        self.providers.insert(name, config);
    }

    /// Apply `NARRATE_TIMEOUT_MS` and `OPENAI_API_KEY` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(TIMEOUT_ENV_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.timeout_ms = ms,
                _ => tracing::warn!("Ignoring invalid {TIMEOUT_ENV_VAR} value: {raw:?}"),
            }
        }

        if let Some(key) = lookup(API_KEY_ENV_VAR).filter(|k| !k.trim().is_empty()) {
            for provider in self.providers.values_mut() {
                if let ProviderConfig::OpenAi { api_key, .. } = provider {
                    if api_key.is_none() {
                        *api_key = Some(key.clone());
                    }
                }
            }
        }
    }

    /// Validate value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("speed", self.speech.speed),
            ("pitch", self.speech.pitch),
            ("volume", self.speech.volume),
        ] {
            if let Some(value) = value {
                if !(0.25..=4.0).contains(&value) {
                    return Err(format!("{name} must be between 0.25 and 4.0, got {value}"));
                }
            }
        }

        if self.timeout_ms == 0 {
            return Err("timeout_ms must be greater than zero".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }

        match self.active_provider() {
            None => Err(match &self.active_provider {
                Some(name) => format!("Provider '{name}' not found"),
                None => "No active provider configured".to_string(),
            }),
            Some(ProviderConfig::OpenAi { api_key: None, .. }) => Err(format!(
                "OpenAI provider requires an api_key or {API_KEY_ENV_VAR}"
            )),
            Some(_) => Ok(()),
        }
    }
}
