//! Wiring from [`Settings`] to a ready-to-run [`Pipeline`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::pipeline::{Pipeline, PipelineConfig};
use crate::settings::{ProviderConfig, Settings};
use crate::synthesis::mock::MockSpeechBackend;
use crate::synthesis::openai::{OpenAiSpeechBackend, OpenAiSpeechConfig};
use crate::synthesis::{RetryPolicy, SpeechBackend, SynthesisClient, SynthesisConfig};

pub fn create_backend(
    provider_config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn SpeechBackend>> {
    match provider_config {
        ProviderConfig::OpenAi {
            api_key, base_url, ..
        } => {
            let Some(api_key) = api_key.as_ref().filter(|k| !k.trim().is_empty()) else {
                bail!("OpenAI provider has no api_key; set it in settings or via OPENAI_API_KEY")
            };
            if base_url.trim().is_empty() {
                bail!("OpenAI base_url is empty")
            }

            let backend = OpenAiSpeechBackend::new(OpenAiSpeechConfig {
                api_key: api_key.clone(),
                base_url: base_url.clone(),
                timeout,
            })?;
            Ok(Arc::new(backend))
        }
        ProviderConfig::Mock { behavior, .. } => {
            Ok(Arc::new(MockSpeechBackend::new(behavior.clone())))
        }
    }
}

pub fn synthesis_config(settings: &Settings, provider_config: &ProviderConfig) -> SynthesisConfig {
    SynthesisConfig {
        model: provider_config.model().to_string(),
        response_format: provider_config.response_format(),
        timeout: Duration::from_millis(settings.timeout_ms),
        retry: RetryPolicy::linear(
            settings.retry.max_attempts,
            Duration::from_millis(settings.retry.backoff_base_ms),
        ),
    }
}

pub fn pipeline_config(settings: &Settings) -> PipelineConfig {
    PipelineConfig {
        max_chunk_len: settings.max_chunk_len,
        split_mode: settings.split_mode,
        failure_policy: settings.failure_policy,
        max_concurrency: settings.max_concurrency.max(1),
        options: settings.speech,
    }
}

/// Build a pipeline for the active provider.
pub fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let Some(provider_config) = settings.active_provider() else {
        bail!("No active provider configured in settings")
    };

    let config = synthesis_config(settings, provider_config);
    let backend = create_backend(provider_config, config.timeout)?;
    tracing::info!(
        backend = backend.name(),
        model = %config.model,
        format = ?config.response_format,
        "Built synthesis pipeline"
    );

    let client = SynthesisClient::new(backend, config);
    Ok(Pipeline::new(client, pipeline_config(settings)))
}

/// Same as [`build_pipeline`] but with a caller-supplied backend, keeping
/// every other setting.
pub fn build_pipeline_with_backend(
    settings: &Settings,
    backend: Arc<dyn SpeechBackend>,
) -> Pipeline {
    let config = match settings.active_provider() {
        Some(provider_config) => synthesis_config(settings, provider_config),
        None => SynthesisConfig {
            timeout: Duration::from_millis(settings.timeout_ms),
            retry: RetryPolicy::linear(
                settings.retry.max_attempts,
                Duration::from_millis(settings.retry.backoff_base_ms),
            ),
            ..Default::default()
        },
    };
    Pipeline::new(SynthesisClient::new(backend, config), pipeline_config(settings))
}
