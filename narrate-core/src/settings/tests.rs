use crate::chunker::SplitMode;
use crate::pipeline::FailurePolicy;
use crate::settings::manager::SettingsManager;
use crate::settings::{ProviderConfig, Settings};
use crate::synthesis::mock::MockBehavior;
use crate::synthesis::Voice;
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("nested").join("settings.toml");

    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    assert!(settings_path.exists());
    let settings = manager.settings();
    assert_eq!(settings.max_chunk_len, 1000);
    assert_eq!(settings.timeout_ms, 30_000);
    assert_eq!(settings.retry.max_attempts, 3);
    assert_eq!(settings.retry.backoff_base_ms, 1000);
    assert_eq!(settings.max_concurrency, 1);
    assert_eq!(settings.failure_policy, FailurePolicy::Continue);
    assert_eq!(settings.active_provider.as_deref(), Some("openai"));
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &settings_path,
        r#"
voice = "onyx"
max_chunk_len = 250
split_mode = "words"
failure_policy = "fail_fast"

[speech]
speed = 1.25
"#,
    )
    .unwrap();

    let settings = SettingsManager::from_path(settings_path).unwrap().settings();

    assert_eq!(settings.voice, Voice::Onyx);
    assert_eq!(settings.max_chunk_len, 250);
    assert_eq!(settings.split_mode, SplitMode::Words);
    assert_eq!(settings.failure_policy, FailurePolicy::FailFast);
    assert_eq!(settings.speech.speed, Some(1.25));
    assert_eq!(settings.speech.pitch, None);
    assert_eq!(settings.timeout_ms, 30_000);
    assert!(settings.providers.is_empty());
}

#[test]
fn test_corrupt_file_is_backed_up() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    std::fs::write(&settings_path, "max_chunk_len = [not toml").unwrap();

    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    assert!(temp_dir.path().join("settings.toml.backup").exists());
    assert_eq!(manager.settings().max_chunk_len, 1000);
    let rewritten = std::fs::read_to_string(&settings_path).unwrap();
    assert!(toml::from_str::<Settings>(&rewritten).is_ok());
}

#[test]
fn test_save_round_trips_mock_provider() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    let mut settings = Settings::default();
    settings.add_provider(
        "mock".to_string(),
        ProviderConfig::Mock {
            behavior: MockBehavior::AlwaysStatus { status: 429 },
            response_format: Default::default(),
        },
    );
    settings.set_active_provider("mock").unwrap();
    manager.save_settings(settings).unwrap();

    let reloaded = SettingsManager::from_path(settings_path).unwrap().settings();
    assert!(matches!(
        reloaded.active_provider(),
        Some(ProviderConfig::Mock {
            behavior: MockBehavior::AlwaysStatus { status: 429 },
            ..
        })
    ));
}

#[test]
fn test_update_setting_is_in_memory_only() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    manager.update_setting(|s| s.voice = Voice::Echo);
    assert_eq!(manager.settings().voice, Voice::Echo);

    let on_disk = SettingsManager::from_path(settings_path).unwrap().settings();
    assert_eq!(on_disk.voice, Voice::Alloy);
}

#[test]
fn test_profile_inferred_from_file_name() {
    let temp_dir = TempDir::new().unwrap();

    let default = SettingsManager::from_path(temp_dir.path().join("settings.toml")).unwrap();
    assert_eq!(default.current_profile(), None);

    let named = SettingsManager::from_path(temp_dir.path().join("settings_podcast.toml")).unwrap();
    assert_eq!(named.current_profile(), Some("podcast"));

    let empty = SettingsManager::from_path(temp_dir.path().join("settings_.toml")).unwrap();
    assert_eq!(empty.current_profile(), None);
}

#[test]
fn test_env_overrides() {
    let mut settings = Settings::default();
    settings.apply_overrides_from(|key| match key {
        "NARRATE_TIMEOUT_MS" => Some("45000".to_string()),
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        _ => None,
    });

    assert_eq!(settings.timeout_ms, 45_000);
    assert!(matches!(
        settings.active_provider(),
        Some(ProviderConfig::OpenAi { api_key: Some(key), .. }) if key == "sk-test"
    ));
    assert!(settings.validate().is_ok());
}

#[test]
fn test_env_overrides_keep_explicit_key_and_ignore_bad_timeout() {
    let mut settings = Settings::default();
    settings.add_provider(
        "openai".to_string(),
        ProviderConfig::OpenAi {
            api_key: Some("from-file".to_string()),
            base_url: "http://localhost".to_string(),
            model: "tts-1".to_string(),
            response_format: Default::default(),
        },
    );
    settings.apply_overrides_from(|key| match key {
        "NARRATE_TIMEOUT_MS" => Some("soon".to_string()),
        "OPENAI_API_KEY" => Some("from-env".to_string()),
        _ => None,
    });

    assert_eq!(settings.timeout_ms, 30_000);
    assert!(matches!(
        settings.active_provider(),
        Some(ProviderConfig::OpenAi { api_key: Some(key), .. }) if key == "from-file"
    ));
}

#[test]
fn test_validate_rejects_out_of_range_values() {
    let mut settings = Settings::default();
    settings.add_provider(
        "mock".to_string(),
        ProviderConfig::Mock {
            behavior: MockBehavior::Success,
            response_format: Default::default(),
        },
    );
    settings.set_active_provider("mock").unwrap();
    assert!(settings.validate().is_ok());

    settings.speech.speed = Some(9.0);
    assert!(settings.validate().unwrap_err().contains("speed"));
    settings.speech.speed = None;

    settings.max_concurrency = 0;
    assert!(settings.validate().is_err());
    settings.max_concurrency = 2;

    settings.active_provider = Some("missing".to_string());
    assert!(settings.validate().unwrap_err().contains("missing"));
}

#[test]
fn test_validate_requires_openai_key() {
    let settings = Settings::default();
    assert!(settings.validate().unwrap_err().contains("OPENAI_API_KEY"));
}
