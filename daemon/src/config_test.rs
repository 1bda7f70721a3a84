use super::*;
use tempfile::TempDir;

#[test]
fn test_default_config_values() {
    let config = Config::default();

    assert_eq!(config.engine.kind, "vosk");
    assert_eq!(config.engine.language, "fr");
    assert_eq!(config.engine.model_size, "base");
    assert_eq!(config.engine.model_name, None);
    assert_eq!(config.engine.model_dir, None);

    assert_eq!(config.injection.backend, BackendChoice::Auto);
    assert_eq!(config.injection.key_delay_ms, 12);

    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(!config.daemon.start_immediately);
    assert!(!config.daemon.preload);
}

#[test]
fn test_load_valid_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
[engine]
kind = "parakeet"
language = "en"
model_name = "nvidia/parakeet-tdt-0.6b-v2"
model_dir = "/opt/models"

[injection]
backend = "ydotool"
key_delay_ms = 5

[logging]
level = "debug"

[daemon]
start_immediately = true
"#;

    std::fs::write(&config_path, toml_content).unwrap();

    let config = Config::load_from(&config_path).unwrap();

    assert_eq!(config.engine.kind, "parakeet");
    assert_eq!(config.engine.language, "en");
    assert_eq!(
        config.engine.model_name.as_deref(),
        Some("nvidia/parakeet-tdt-0.6b-v2")
    );
    assert_eq!(config.engine.model_dir, Some(PathBuf::from("/opt/models")));
    assert_eq!(config.injection.backend, BackendChoice::Ydotool);
    assert_eq!(config.injection.key_delay_ms, 5);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert!(config.daemon.start_immediately);
    assert!(!config.daemon.preload);
}

#[test]
fn test_missing_config_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nonexistent.toml");

    let config = Config::load_from(&config_path).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_toml_returns_error() {
    let invalid_toml = "this is not valid { toml [";

    let result = Config::parse(invalid_toml);

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("TOML"));
}

#[test]
fn test_invalid_backend_returns_error() {
    let toml_content = r#"
[injection]
backend = "wtype"
"#;

    assert!(Config::parse(toml_content).is_err());
}

#[test]
fn test_unknown_engine_kind_is_accepted() {
    // The factory falls back to vosk; the file itself stays loadable.
    let config = Config::parse("[engine]\nkind = \"deepspeech\"\n").unwrap();
    assert_eq!(config.engine.kind, "deepspeech");
}

#[test]
fn test_partial_config_uses_defaults_for_missing() {
    let partial_toml = r#"
[engine]
kind = "whisper"
"#;

    let config = Config::parse(partial_toml).unwrap();

    assert_eq!(config.engine.kind, "whisper");
    assert_eq!(config.engine.language, "fr");
    assert_eq!(config.engine.model_size, "base");
    assert_eq!(config.injection, InjectionConfig::default());
}

#[test]
fn test_config_paths() {
    let config_dir = Config::config_dir().unwrap();
    let config_path = Config::config_path().unwrap();

    assert!(config_dir.ends_with("linvoc"));
    assert!(config_path.ends_with("config.toml"));
    assert_eq!(config_path.parent().unwrap(), config_dir);
}

#[test]
fn test_save_and_load_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let original = Config {
        engine: EngineConfig {
            kind: "faster-whisper".to_string(),
            language: "de".to_string(),
            model_size: "small".to_string(),
            model_name: None,
            model_dir: Some(PathBuf::from("/tmp/models")),
        },
        injection: InjectionConfig {
            backend: BackendChoice::Portal,
            key_delay_ms: 20,
        },
        logging: LoggingConfig {
            level: LogLevel::Trace,
        },
        daemon: DaemonConfig {
            start_immediately: false,
            preload: true,
        },
    };

    original.save_to(&config_path).unwrap();
    let loaded = Config::load_from(&config_path).unwrap();

    assert_eq!(original, loaded);
}

#[test]
fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested/dir/config.toml");

    Config::default().save_to(&config_path).unwrap();

    assert!(config_path.exists());
}

#[test]
fn test_unset_model_fields_not_serialized() {
    let toml_str = toml::to_string(&Config::default()).unwrap();
    assert!(!toml_str.contains("model_name"));
    assert!(!toml_str.contains("model_dir"));
    assert!(toml_str.contains("backend = \"auto\""));
}

#[test]
fn test_overrides_take_precedence() {
    let mut config = Config::parse(
        r#"
[engine]
kind = "whisper"
language = "en"
model_size = "tiny"

[injection]
backend = "xdotool"
"#,
    )
    .unwrap();

    config.apply(Overrides {
        engine: Some("parakeet".to_string()),
        model_name: Some("nvidia/parakeet-tdt-0.6b-v2".to_string()),
        backend: Some(BackendChoice::Auto),
        preload: true,
        ..Default::default()
    });

    assert_eq!(config.engine.kind, "parakeet");
    // Untouched values keep what the file said.
    assert_eq!(config.engine.language, "en");
    assert_eq!(config.engine.model_size, "tiny");
    assert_eq!(
        config.engine.model_name.as_deref(),
        Some("nvidia/parakeet-tdt-0.6b-v2")
    );
    assert_eq!(config.injection.backend, BackendChoice::Auto);
    assert!(config.daemon.preload);
}

#[test]
fn test_absent_flags_do_not_clear_file_values() {
    let mut config = Config::default();
    config.daemon.start_immediately = true;
    config.engine.model_dir = Some(PathBuf::from("/models"));

    config.apply(Overrides::default());

    assert!(config.daemon.start_immediately);
    assert_eq!(config.engine.model_dir, Some(PathBuf::from("/models")));
}

#[test]
fn test_engine_selection_from_config() {
    let mut config = Config::default();
    config.apply(Overrides {
        engine: Some("whisper".to_string()),
        language: Some("it".to_string()),
        model_size: Some("medium".to_string()),
        ..Default::default()
    });

    let selection = config.engine_selection();
    assert_eq!(selection.kind, "whisper");
    assert_eq!(selection.language, "it");
    assert_eq!(selection.model_size, "medium");
    assert_eq!(selection.model_name, None);
}

#[test]
fn test_injector_settings_from_config() {
    let mut config = Config::default();
    assert_eq!(config.injector_settings().forced_backend, None);

    config.injection.backend = BackendChoice::Portal;
    config.injection.key_delay_ms = 3;
    let settings = config.injector_settings();
    assert_eq!(settings.forced_backend.as_deref(), Some("portal"));
    assert_eq!(settings.key_delay_ms, 3);
}

#[test]
fn test_log_level_directives() {
    assert_eq!(LogLevel::Warn.as_directive(), "warn");
    assert_eq!(LogLevel::default().as_directive(), "info");
}
