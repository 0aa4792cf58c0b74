use super::*;
use tempfile::TempDir;

#[test]
fn default_config_values() {
    let ollama = OllamaConfig::default();
    assert_eq!(ollama.protocol, "http");
    assert_eq!(ollama.host, "localhost");
    assert_eq!(ollama.port, 11434);
    assert_eq!(ollama.model, "all-minilm:latest");

    let search = SearchConfig::default();
    assert_eq!(search.max_results, 3);
}

#[test]
fn load_returns_defaults_when_file_missing() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config::load(temp_dir.path()).expect("can load config");

    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.search, SearchConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload_roundtrip() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config {
        ollama: OllamaConfig {
            host: "embedder.local".to_string(),
            port: 8080,
            model: "nomic-embed-text:latest".to_string(),
            ..OllamaConfig::default()
        },
        search: SearchConfig { max_results: 5 },
        base_dir: temp_dir.path().to_path_buf(),
    };

    config.save().expect("can save config");
    let reloaded = Config::load(temp_dir.path()).expect("can reload config");

    assert_eq!(reloaded, config);
}

#[test]
fn validate_rejects_bad_protocol() {
    let config = OllamaConfig {
        protocol: "ftp".to_string(),
        ..OllamaConfig::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn validate_rejects_zero_port() {
    let config = OllamaConfig {
        port: 0,
        ..OllamaConfig::default()
    };

    assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(0))));
}

#[test]
fn validate_rejects_empty_model() {
    let config = OllamaConfig {
        model: "  ".to_string(),
        ..OllamaConfig::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn validate_rejects_zero_max_results() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = Config {
        ollama: OllamaConfig::default(),
        search: SearchConfig { max_results: 0 },
        base_dir: temp_dir.path().to_path_buf(),
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidMaxResults(0))
    ));
}

#[test]
fn ollama_url_from_parts() {
    let config = OllamaConfig::default();
    let url = config.ollama_url().expect("default URL is valid");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}
