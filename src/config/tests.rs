use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                model: "test-model".to_string(),
                batch_size: 32,
                ..OllamaConfig::default()
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"

            [retrieval]
            top_k = 8
        "#;

        let config: Config = toml::from_str(partial_toml).expect("partial config should parse");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.generation, GenerationConfig::default());
        assert_eq!(config.corpus, CorpusConfig::default());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            model = "bge-m3:latest"
            batch_size = 64
            timeout_seconds = 60
            retry_attempts = 2

            [generation]
            provider = "openai_compatible"
            endpoint = "http://localhost:8000/v1/chat/completions"
            model = "gemma2-9b-it"
            api_key_env = "LOCAL_LLM_KEY"
            max_tokens = 1024
            timeout_seconds = 30

            [retrieval]
            top_k = 5

            [corpus]
            constitution_csv = "/srv/legal/constitution.csv"
            labor_law_csv = "/srv/legal/labor_law.csv"
            store_dir = "/srv/legal/store"
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml correctly");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.store_dir_path(),
            std::path::PathBuf::from("/srv/legal/store")
        );
        assert_eq!(config.generation.max_tokens, 1024);
    }

    #[test]
    fn explicit_base_dir_wins() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let resolved = resolve_base_dir(Some(temp_dir.path().to_path_buf()))
            .expect("explicit dir always resolves");
        assert_eq!(resolved, temp_dir.path());
    }
}
