use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.generation.provider, GenerationProvider::OpenaiCompatible);
    assert_eq!(config.generation.api_key_env, "GROQ_API_KEY");
    assert_eq!(config.retrieval.top_k, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.max_tokens = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidMaxTokens(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.generation.api_key_env = "A=B".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.corpus.store_dir = PathBuf::new();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::EmptyPath("store_dir"))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn generation_endpoint_defaults_per_provider() {
    let mut generation = GenerationConfig::default();
    assert_eq!(
        generation
            .endpoint_url()
            .expect("default endpoint is valid")
            .as_str(),
        "https://api.groq.com/openai/v1/chat/completions"
    );

    generation.set_provider(GenerationProvider::HuggingFace);
    generation
        .set_model("google/gemma-2-9b-it".to_string())
        .expect("model name is valid");
    assert_eq!(
        generation
            .endpoint_url()
            .expect("default endpoint is valid")
            .as_str(),
        "https://api-inference.huggingface.co/models/google/gemma-2-9b-it"
    );

    generation.endpoint = Some("http://127.0.0.1:8080/v1/chat/completions".to_string());
    assert_eq!(
        generation
            .endpoint_url()
            .expect("override endpoint is valid")
            .port(),
        Some(8080)
    );

    generation.endpoint = Some("not a url".to_string());
    assert!(generation.endpoint_url().is_err());
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn provider_serializes_in_snake_case() {
    let toml_str = r#"
        [generation]
        provider = "hugging_face"
        model = "google/gemma-2-9b-it"
        api_key_env = "HF_TOKEN"
    "#;

    let config: Config = toml::from_str(toml_str).expect("should parse toml correctly");
    assert_eq!(config.generation.provider, GenerationProvider::HuggingFace);
    assert_eq!(config.generation.api_key_env, "HF_TOKEN");
    assert_eq!(config.generation.max_tokens, 2048);
    assert_eq!(GenerationProvider::HuggingFace.as_str(), "hugging_face");
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());

    let mut generation = GenerationConfig::default();
    assert!(generation.set_max_tokens(1024).is_ok());
    assert!(generation.set_max_tokens(9000).is_err());
    assert!(generation.set_api_key_env("HF_TOKEN".to_string()).is_ok());
    assert!(generation.set_api_key_env("  ".to_string()).is_err());

    let mut retrieval = RetrievalConfig::default();
    assert!(retrieval.set_top_k(10).is_ok());
    assert_eq!(retrieval.top_k().expect("top_k is non-zero").get(), 10);
    assert!(retrieval.set_top_k(51).is_err());
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("missing config falls back to defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.corpus, CorpusConfig::default());
}

#[test]
fn save_then_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.retrieval.top_k = 3;
    config.generation.provider = GenerationProvider::HuggingFace;

    config.save().expect("config should save");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("config should load");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn corpus_paths_resolve_against_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("config should load");

    assert_eq!(
        config.store_dir_path(),
        temp_dir.path().join("vector_store")
    );
    assert_eq!(
        config.constitution_csv_path(),
        temp_dir
            .path()
            .join("data/processed_constitution_articles.csv")
    );

    let absolute = temp_dir.path().join("elsewhere.csv");
    config.corpus.labor_law_csv = absolute.clone();
    assert_eq!(config.labor_law_csv_path(), absolute);
}
