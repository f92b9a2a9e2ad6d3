// Configuration management module
// TOML settings for the embedding server, the answer model, retrieval and corpus paths

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, CorpusConfig, GenerationConfig, GenerationProvider, OllamaConfig,
    RetrievalConfig,
};

/// Resolve the base directory: an explicit override wins, otherwise `~/.legal-mind`
#[inline]
pub fn resolve_base_dir(
    explicit: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    match explicit {
        Some(dir) => Ok(dir),
        None => Config::default_base_dir(),
    }
}
