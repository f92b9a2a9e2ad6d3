// Embeddings module
// The embedding provider seam and its Ollama implementation

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// Maps text to fixed-length vectors.
///
/// The corpus and every query must be embedded by the same model; the
/// index manifest records [`Embedder::model_id`] so a mismatch is caught
/// at load time.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the index manifest
    fn model_id(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, returning one vector per input in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// How many texts the build step hands to [`Embedder::embed_batch`] at once
    fn batch_size(&self) -> usize {
        32
    }
}
