
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{Corpus, Source};
use crate::{LegalError, Result};

/// Bumped whenever the on-disk layout of the store changes
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Describes a matched corpus table / vector table pair.
///
/// Written after both tables, so its presence means the pair is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub row_count: usize,
    pub constitution_rows: usize,
    pub labor_law_rows: usize,
    pub embedding_model: String,
    /// Zero for an empty corpus
    pub embedding_dimension: usize,
    pub built_at: DateTime<Utc>,
}

impl Manifest {
    #[inline]
    pub fn new(corpus: &Corpus, embedding_model: &str, embedding_dimension: usize) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            row_count: corpus.len(),
            constitution_rows: corpus.count_by_source(Source::Constitution),
            labor_law_rows: corpus.count_by_source(Source::LaborLaw),
            embedding_model: embedding_model.to_string(),
            embedding_dimension,
            built_at: Utc::now(),
        }
    }

    /// Read the manifest, `None` when the file does not exist
    #[inline]
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            LegalError::Index(format!("Malformed manifest {}: {}", path.display(), e))
        })?;

        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(LegalError::Index(format!(
                "Manifest format version {} is not supported (expected {}); rebuild the index",
                manifest.format_version, MANIFEST_FORMAT_VERSION
            )));
        }

        Ok(Some(manifest))
    }

    /// Write via a temporary file and rename so a reader never sees a partial manifest
    #[inline]
    pub fn write(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        let temp_path = path.with_extension("json.tmp");

        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;

        debug!("Wrote manifest to {}", path.display());
        Ok(())
    }

    /// Remove the manifest, marking the store as unbuilt
    #[inline]
    pub fn remove(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Queries must be embedded in the same space as the corpus
    #[inline]
    pub fn check_embedding_model(&self, model_id: &str) -> Result<()> {
        if self.embedding_model == model_id {
            Ok(())
        } else {
            Err(LegalError::EmbeddingMismatch(format!(
                "index was built with '{}' but queries would use '{}'; rebuild the index",
                self.embedding_model, model_id
            )))
        }
    }
}
