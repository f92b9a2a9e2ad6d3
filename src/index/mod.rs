// Index module
// Builds, validates and loads the matched corpus table / vector table pair

pub mod manifest;
pub mod vector_store;


use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::corpus::{Article, Corpus, Source, read_source_table};
use crate::embeddings::Embedder;
use crate::{LegalError, Result};

pub use manifest::{MANIFEST_FORMAT_VERSION, Manifest};
pub use vector_store::{Neighbor, VectorStore};

pub const CORPUS_FILE_NAME: &str = "all_legal_articles.csv";
pub const VECTORS_DIR_NAME: &str = "vectors";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Locations of the two per-law input tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTables {
    pub constitution: PathBuf,
    pub labor_law: PathBuf,
}

impl SourceTables {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            constitution: config.constitution_csv_path(),
            labor_law: config.labor_law_csv_path(),
        }
    }

    /// Both tables must exist before anything in the store is touched
    fn ensure_present(&self) -> Result<()> {
        for path in [&self.constitution, &self.labor_law] {
            if !path.exists() {
                error!("Source table missing: {}", path.display());
                return Err(LegalError::MissingSource(path.clone()));
            }
        }
        Ok(())
    }
}

/// File layout of the store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store_dir_path())
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn corpus_table(&self) -> PathBuf {
        self.root.join(CORPUS_FILE_NAME)
    }

    #[inline]
    pub fn vectors_dir(&self) -> PathBuf {
        self.root.join(VECTORS_DIR_NAME)
    }

    #[inline]
    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }
}

/// A validated corpus with its vectors, ready to answer nearest-neighbor queries
pub struct LoadedIndex {
    corpus: Corpus,
    manifest: Manifest,
    store: Option<VectorStore>,
}

impl std::fmt::Debug for LoadedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedIndex")
            .field("rows", &self.corpus.len())
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl LoadedIndex {
    #[inline]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    #[inline]
    pub fn article(&self, row: usize) -> Option<&Article> {
        self.corpus.get(row)
    }

    /// Up to `min(k, N)` corpus rows closest to `query` by L2 distance, nearest first
    #[inline]
    pub async fn nearest(&self, query: &[f32], k: NonZeroUsize) -> Result<Vec<Neighbor>> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };

        if query.len() != self.manifest.embedding_dimension {
            return Err(LegalError::EmbeddingMismatch(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.manifest.embedding_dimension
            )));
        }

        let neighbors = store.nearest(query, k.get()).await?;
        let row_count = self.corpus.len();

        Ok(neighbors
            .into_iter()
            .filter(|neighbor| {
                let valid = neighbor.row < row_count;
                if !valid {
                    error!(
                        "Vector table returned row {} outside corpus of {} rows",
                        neighbor.row, row_count
                    );
                }
                valid
            })
            .collect())
    }
}

/// Lifecycle of the store: nothing on disk, a complete pair on disk, or
/// that pair validated and held in memory
#[derive(Debug)]
pub enum IndexState {
    Unbuilt,
    Built(Manifest),
    Loaded(LoadedIndex),
}

impl IndexState {
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unbuilt => "unbuilt",
            Self::Built(_) => "built",
            Self::Loaded(_) => "loaded",
        }
    }
}

/// Owns the store directory and drives the `Unbuilt -> Built -> Loaded` transitions
#[derive(Debug)]
pub struct ArticleIndex {
    paths: StorePaths,
    state: IndexState,
}

impl ArticleIndex {
    /// Inspect the store directory; a readable manifest means `Built`.
    ///
    /// A malformed or outdated manifest leaves the store `Unbuilt` so `build` can replace it.
    #[inline]
    pub fn open(paths: StorePaths) -> Result<Self> {
        let state = match Manifest::read(&paths.manifest()) {
            Ok(Some(manifest)) => IndexState::Built(manifest),
            Ok(None) => IndexState::Unbuilt,
            Err(LegalError::Index(reason)) => {
                warn!("Ignoring stale manifest: {}", reason);
                IndexState::Unbuilt
            }
            Err(e) => return Err(e),
        };

        debug!("Store at {} is {}", paths.root().display(), state.name());
        Ok(Self { paths, state })
    }

    #[inline]
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    #[inline]
    pub fn state(&self) -> &IndexState {
        &self.state
    }

    #[inline]
    pub fn manifest(&self) -> Option<&Manifest> {
        match &self.state {
            IndexState::Unbuilt => None,
            IndexState::Built(manifest) => Some(manifest),
            IndexState::Loaded(loaded) => Some(&loaded.manifest),
        }
    }

    /// The loaded index, or `NotReady` in any other state
    #[inline]
    pub fn loaded(&self) -> Result<&LoadedIndex> {
        match &self.state {
            IndexState::Loaded(loaded) => Ok(loaded),
            IndexState::Unbuilt | IndexState::Built(_) => Err(LegalError::NotReady),
        }
    }

    /// Give up ownership of the loaded index, or `NotReady` in any other state
    #[inline]
    pub fn into_loaded(self) -> Result<LoadedIndex> {
        match self.state {
            IndexState::Loaded(loaded) => Ok(loaded),
            IndexState::Unbuilt | IndexState::Built(_) => Err(LegalError::NotReady),
        }
    }

    /// Rebuild the store from the source tables. Any state becomes `Built`.
    ///
    /// Missing sources abort before anything is written. Embeddings are
    /// computed before the previous pair is touched, so a failed embedding
    /// run leaves the previous store intact.
    #[inline]
    pub async fn build(
        &mut self,
        sources: &SourceTables,
        embedder: &dyn Embedder,
    ) -> Result<Manifest> {
        sources.ensure_present()?;

        info!("Building vector index from source tables");
        let constitution = read_source_table(&sources.constitution, Source::Constitution)?;
        let labor_law = read_source_table(&sources.labor_law, Source::LaborLaw)?;
        let corpus = Corpus::from_sources(constitution, labor_law);

        let vectors = embed_corpus(&corpus, embedder)?;
        let embedding_dimension = vectors.first().map_or(0, Vec::len);

        std::fs::create_dir_all(self.paths.root())?;
        Manifest::remove(&self.paths.manifest())?;
        self.state = IndexState::Unbuilt;

        corpus.write_csv(&self.paths.corpus_table())?;
        let store = VectorStore::open(&self.paths.vectors_dir()).await?;
        store.replace_vectors(&vectors).await?;

        let manifest = Manifest::new(&corpus, embedder.model_id(), embedding_dimension);
        manifest.write(&self.paths.manifest())?;

        info!(
            "Vector index built: {} constitution and {} labor law articles ({} dimensions)",
            manifest.constitution_rows, manifest.labor_law_rows, manifest.embedding_dimension
        );

        self.state = IndexState::Built(manifest.clone());
        Ok(manifest)
    }

    /// Validate the pair on disk and hold it in memory. `Built -> Loaded`;
    /// loading an already loaded index is a no-op.
    #[inline]
    pub async fn load(&mut self, embedder: &dyn Embedder) -> Result<&LoadedIndex> {
        let manifest = match &self.state {
            IndexState::Loaded(_) => return self.loaded(),
            IndexState::Unbuilt => return Err(LegalError::NotReady),
            IndexState::Built(manifest) => manifest.clone(),
        };

        manifest.check_embedding_model(embedder.model_id())?;

        let corpus = Corpus::read_csv(&self.paths.corpus_table())?;
        if corpus.len() != manifest.row_count {
            return Err(LegalError::Index(format!(
                "Corpus table has {} rows but manifest records {}; rebuild the index",
                corpus.len(),
                manifest.row_count
            )));
        }

        let store = if manifest.row_count == 0 {
            warn!("Loaded an empty corpus; every search will return no articles");
            None
        } else {
            let store = VectorStore::open(&self.paths.vectors_dir()).await?;
            let vector_count = store.count_vectors().await?;
            if vector_count != manifest.row_count {
                return Err(LegalError::Index(format!(
                    "Vector table has {} rows but manifest records {}; rebuild the index",
                    vector_count, manifest.row_count
                )));
            }
            let dimension = store.vector_dimension().await?;
            if dimension != Some(manifest.embedding_dimension) {
                return Err(LegalError::Index(format!(
                    "Vector table dimension {:?} does not match manifest {}; rebuild the index",
                    dimension, manifest.embedding_dimension
                )));
            }
            Some(store)
        };

        info!(
            "Loaded vector index with {} articles built at {}",
            manifest.row_count, manifest.built_at
        );

        self.state = IndexState::Loaded(LoadedIndex {
            corpus,
            manifest,
            store,
        });
        self.loaded()
    }
}

/// Embed every article text in row order, in embedder-sized batches
fn embed_corpus(corpus: &Corpus, embedder: &dyn Embedder) -> Result<Vec<Vec<f32>>> {
    let texts = corpus.texts();
    let batch_size = embedder.batch_size().max(1);

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(texts.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding articles {wide_bar}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        let embedded = embedder.embed_batch(batch)?;
        if embedded.len() != batch.len() {
            return Err(LegalError::Embedding(format!(
                "Embedder returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    Ok(vectors)
}
