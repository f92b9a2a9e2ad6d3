// Retrieval module
// Query embedding plus nearest-neighbor lookup over the loaded index

#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;

use async_trait::async_trait;
use tracing::debug;

use crate::corpus::Article;
use crate::embeddings::Embedder;
use crate::index::LoadedIndex;
use crate::{LegalError, Result};

/// An article returned by a search, with its corpus row and L2 distance
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedArticle {
    pub row: usize,
    pub distance: f32,
    pub article: Article,
}

/// Finds the articles most relevant to a question
#[async_trait]
pub trait ArticleSearch: Send + Sync {
    /// Up to `k` articles, nearest first. `NotReady` when no index is loaded.
    async fn search(&self, query: &str, k: NonZeroUsize) -> Result<Vec<RetrievedArticle>>;
}

/// Embeds queries with the same model the index was built with and looks
/// them up in the loaded index
pub struct Retriever {
    embedder: Box<dyn Embedder>,
    index: Option<LoadedIndex>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Box<dyn Embedder>, index: Option<LoadedIndex>) -> Self {
        Self { embedder, index }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    #[inline]
    pub fn index(&self) -> Option<&LoadedIndex> {
        self.index.as_ref()
    }
}

#[async_trait]
impl ArticleSearch for Retriever {
    async fn search(&self, query: &str, k: NonZeroUsize) -> Result<Vec<RetrievedArticle>> {
        let index = self.index.as_ref().ok_or(LegalError::NotReady)?;

        if index.is_empty() {
            debug!("Index is empty, skipping query embedding");
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        let neighbors = index.nearest(&query_vector, k).await?;

        let results: Vec<RetrievedArticle> = neighbors
            .into_iter()
            .filter_map(|neighbor| {
                index.article(neighbor.row).map(|article| RetrievedArticle {
                    row: neighbor.row,
                    distance: neighbor.distance,
                    article: article.clone(),
                })
            })
            .collect();

        debug!("Retrieved {} articles for query (k = {})", results.len(), k);
        Ok(results)
    }
}
