// Corpus module
// Article records, the two labeled source tables and the merged corpus table


use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{LegalError, Result};

/// The law an article belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Constitution,
    LaborLaw,
}

impl Source {
    /// Label stored in the merged corpus table
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Constitution => "constitution",
            Self::LaborLaw => "labor_law",
        }
    }

    /// Arabic display label used in prompts and citations
    #[inline]
    pub const fn label_ar(self) -> &'static str {
        match self {
            Self::Constitution => "الدستور",
            Self::LaborLaw => "قانون العمل",
        }
    }
}

impl fmt::Display for Source {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One article as stored in the merged corpus table.
///
/// `arabic_number` is kept exactly as it appears in the source table
/// (e.g. `١٢` or `١ مكرر`); it is never parsed as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub arabic_number: String,
    pub text: String,
    pub source: Source,
}

/// A row of a per-law input table. Both the processed headers and the
/// headers produced by the preparation scripts are accepted. The English
/// numeral mirror and heading columns are ignored.
#[derive(Debug, Deserialize)]
struct SourceRow {
    // The BOM aliases cover first columns from `utf-8-sig` exports
    #[serde(
        alias = "Arabic Number",
        alias = "\u{feff}Arabic Number",
        alias = "\u{feff}arabic_number"
    )]
    arabic_number: String,
    #[serde(alias = "Text")]
    text: String,
}

/// Collapse runs of whitespace (including newlines left by OCR) into single spaces
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read one labeled source table, tagging every row with `source`.
///
/// Row order is preserved; rows with empty text are kept so that row
/// positions stay stable.
#[inline]
pub fn read_source_table(path: &Path, source: Source) -> Result<Vec<Article>> {
    if !path.exists() {
        return Err(LegalError::MissingSource(path.to_path_buf()));
    }

    debug!("Reading {} source table from {}", source, path.display());

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Failed to open source table: {}", path.display()))?;

    let mut articles = Vec::new();
    for (line, row) in reader.deserialize::<SourceRow>().enumerate() {
        let row = row.map_err(|e| {
            LegalError::Corpus(format!(
                "Malformed row {} in {}: {}",
                line + 1,
                path.display(),
                e
            ))
        })?;

        let text = normalize_text(&row.text);
        let arabic_number = row.arabic_number.trim().to_string();
        if text.is_empty() {
            warn!(
                "Article {} in {} has no text",
                arabic_number,
                path.display()
            );
        }

        articles.push(Article {
            arabic_number,
            text,
            source,
        });
    }

    info!(
        "Read {} {} articles from {}",
        articles.len(),
        source,
        path.display()
    );
    Ok(articles)
}

/// Ordered article collection. Row `i` of the merged table is row `i` of
/// the vector table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    articles: Vec<Article>,
}

impl Corpus {
    /// Concatenate the constitution rows followed by the labor-law rows
    #[inline]
    pub fn from_sources(constitution: Vec<Article>, labor_law: Vec<Article>) -> Self {
        let mut articles = constitution;
        articles.extend(labor_law);
        Self { articles }
    }

    #[inline]
    pub fn from_articles(articles: Vec<Article>) -> Self {
        Self { articles }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.articles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<&Article> {
        self.articles.get(row)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Article> {
        self.articles.iter()
    }

    #[inline]
    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    #[inline]
    pub fn count_by_source(&self, source: Source) -> usize {
        self.articles.iter().filter(|a| a.source == source).count()
    }

    /// Texts in row order, as fed to the embedder
    #[inline]
    pub fn texts(&self) -> Vec<String> {
        self.articles.iter().map(|a| a.text.clone()).collect()
    }

    /// Write the merged table with header `arabic_number,text,source`
    #[inline]
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create corpus table: {}", path.display()))?;

        // Header is written explicitly so an empty corpus still carries it
        writer
            .write_record(["arabic_number", "text", "source"])
            .context("Failed to write corpus header")?;
        for article in &self.articles {
            writer
                .write_record([
                    article.arabic_number.as_str(),
                    article.text.as_str(),
                    article.source.label(),
                ])
                .context("Failed to write corpus row")?;
        }
        writer.flush()?;

        debug!(
            "Wrote {} articles to {}",
            self.articles.len(),
            path.display()
        );
        Ok(())
    }

    /// Read a merged table previously written by [`Corpus::write_csv`]
    #[inline]
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open corpus table: {}", path.display()))?;

        let articles = reader
            .deserialize::<Article>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                LegalError::Corpus(format!(
                    "Malformed corpus table {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self { articles })
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Article;
    type IntoIter = std::slice::Iter<'a, Article>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.articles.iter()
    }
}
