use super::*;
use crate::corpus::Source;
use crate::index::{ArticleIndex, SourceTables, StorePaths};
use std::fs;
use tempfile::TempDir;

/// Vector of character-class counts: alif, lam, meem
struct LetterCountEmbedder;

impl Embedder for LetterCountEmbedder {
    fn model_id(&self) -> &str {
        "letter-count"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let count = |c: char| text.chars().filter(|&x| x == c).count() as f32;
        Ok(vec![count('ا'), count('ل'), count('م')])
    }
}

fn k(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).expect("non-zero")
}

async fn build_retriever(constitution: &str, labor_law: &str) -> (Retriever, TempDir) {
    let dir = TempDir::new().expect("should create temp dir");
    let sources = SourceTables {
        constitution: dir.path().join("constitution.csv"),
        labor_law: dir.path().join("labor.csv"),
    };
    fs::write(&sources.constitution, constitution).expect("should write constitution table");
    fs::write(&sources.labor_law, labor_law).expect("should write labor table");

    let mut index =
        ArticleIndex::open(StorePaths::new(dir.path().join("store"))).expect("should open");
    index
        .build(&sources, &LetterCountEmbedder)
        .await
        .expect("build should succeed");
    index
        .load(&LetterCountEmbedder)
        .await
        .expect("load should succeed");
    let loaded = index.into_loaded().expect("index is loaded");

    (Retriever::new(Box::new(LetterCountEmbedder), Some(loaded)), dir)
}

#[tokio::test]
async fn search_without_index_is_not_ready() {
    let retriever = Retriever::new(Box::new(LetterCountEmbedder), None);

    assert!(!retriever.is_ready());
    assert!(retriever.index().is_none());
    assert!(matches!(
        retriever.search("ما هو نظام الحكم؟", k(5)).await,
        Err(LegalError::NotReady)
    ));
}

#[tokio::test]
async fn single_article_is_returned_for_k_one() {
    let (retriever, _dir) = build_retriever(
        "arabic_number,text\n١,\"المادة الأولى: جمهورية مصر العربية دولة ذات سيادة، نظامها جمهورى ديمقراطى\"\n",
        "arabic_number,text\n",
    )
    .await;

    let results = retriever
        .search("ما هو نظام الحكم؟", k(1))
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].row, 0);
    assert_eq!(results[0].article.source, Source::Constitution);
    assert_eq!(results[0].article.arabic_number, "١");
}

#[tokio::test]
async fn empty_corpus_returns_nothing() {
    let (retriever, _dir) =
        build_retriever("arabic_number,text\n", "arabic_number,text\n").await;

    assert!(retriever.is_ready());
    assert_eq!(retriever.index().map(LoadedIndex::len), Some(0));
    let results = retriever
        .search("ما هي مدة الإجازة السنوية؟", k(5))
        .await
        .expect("search should succeed");
    assert!(results.is_empty());
}

#[tokio::test]
async fn results_are_bounded_and_nearest_first() {
    let (retriever, _dir) = build_retriever(
        "arabic_number,text\n١,ا\n٢,ل\n",
        "arabic_number,text\n١,م\n٢,مم\n",
    )
    .await;

    let results = retriever
        .search("ممم", k(10))
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].row, 3);
    assert_eq!(results[0].article.source, Source::LaborLaw);
    assert!(
        results
            .windows(2)
            .all(|pair| pair[0].distance <= pair[1].distance)
    );
    assert!(results.iter().all(|r| r.row < 4));
}
