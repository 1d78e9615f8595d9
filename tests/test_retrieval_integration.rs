//! Integration Test: Hybrid Retrieval & Reranking
//!
//! Tests the keyword + vector pipeline end to end with a small realistic
//! corpus and a deterministic concept embedder.

use codehound::elements::{CodeElement, ElementKind};
use codehound::embedding::{EmbeddingError, EmbeddingProvider};
use codehound::retrieval::{HybridConfig, HybridRetriever, Provenance, SearchError};
use codehound::tools::{RepoFs, ToolConfig, ToolExecutor};
use std::sync::Arc;
use tempfile::TempDir;

/// One dimension per concept; each dimension counts the concept's words
const CONCEPTS: [&[&str]; 3] = [
    &["parse", "config", "toml", "settings"],
    &["http", "server", "port"],
    &["database", "sql", "rows", "query"],
];

struct ConceptEmbedder;

impl ConceptEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        CONCEPTS
            .iter()
            .map(|words| words.iter().map(|w| lower.matches(w).count() as f32).sum())
            .collect()
    }
}

impl EmbeddingProvider for ConceptEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                if text.contains("broken") {
                    None
                } else {
                    Some(Self::vector(text))
                }
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        CONCEPTS.len()
    }

    fn model_name(&self) -> &str {
        "concepts"
    }
}

fn corpus() -> Vec<CodeElement> {
    vec![
        CodeElement::new("c1", ElementKind::Function, "parse_config", "src/config.rs")
            .with_lines(10, 14)
            .with_language("rust")
            .with_code("fn parse_config(text: &str) -> Config {\n    toml::from_str(text)\n}"),
        CodeElement::new("c2", ElementKind::Class, "HttpServer", "src/server.rs")
            .with_lines(1, 5)
            .with_language("rust")
            .with_code("struct HttpServer {\n    port: u16,\n}"),
        CodeElement::new("c3", ElementKind::Function, "run_query", "src/db.rs")
            .with_lines(20, 30)
            .with_language("rust")
            .with_code("fn run_query(sql: &str) -> Rows {\n    todo()\n}"),
        CodeElement::new("c4", ElementKind::Documentation, "Configuration guide", "docs/config.md")
            .with_lines(1, 40)
            .with_language("markdown")
            .with_code("How to write the settings file"),
        CodeElement::new("c5", ElementKind::Function, "start_server", "src/server.rs")
            .with_lines(7, 12)
            .with_language("rust")
            .with_code("fn start_server(port: u16) {\n    listen(port)\n}"),
        CodeElement::new("c6", ElementKind::File, "README.md", "README.md")
            .with_lines(1, 3)
            .with_language("markdown")
            .with_code("# Demo service\nRun it with cargo."),
    ]
}

#[test]
fn test_keyword_only_retrieval() {
    println!("\n=== Keyword-only Retrieval ===\n");

    let mut retriever = HybridRetriever::new(HybridConfig::default());
    let report = retriever.index_elements(&corpus(), None).unwrap();
    assert_eq!(report.indexed, 6);
    assert_eq!(report.embedded, 0);
    assert!(!retriever.has_vectors());

    let results = retriever.search("parse config", None, 5);
    for result in &results {
        println!(
            "  {:.3} {} {}",
            result.score,
            result.element.name,
            result.element.path
        );
    }

    assert!(!results.is_empty());
    assert_eq!(results[0].element.id, "c1");
    assert_eq!(results[0].provenance, Provenance::Keyword);
    assert!(results.iter().all(|r| r.provenance == Provenance::Keyword));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_hybrid_retrieval_with_embeddings() {
    println!("\n=== Hybrid Retrieval ===\n");

    let embedder = ConceptEmbedder;
    let mut retriever = HybridRetriever::new(HybridConfig::default());
    let report = retriever.index_elements(&corpus(), Some(&embedder)).unwrap();
    assert_eq!(report.embedded, 6);

    // Found by both indexes
    let query = "database query";
    let vector = embedder.embed(query).unwrap();
    let results = retriever.search(query, Some(vector.as_slice()), 3);
    assert_eq!(results[0].element.id, "c3");
    assert_eq!(results[0].provenance, Provenance::Hybrid);

    // No element mentions "database": only the vector index can find it
    let query = "database";
    let vector = embedder.embed(query).unwrap();
    let results = retriever.search(query, Some(vector.as_slice()), 3);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].element.id, "c3");
    assert_eq!(results[0].provenance, Provenance::Semantic);

    println!("✓ Hybrid and semantic-only hits resolved");
}

#[test]
fn test_custom_weights_favor_keywords() {
    let embedder = ConceptEmbedder;
    let config = HybridConfig::with_weights(1.0, 0.0).unwrap();
    let mut retriever = HybridRetriever::new(config);
    retriever.index_elements(&corpus(), Some(&embedder)).unwrap();

    let vector = embedder.embed("database").unwrap();
    let results = retriever.search("database", Some(vector.as_slice()), 3);
    assert!(results.iter().all(|r| r.score == 0.0));

    assert!(matches!(
        HybridConfig::with_weights(-1.0, 0.5),
        Err(SearchError::InvalidWeights { .. })
    ));
}

#[test]
fn test_partial_embedding_failure_keeps_keyword_index() {
    let mut elements = corpus();
    elements.push(
        CodeElement::new("c7", ElementKind::Function, "broken_handler", "src/broken.rs")
            .with_lines(1, 3)
            .with_code("fn broken_handler() {}"),
    );

    let mut retriever = HybridRetriever::new(HybridConfig::default());
    match retriever.index_elements(&elements, Some(&ConceptEmbedder)) {
        Err(SearchError::EmbeddingFailed { failed, total, .. }) => {
            assert_eq!(failed, 1);
            assert_eq!(total, 7);
        }
        other => panic!("expected partial embedding failure, got {:?}", other),
    }

    assert_eq!(retriever.len(), 7);
    assert!(retriever.has_vectors());
    let results = retriever.search("broken handler", None, 3);
    assert_eq!(results[0].element.id, "c7");
}

#[test]
fn test_reindexing_skips_known_ids() {
    let mut retriever = HybridRetriever::new(HybridConfig::default());
    retriever.index_elements(&corpus(), None).unwrap();

    let report = retriever.index_elements(&corpus(), None).unwrap();
    assert_eq!(report.indexed, 0);
    assert_eq!(report.skipped_duplicates, 6);
    assert_eq!(retriever.len(), 6);
}

#[test]
fn test_executor_query_uses_embedder() {
    let temp = TempDir::new().unwrap();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(ConceptEmbedder);

    let mut retriever = HybridRetriever::new(HybridConfig::default());
    retriever
        .index_elements(&corpus(), Some(embedder.as_ref()))
        .unwrap();

    let executor = ToolExecutor::new(
        Arc::new(retriever),
        RepoFs::new(temp.path()),
        ToolConfig::default(),
    )
    .with_embedder(embedder);

    let result = executor.execute("query", "database").unwrap();
    assert_eq!(result.elements.len(), 1);
    assert_eq!(result.elements[0].id, "c3");
    assert!(result.text.contains("run_query"));
}

#[cfg(feature = "local-embeddings")]
#[test]
#[ignore] // Requires model download
fn test_local_model_hybrid_search() {
    use codehound::embedding::FastEmbedProvider;

    println!("\n=== Local Model Hybrid Retrieval ===\n");

    let provider =
        FastEmbedProvider::new("all-MiniLM-L6-v2").expect("Failed to initialize embedding provider");
    println!("✓ Embedding provider initialized ({}D)", provider.dimension());

    let mut retriever = HybridRetriever::new(HybridConfig::default());
    let report = retriever.index_elements(&corpus(), Some(&provider)).unwrap();
    assert_eq!(report.embedded, 6);

    let query = "where does the web server listen on a port";
    let vector = provider.embed(query).unwrap();
    let results = retriever.search(query, Some(vector.as_slice()), 3);
    for result in &results {
        println!(
            "  {:.3} {} {}",
            result.score,
            result.element.name,
            result.element.path
        );
    }

    assert!(results
        .iter()
        .any(|r| r.element.id == "c2" || r.element.id == "c5"));
}
