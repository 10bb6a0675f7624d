//! Integration tests for the search orchestrator pipeline.
//!
//! These tests drive the public API end to end with in-memory repositories,
//! embedders, and judges (no network calls). Timing tests run on a paused
//! tokio clock so they are deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oidm_search::{
    ConceptRef, ConceptRepository, Embedder, Embedding, FailurePolicy, FilterPass, Ontology,
    OntologySelector, Orchestrator, RelevanceFilter, RelevanceJudge, Repositories, SearchConfig,
    SearchError, SearchMode, SearchRequest, SearchResult,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Calls {
    text: AtomicUsize,
    vector: AtomicUsize,
    last_count: AtomicUsize,
}

impl Calls {
    fn total(&self) -> usize {
        self.text.load(Ordering::SeqCst) + self.vector.load(Ordering::SeqCst)
    }
}

/// Repository returning fixed lists after an optional delay.
struct MockRepository {
    text: Vec<SearchResult>,
    vector: Vec<SearchResult>,
    delay: Duration,
    fail: bool,
    calls: Arc<Calls>,
}

impl MockRepository {
    fn new(ontology: Ontology, calls: Arc<Calls>) -> Self {
        let system = ontology.system_name();
        Self {
            text: vec![
                SearchResult::new(system, "T1", "text one", 12.0),
                SearchResult::new(system, "T2", "text two", 4.0),
            ],
            vector: vec![
                SearchResult::new(system, "V1", "vector one", 0.92),
                SearchResult::new(system, "V2", "vector two", 0.81),
                SearchResult::new(system, "V3", "vector three", 0.70),
            ],
            delay: Duration::ZERO,
            fail: false,
            calls,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    async fn respond(&self, list: &[SearchResult], count: usize) -> Result<Vec<SearchResult>, SearchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SearchError::Repository("connection refused".into()));
        }
        Ok(list.iter().take(count).cloned().collect())
    }
}

#[async_trait]
impl ConceptRepository for MockRepository {
    async fn text_search(&self, _query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.text.fetch_add(1, Ordering::SeqCst);
        self.calls.last_count.store(count, Ordering::SeqCst);
        self.respond(&self.text, count).await
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        count: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        assert_eq!(query_vector.len(), 4, "shared query vector reaches every repository");
        self.calls.vector.fetch_add(1, Ordering::SeqCst);
        self.calls.last_count.store(count, Ordering::SeqCst);
        self.respond(&self.vector, count).await
    }
}

struct CountingEmbedder {
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(vec![0.1, 0.2, 0.3, 0.4]))
    }

    fn dimensions(&self) -> Option<usize> {
        Some(4)
    }
}

fn repositories(calls: &Arc<Calls>) -> Repositories {
    Repositories::from_fn(|o| Arc::new(MockRepository::new(o, Arc::clone(calls))))
}

fn orchestrator(calls: &Arc<Calls>, embedder: Arc<CountingEmbedder>) -> Orchestrator {
    Orchestrator::new(repositories(calls), SearchConfig::default())
        .expect("valid config")
        .with_embedder(embedder)
}

fn systems(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.system.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_ontology_is_rejected_before_io() {
    let calls = Arc::new(Calls::default());
    let embedder = CountingEmbedder::new();
    let orch = orchestrator(&calls, Arc::clone(&embedder));

    let err = orch
        .search_str("bogus_ontology", "text", "lung nodule", 5)
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::InvalidOntology(_)));
    assert!(err.is_validation());
    assert_eq!(calls.total(), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn short_query_is_rejected() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let err = orch.search_str("radlex", "text", "ab", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery(_)));

    let err = orch.search_str("radlex", "text", "  ab  ", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery(_)));
    assert_eq!(calls.total(), 0);
}

#[tokio::test]
async fn unknown_mode_is_rejected() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let err = orch
        .search_str("radlex", "bogus_mode", "lung nodule", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidMode(_)));
    assert_eq!(calls.total(), 0);
}

#[tokio::test]
async fn zero_count_is_rejected() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let err = orch.search_str("radlex", "text", "lung", 0).await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidCount(_)));
}

#[tokio::test]
async fn vector_mode_without_embedder_fails_before_io() {
    let calls = Arc::new(Calls::default());
    let orch = Orchestrator::new(repositories(&calls), SearchConfig::default()).expect("config");

    for mode in ["vector", "all"] {
        let err = orch.search_str("all", mode, "lung nodule", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)), "mode {mode}");
    }
    assert_eq!(calls.total(), 0);
}

// ---------------------------------------------------------------------------
// Fan-out, ordering, normalization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_is_embedded_once_per_call() {
    let calls = Arc::new(Calls::default());
    let embedder = CountingEmbedder::new();
    let orch = orchestrator(&calls, Arc::clone(&embedder));

    let results = orch.search_str("all", "all", "lung nodule", 5).await.expect("search");

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(calls.vector.load(Ordering::SeqCst), 3);
    assert_eq!(calls.text.load(Ordering::SeqCst), 3);
    assert_eq!(results.len(), 3 * (3 + 2));
}

#[tokio::test]
async fn text_mode_never_embeds() {
    let calls = Arc::new(Calls::default());
    let embedder = CountingEmbedder::new();
    let orch = orchestrator(&calls, Arc::clone(&embedder));

    orch.search_str("all", "text", "lung nodule", 5).await.expect("search");
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(calls.vector.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_ontologies_merge_in_registry_order_vector_first() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let results = orch.search_str("all", "all", "lung nodule", 5).await.expect("search");

    let mut expected = Vec::new();
    for system in ["SNOMEDCT", "RADLEX", "ANATOMICLOCATIONS"] {
        expected.extend(std::iter::repeat(system).take(5));
    }
    assert_eq!(systems(&results), expected);

    let radlex_codes: Vec<&str> = results[5..10].iter().map(|r| r.code.as_str()).collect();
    assert_eq!(radlex_codes, vec!["V1", "V2", "V3", "T1", "T2"]);
}

#[tokio::test]
async fn each_method_list_is_normalized_on_its_own() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let results = orch.search_str("radlex", "all", "lung nodule", 5).await.expect("search");
    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();

    // vector list: max and min map to 1 and 0
    assert!((scores[0] - 1.0).abs() < 1e-12);
    assert!(scores[2].abs() < 1e-12);
    // text list: independently rescaled
    assert!((scores[3] - 1.0).abs() < 1e-12);
    assert!(scores[4].abs() < 1e-12);
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
}

#[tokio::test]
async fn raw_scores_pass_through_when_normalization_is_off() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let request = SearchRequest::new(
        OntologySelector::One(Ontology::Radlex),
        SearchMode::Text,
        "lung nodule",
    )
    .expect("request")
    .with_normalize(false);

    let results = orch.search(&request).await.expect("search");
    assert!((results[0].score - 12.0).abs() < f64::EPSILON);
    assert!((results[1].score - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn count_caps_each_method_list() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let results = orch.search_str("snomedct", "vector", "lung nodule", 2).await.expect("search");
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn configured_default_count_reaches_repository() {
    let calls = Arc::new(Calls::default());
    let config = SearchConfig {
        default_count: 5,
        ..Default::default()
    };
    let orch = Orchestrator::new(repositories(&calls), config).expect("config");

    let request = SearchRequest::parse("radlex", "text", "lung nodule").expect("request");
    orch.search(&request).await.expect("search");
    assert_eq!(calls.last_count.load(Ordering::SeqCst), 5);

    let request = request.with_count(2).expect("count");
    orch.search(&request).await.expect("search");
    assert_eq!(calls.last_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn configured_normalize_applies_without_explicit_flag() {
    let calls = Arc::new(Calls::default());
    let config = SearchConfig {
        normalize: false,
        ..Default::default()
    };
    let orch = Orchestrator::new(repositories(&calls), config).expect("config");

    let results = orch.search_str("radlex", "text", "lung nodule", 5).await.expect("search");
    assert!((results[0].score - 12.0).abs() < f64::EPSILON);

    let request = SearchRequest::parse("radlex", "text", "lung nodule")
        .expect("request")
        .with_normalize(true);
    let results = orch.search(&request).await.expect("search");
    assert!((results[0].score - 1.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn both_methods_run_concurrently() {
    let calls = Arc::new(Calls::default());
    let delay = Duration::from_millis(300);
    let repos = Repositories::from_fn(|o| {
        Arc::new(MockRepository::new(o, Arc::clone(&calls)).delayed(delay))
    });
    let orch = Orchestrator::new(repos, SearchConfig::default())
        .expect("config")
        .with_embedder(CountingEmbedder::new());

    let start = tokio::time::Instant::now();
    orch.search_str("all", "all", "lung nodule", 5).await.expect("search");
    let elapsed = start.elapsed();

    assert!(elapsed < delay * 2, "expected concurrent calls, took {elapsed:?}");
    assert_eq!(calls.total(), 6);
}

#[tokio::test(start_paused = true)]
async fn text_and_vector_run_concurrently_within_one_ontology() {
    let calls = Arc::new(Calls::default());
    let delay = Duration::from_millis(300);
    let repos = Repositories::from_fn(|o| {
        Arc::new(MockRepository::new(o, Arc::clone(&calls)).delayed(delay))
    });
    let orch = Orchestrator::new(repos, SearchConfig::default())
        .expect("config")
        .with_embedder(CountingEmbedder::new());

    let start = tokio::time::Instant::now();
    let results = orch.search_str("radlex", "all", "lung nodule", 5).await.expect("search");
    let elapsed = start.elapsed();

    assert!(elapsed < delay * 2, "expected concurrent methods, took {elapsed:?}");
    assert_eq!(calls.text.load(Ordering::SeqCst), 1);
    assert_eq!(calls.vector.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 5);
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

fn repositories_with_failing_radlex(calls: &Arc<Calls>) -> Repositories {
    Repositories::from_fn(|o| {
        let repo = MockRepository::new(o, Arc::clone(calls));
        let repo = if o == Ontology::Radlex { repo.failing() } else { repo };
        Arc::new(repo)
    })
}

#[tokio::test]
async fn one_failing_ontology_fails_the_call_by_default() {
    let calls = Arc::new(Calls::default());
    let orch = Orchestrator::new(repositories_with_failing_radlex(&calls), SearchConfig::default())
        .expect("config");

    let err = orch.search_str("all", "text", "lung nodule", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::Repository(_)));
    assert!(err.is_dependency());
}

#[tokio::test]
async fn skip_failed_returns_surviving_ontologies() {
    let calls = Arc::new(Calls::default());
    let config = SearchConfig {
        failure_policy: FailurePolicy::SkipFailed,
        ..Default::default()
    };
    let orch = Orchestrator::new(repositories_with_failing_radlex(&calls), config).expect("config");

    let results = orch.search_str("all", "text", "lung nodule", 5).await.expect("partial");
    let mut seen = systems(&results);
    seen.dedup();
    assert_eq!(seen, vec!["SNOMEDCT", "ANATOMICLOCATIONS"]);
}

#[tokio::test]
async fn skip_failed_does_not_hide_single_ontology_errors() {
    let calls = Arc::new(Calls::default());
    let config = SearchConfig {
        failure_policy: FailurePolicy::SkipFailed,
        ..Default::default()
    };
    let orch = Orchestrator::new(repositories_with_failing_radlex(&calls), config).expect("config");

    let err = orch.search_str("radlex", "text", "lung nodule", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::Repository(_)));
}

#[tokio::test]
async fn skip_failed_with_everything_down() {
    let calls = Arc::new(Calls::default());
    let repos = Repositories::from_fn(|o| Arc::new(MockRepository::new(o, Arc::clone(&calls)).failing()));
    let config = SearchConfig {
        failure_policy: FailurePolicy::SkipFailed,
        ..Default::default()
    };
    let orch = Orchestrator::new(repos, config).expect("config");

    let err = orch.search_str("all", "text", "lung nodule", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::AllOntologiesFailed(_)));
}

#[tokio::test(start_paused = true)]
async fn slow_repository_times_out() {
    let calls = Arc::new(Calls::default());
    let repos = Repositories::from_fn(|o| {
        Arc::new(MockRepository::new(o, Arc::clone(&calls)).delayed(Duration::from_secs(30)))
    });
    let config = SearchConfig {
        call_timeout_seconds: 1,
        ..Default::default()
    };
    let orch = Orchestrator::new(repos, config).expect("config");

    let err = orch.search_str("snomedct", "text", "lung nodule", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::Timeout(_)));
    assert!(err.to_string().contains("snomedct text search"));
}

#[tokio::test]
async fn mismatched_embedding_dimensions_fail() {
    struct WrongSize;

    #[async_trait]
    impl Embedder for WrongSize {
        async fn embed(&self, _text: &str) -> Result<Embedding, SearchError> {
            Ok(Arc::new(vec![0.0; 3]))
        }

        fn dimensions(&self) -> Option<usize> {
            Some(1536)
        }
    }

    let calls = Arc::new(Calls::default());
    let orch = Orchestrator::new(repositories(&calls), SearchConfig::default())
        .expect("config")
        .with_embedder(Arc::new(WrongSize));

    let err = orch.search_str("radlex", "vector", "lung nodule", 5).await.unwrap_err();
    assert!(matches!(err, SearchError::Embedding(_)));
    assert_eq!(calls.total(), 0);
}

// ---------------------------------------------------------------------------
// Fused display path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fused_search_merges_every_ontology() {
    let calls = Arc::new(Calls::default());
    let embedder = CountingEmbedder::new();
    let orch = orchestrator(&calls, Arc::clone(&embedder));

    let rows = orch
        .search_fused(Ontology::all(), "lung nodule", 5)
        .await
        .expect("fused");

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(rows.len(), 3 * 5);
    for pair in rows.windows(2) {
        assert!(pair[0].combined_score >= pair[1].combined_score);
    }
    // raw vector 0.92 * 20 outranks raw text 12.0
    assert_eq!(rows[0].code, "V1");
    assert!((rows[0].combined_score - 18.4).abs() < 1e-9);
}

#[tokio::test]
async fn fused_search_deduplicates_requested_ontologies() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());

    let rows = orch
        .search_fused(&[Ontology::Radlex, Ontology::Radlex], "lung nodule", 5)
        .await
        .expect("fused");
    assert_eq!(rows.len(), 5);
    assert_eq!(calls.total(), 2);
}

// ---------------------------------------------------------------------------
// Relevance filter
// ---------------------------------------------------------------------------

/// Marks `T1` as matched and every `V*` as related.
struct CodeJudge {
    calls: AtomicUsize,
}

#[async_trait]
impl RelevanceJudge for CodeJudge {
    async fn judge(
        &self,
        pass: FilterPass,
        candidates: &[ConceptRef],
        _query: &str,
    ) -> Result<Vec<ConceptRef>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(candidates
            .iter()
            .filter(|c| match pass {
                FilterPass::Matched => c.code == "T1",
                FilterPass::Related => c.code.starts_with('V'),
            })
            .cloned()
            .collect())
    }
}

#[tokio::test]
async fn search_then_filter() {
    let calls = Arc::new(Calls::default());
    let orch = orchestrator(&calls, CountingEmbedder::new());
    let judge = Arc::new(CodeJudge {
        calls: AtomicUsize::new(0),
    });
    let filter = RelevanceFilter::new(judge.clone(), orch.config());

    let request = SearchRequest::parse("radlex", "all", "lung nodule").expect("request");
    let (results, filtered) = orch.search_and_filter(&request, &filter).await.expect("filter");

    assert_eq!(results.len(), 5);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 2);
    assert_eq!(filtered.matched.len(), 1);
    assert_eq!(filtered.matched[0].code, "T1");
    assert_eq!(filtered.related.len(), 3);
}

#[tokio::test]
async fn filter_with_no_candidates_skips_the_judge() {
    let judge = Arc::new(CodeJudge {
        calls: AtomicUsize::new(0),
    });
    let filter = RelevanceFilter::new(judge.clone(), &SearchConfig::default());

    let filtered = filter.filter(&[], "lung nodule").await.expect("empty");
    assert!(filtered.is_empty());
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
}
