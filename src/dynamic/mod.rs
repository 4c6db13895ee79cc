//! Live search against an authoritative legal source, backfilling the
//! knowledge store with what it finds.

pub mod cache;
pub mod source;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::knowledge::ingest::ingest_page;
use crate::knowledge::types::{DocId, DocumentMeta, RetrievalResult, SourceType};
use crate::knowledge::KnowledgeStore;
use crate::text::{html_to_text, page_title, ChunkConfig};
use cache::{jaccard, salient_terms, SearchCache};
use source::{discover_legal_links, LegalSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicSearchConfig {
    /// Search result URLs followed per question.
    pub max_results: usize,
    /// Pages fetched per result: the result itself plus discovered links.
    pub max_pages_per_result: usize,
    /// Pause before every page fetch.
    pub request_delay: Duration,
    /// Term overlap with a previous search's question that counts as a cache hit.
    pub cache_overlap: f32,
    /// Passages returned as answer context.
    pub response_k: usize,
    pub chunking: ChunkConfig,
}

impl Default for DynamicSearchConfig {
    fn default() -> Self {
        Self {
            max_results: 3,
            max_pages_per_result: 2,
            request_delay: Duration::from_secs(1),
            cache_overlap: 0.6,
            response_k: 5,
            chunking: ChunkConfig::default(),
        }
    }
}

/// Where the passages handed to answer assembly came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOrigin {
    Local,
    /// Fetched from the live source during this request.
    FreshDynamic,
    /// Reused from an earlier dynamic search.
    CachedDynamic,
}

#[derive(Debug, Clone)]
pub struct DynamicContext {
    pub origin: ContextOrigin,
    pub results: Vec<RetrievalResult>,
    pub pages_fetched: usize,
    pub documents_added: usize,
}

pub struct DynamicSearchEngine {
    store: Arc<KnowledgeStore>,
    source: Arc<dyn LegalSource>,
    cache: SearchCache,
    config: DynamicSearchConfig,
}

#[derive(Default)]
struct CrawlOutcome {
    ids: Vec<DocId>,
    pages_fetched: usize,
    documents_added: usize,
}

impl DynamicSearchEngine {
    pub fn new(
        store: Arc<KnowledgeStore>,
        source: Arc<dyn LegalSource>,
        config: DynamicSearchConfig,
    ) -> Self {
        Self {
            store,
            source,
            cache: SearchCache::new(),
            config,
        }
    }

    /// Find context for `question` among earlier dynamic results or on the
    /// live source. Never fails: every problem degrades to `(None, false)`.
    pub async fn search_and_add_to_knowledge_base(
        &self,
        question: &str,
    ) -> (Option<DynamicContext>, bool) {
        if question.trim().is_empty() {
            return (None, false);
        }

        if let Some(context) = self.check_cache(question).await {
            info!(
                source = self.source.name(),
                passages = context.results.len(),
                "dynamic search served from cache"
            );
            return (Some(context), true);
        }

        let outcome = self.crawl(question).await;
        if outcome.ids.is_empty() {
            info!(source = self.source.name(), "dynamic search found nothing usable");
            return (None, false);
        }

        let fresh: HashSet<&DocId> = outcome.ids.iter().collect();
        let results = self
            .store
            .query_where(question, self.config.response_k, |d| fresh.contains(&d.id))
            .await;
        if results.is_empty() {
            info!(
                pages = outcome.pages_fetched,
                added = outcome.documents_added,
                "fetched pages are not relevant to the question"
            );
            return (None, false);
        }

        self.cache.insert(question, outcome.ids.clone()).await;
        info!(
            source = self.source.name(),
            pages = outcome.pages_fetched,
            added = outcome.documents_added,
            passages = results.len(),
            "dynamic search complete"
        );
        (
            Some(DynamicContext {
                origin: ContextOrigin::FreshDynamic,
                results,
                pages_fetched: outcome.pages_fetched,
                documents_added: outcome.documents_added,
            }),
            true,
        )
    }

    async fn check_cache(&self, question: &str) -> Option<DynamicContext> {
        let ids: HashSet<DocId> = match self.cache.get(question).await {
            Some(doc_ids) => doc_ids.into_iter().collect(),
            None => {
                let terms = salient_terms(question);
                if terms.is_empty() {
                    return None;
                }
                let overlap = self.config.cache_overlap;
                self.store
                    .documents_where(|d| {
                        d.meta.source_type == SourceType::ScrapeDynamic
                            && jaccard(&d.meta.search_terms, &terms) >= overlap
                    })
                    .await
                    .into_iter()
                    .map(|d| d.id)
                    .collect()
            }
        };
        if ids.is_empty() {
            return None;
        }

        let results = self
            .store
            .query_where(question, self.config.response_k, |d| ids.contains(&d.id))
            .await;
        if results.is_empty() {
            return None;
        }
        self.cache.insert(question, ids.into_iter().collect()).await;
        Some(DynamicContext {
            origin: ContextOrigin::CachedDynamic,
            results,
            pages_fetched: 0,
            documents_added: 0,
        })
    }

    async fn crawl(&self, question: &str) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        let result_urls = match self.source.search(question, self.config.max_results).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(source = self.source.name(), "Search request failed: {}", e);
                return outcome;
            }
        };
        debug!(results = result_urls.len(), "search results received");

        let terms = salient_terms(question);
        let mut visited = HashSet::new();
        for result_url in result_urls.into_iter().take(self.config.max_results) {
            let mut queue = VecDeque::from([result_url]);
            // failed fetches count too, so dead links cannot stretch a search
            let mut attempts = 0;
            while attempts < self.config.max_pages_per_result {
                let Some(url) = queue.pop_front() else { break };
                if !visited.insert(url.clone()) {
                    continue;
                }

                attempts += 1;
                tokio::time::sleep(self.config.request_delay).await;
                let html = match self.source.fetch(&url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(url = %url, "Skipping page: {}", e);
                        continue;
                    }
                };
                outcome.pages_fetched += 1;

                let mut template = DocumentMeta::new(url.clone(), SourceType::ScrapeDynamic);
                template.title = page_title(&html);
                template.search_query = Some(question.to_string());
                template.search_terms = terms.clone();

                let text = html_to_text(html.as_bytes());
                let page = ingest_page(&self.store, &text, &template, self.config.chunking).await;
                debug!(url = %url, chunks = page.ids.len(), added = page.added, "page ingested");
                outcome.documents_added += page.added;
                outcome.ids.extend(page.ids);

                queue.extend(discover_legal_links(&html, &url));
            }
        }
        outcome
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::FetchError;
    use crate::knowledge::embed::HashedNgramEmbedder;
    use crate::knowledge::DEFAULT_RELEVANCE_THRESHOLD;

    pub(crate) const QUESTION: &str = "Как подать иск в суд?";

    /// In-memory legal source counting its network calls.
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub results: Vec<String>,
        pub pages: HashMap<String, String>,
        pub fail_search: bool,
        pub searches: AtomicUsize,
        pub fetches: AtomicUsize,
    }

    impl StubSource {
        pub(crate) fn with_court_pages() -> Self {
            let mut pages = HashMap::new();
            pages.insert(
                "https://pravo.by/document/1".to_string(),
                "<html><head><title>Подача иска</title></head><body>\
                 <p>Как подать иск в суд: иск подается в суд в письменной форме.</p>\
                 <a href=\"/document/2\">далее</a></body></html>"
                    .to_string(),
            );
            pages.insert(
                "https://pravo.by/document/2".to_string(),
                "<html><body><p>Исковое заявление в суд подается с копиями для ответчика.</p>\
                 </body></html>"
                    .to_string(),
            );
            Self {
                results: vec!["https://pravo.by/document/1".to_string()],
                pages,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LegalSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<String>, FetchError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.fail_search {
                return Err(FetchError::Status {
                    url: "https://pravo.by/search/".to_string(),
                    status: 503,
                });
            }
            Ok(self.results.iter().take(limit).cloned().collect())
        }

        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    pub(crate) fn fast_config() -> DynamicSearchConfig {
        DynamicSearchConfig {
            request_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub(crate) async fn open_store(dir: &std::path::Path) -> Arc<KnowledgeStore> {
        Arc::new(
            KnowledgeStore::open(
                dir,
                Arc::new(HashedNgramEmbedder::default()),
                DEFAULT_RELEVANCE_THRESHOLD,
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fresh_search_then_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let source = Arc::new(StubSource::with_court_pages());
        let engine = DynamicSearchEngine::new(store.clone(), source.clone(), fast_config());

        let (context, ok) = engine.search_and_add_to_knowledge_base(QUESTION).await;
        assert!(ok);
        let context = context.unwrap();
        assert_eq!(context.origin, ContextOrigin::FreshDynamic);
        assert_eq!(context.pages_fetched, 2);
        assert!(context.documents_added >= 1);
        assert!(!context.results.is_empty());
        assert!(context
            .results
            .iter()
            .all(|r| r.document.meta.source_type == SourceType::ScrapeDynamic));
        assert_eq!(
            context.results[0].document.meta.search_query.as_deref(),
            Some(QUESTION)
        );
        assert_eq!(source.searches.load(Ordering::SeqCst), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        let (again, ok) = engine.search_and_add_to_knowledge_base(QUESTION).await;
        assert!(ok);
        assert_eq!(again.unwrap().origin, ContextOrigin::CachedDynamic);
        assert_eq!(source.searches.load(Ordering::SeqCst), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stored_dynamic_documents_serve_rephrased_question() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let source = Arc::new(StubSource::with_court_pages());
        let first = DynamicSearchEngine::new(store.clone(), source.clone(), fast_config());
        first.search_and_add_to_knowledge_base(QUESTION).await;

        // a fresh engine has an empty in-memory cache but shares the store
        let second = DynamicSearchEngine::new(store, source.clone(), fast_config());
        let (context, ok) = second.search_and_add_to_knowledge_base("Подать иск в суд").await;
        assert!(ok);
        assert_eq!(context.unwrap().origin, ContextOrigin::CachedDynamic);
        assert_eq!(source.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_failure_degrades_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let source = Arc::new(StubSource {
            fail_search: true,
            ..Default::default()
        });
        let engine = DynamicSearchEngine::new(store.clone(), source, fast_config());
        let (context, ok) = engine.search_and_add_to_knowledge_base(QUESTION).await;
        assert!(context.is_none());
        assert!(!ok);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_pages_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let mut stub = StubSource::with_court_pages();
        stub.results.insert(0, "https://pravo.by/document/missing".to_string());
        let source = Arc::new(stub);
        let engine = DynamicSearchEngine::new(store, source.clone(), fast_config());

        let (context, ok) = engine.search_and_add_to_knowledge_base(QUESTION).await;
        assert!(ok);
        assert_eq!(context.unwrap().pages_fetched, 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dead_links_count_toward_page_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let mut stub = StubSource::default();
        stub.results = vec!["https://pravo.by/document/hub".to_string()];
        stub.pages.insert(
            "https://pravo.by/document/hub".to_string(),
            "<html><body><p>Как подать иск в суд: иск подается в суд в письменной форме.</p>\
             <a href=\"/document/gone1\">1</a><a href=\"/document/gone2\">2</a>\
             <a href=\"/document/gone3\">3</a><a href=\"/document/gone4\">4</a></body></html>"
                .to_string(),
        );
        let source = Arc::new(stub);
        let config = DynamicSearchConfig {
            max_pages_per_result: 3,
            ..fast_config()
        };
        let engine = DynamicSearchEngine::new(store, source.clone(), config);

        let (context, ok) = engine.search_and_add_to_knowledge_base(QUESTION).await;
        assert!(ok);
        assert_eq!(context.unwrap().pages_fetched, 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_page_ceiling_and_politeness_delay() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        let source = Arc::new(StubSource::with_court_pages());
        let config = DynamicSearchConfig {
            max_pages_per_result: 1,
            request_delay: Duration::from_millis(40),
            ..Default::default()
        };
        let engine = DynamicSearchEngine::new(store, source.clone(), config);

        let started = std::time::Instant::now();
        engine.search_and_add_to_knowledge_base(QUESTION).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
