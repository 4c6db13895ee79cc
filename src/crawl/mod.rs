//! Scheduled re-crawls of static legal pages that only re-ingest what changed.

pub mod tracker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::dynamic::source::LegalSource;
use crate::knowledge::ingest::ingest_page;
use crate::knowledge::types::{DocId, DocumentMeta, SourceType};
use crate::knowledge::KnowledgeStore;
use crate::text::{clean_text, html_to_text, page_title, ChunkConfig};
use tracker::{CrawlDiff, CrawlTracker};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub request_delay: Duration,
    /// Delete stored chunks of pages that disappeared instead of only flagging them.
    pub purge_deleted: bool,
    pub chunking: ChunkConfig,
    pub max_pages: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(1),
            purge_deleted: false,
            chunking: ChunkConfig::default(),
            max_pages: 200,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CrawlReport {
    pub diff: CrawlDiff,
    pub fetched: usize,
    pub failed: Vec<String>,
    /// Fetched pages whose chunks could not all be stored; retried next pass.
    pub ingest_failed: Vec<String>,
    pub documents_added: usize,
    pub documents_removed: usize,
}

pub struct IncrementalCrawler {
    store: Arc<KnowledgeStore>,
    source: Arc<dyn LegalSource>,
    tracker: CrawlTracker,
    options: CrawlOptions,
}

impl IncrementalCrawler {
    pub fn new(
        store: Arc<KnowledgeStore>,
        source: Arc<dyn LegalSource>,
        tracker: CrawlTracker,
        options: CrawlOptions,
    ) -> Self {
        Self {
            store,
            source,
            tracker,
            options,
        }
    }

    /// Fetch every seed URL, diff against the previous pass, and re-ingest
    /// new and changed pages. A URL that fails to fetch counts as not seen.
    /// The crawl state is written once, after the store has been updated.
    pub async fn run(&self, seeds: &[String]) -> Result<CrawlReport> {
        let mut report = CrawlReport::default();
        let mut seen = HashSet::new();
        let mut hashes = HashMap::new();
        let mut pages: HashMap<String, (String, Option<String>)> = HashMap::new();

        for url in seeds.iter().take(self.options.max_pages) {
            if seen.contains(url) {
                continue;
            }
            tokio::time::sleep(self.options.request_delay).await;
            match self.source.fetch(url).await {
                Ok(html) => {
                    let text = html_to_text(html.as_bytes());
                    let hash = blake3::hash(clean_text(&text).as_bytes()).to_hex().to_string();
                    seen.insert(url.clone());
                    hashes.insert(url.clone(), hash);
                    pages.insert(url.clone(), (text, page_title(&html)));
                    report.fetched += 1;
                }
                Err(e) => {
                    warn!(url = %url, "Crawl fetch failed: {}", e);
                    report.failed.push(url.clone());
                }
            }
        }

        let diff = self.tracker.diff_and_update(&seen, &hashes).await;

        for url in diff.to_ingest() {
            let Some((text, title)) = pages.get(url) else {
                continue;
            };
            let previous = self
                .tracker
                .get(url)
                .await
                .map(|r| r.chunk_ids)
                .unwrap_or_default();
            let mut template = DocumentMeta::new(url.clone(), SourceType::ScrapeStatic);
            template.title = title.clone();
            let page = ingest_page(&self.store, text, &template, self.options.chunking).await;
            report.documents_added += page.added;

            if page.is_complete() {
                let stale: Vec<DocId> = previous
                    .into_iter()
                    .filter(|id| !page.ids.contains(id))
                    .collect();
                self.tracker.set_chunk_ids(url, page.ids).await;
                report.documents_removed += self.remove_unreferenced(&stale).await;
            } else {
                // keep the old chunks until a later pass stores the whole page
                warn!(
                    url = %url,
                    stored = page.ids.len(),
                    blocks = page.blocks,
                    "page only partly stored, will retry next pass"
                );
                let mut ids = previous;
                for id in page.ids {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                self.tracker.invalidate(url, ids).await;
                report.ingest_failed.push(url.clone());
            }
        }

        for url in &diff.deleted {
            if self.options.purge_deleted {
                let ids = self.tracker.get(url).await.map(|r| r.chunk_ids).unwrap_or_default();
                self.tracker.set_chunk_ids(url, Vec::new()).await;
                let removed = self.remove_unreferenced(&ids).await;
                report.documents_removed += removed;
                info!(url = %url, removed, "purged chunks of deleted page");
            } else {
                warn!(url = %url, "page no longer reachable, chunks kept for review");
            }
        }

        self.tracker.save().await?;

        info!(
            fetched = report.fetched,
            failed = report.failed.len(),
            ingest_failed = report.ingest_failed.len(),
            new = diff.new.len(),
            changed = diff.changed.len(),
            deleted = diff.deleted.len(),
            added = report.documents_added,
            removed = report.documents_removed,
            "crawl pass complete"
        );
        report.diff = diff;
        Ok(report)
    }

    /// Delete the given chunks unless another tracked page still lists them
    /// or they were stored by something other than the crawler.
    async fn remove_unreferenced(&self, ids: &[DocId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let referenced: HashSet<DocId> = self
            .tracker
            .records()
            .await
            .into_iter()
            .flat_map(|r| r.chunk_ids)
            .collect();
        let mut removed = 0;
        for id in ids {
            if referenced.contains(id) {
                continue;
            }
            let crawled = self
                .store
                .get(id)
                .await
                .is_some_and(|doc| doc.meta.source_type == SourceType::ScrapeStatic);
            if crawled && self.store.delete(id).await {
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::dynamic::tests::{open_store, StubSource};
    use crate::knowledge::embed::{Embedder, HashedNgramEmbedder};
    use crate::knowledge::types::content_id;
    use crate::knowledge::DEFAULT_RELEVANCE_THRESHOLD;

    const PAGE_A: &str = "https://pravo.by/document/a";
    const PAGE_B: &str = "https://pravo.by/document/b";

    fn html(body: &str) -> String {
        format!("<html><body><p>{body}</p></body></html>")
    }

    fn paragraphs(items: &[&str]) -> String {
        let body: String = items.iter().map(|p| format!("<p>{p}</p>")).collect();
        format!("<html><body>{body}</body></html>")
    }

    /// Hashed embeddings that can be switched off to simulate an outage.
    struct FlakyEmbedder {
        inner: HashedNgramEmbedder,
        down: AtomicBool,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("embedding service unavailable");
            }
            self.inner.embed(text).await
        }
    }

    fn source(a: &str, b: Option<&str>) -> Arc<StubSource> {
        let mut stub = StubSource::default();
        stub.pages.insert(PAGE_A.to_string(), html(a));
        if let Some(b) = b {
            stub.pages.insert(PAGE_B.to_string(), html(b));
        }
        Arc::new(stub)
    }

    fn options(purge_deleted: bool) -> CrawlOptions {
        CrawlOptions {
            request_delay: Duration::ZERO,
            purge_deleted,
            ..Default::default()
        }
    }

    fn seeds() -> Vec<String> {
        vec![PAGE_A.to_string(), PAGE_B.to_string()]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changed_page_replaces_its_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("kb")).await;
        let state = dir.path().join("crawl.json");

        let first = IncrementalCrawler::new(
            store.clone(),
            source("Статья 1. Наниматель обязан выплачивать заработную плату.", Some("Статья 2. Работник обязан соблюдать дисциплину.")),
            CrawlTracker::open(&state),
            options(false),
        );
        let report = first.run(&seeds()).await.unwrap();
        assert_eq!(report.diff.new.len(), 2);
        assert_eq!(report.documents_added, 2);

        let second = IncrementalCrawler::new(
            store.clone(),
            source("Статья 1. Наниматель обязан выплачивать заработную плату дважды в месяц.", Some("Статья 2. Работник обязан соблюдать дисциплину.")),
            CrawlTracker::open(&state),
            options(false),
        );
        let report = second.run(&seeds()).await.unwrap();
        assert_eq!(report.diff.changed, vec![PAGE_A]);
        assert_eq!(report.diff.unchanged, vec![PAGE_B]);
        assert_eq!(report.documents_removed, 1);
        assert_eq!(report.documents_added, 1);
        assert_eq!(store.len().await, 2);

        let texts: Vec<String> = store
            .documents_where(|d| d.meta.source == PAGE_A)
            .await
            .into_iter()
            .map(|d| d.text)
            .collect();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("дважды"));
        let record = second.tracker.get(PAGE_A).await.unwrap();
        assert_eq!(record.chunk_ids.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deleted_page_kept_unless_purging() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("kb")).await;
        let state = dir.path().join("crawl.json");
        let a = "Статья 1. Наниматель обязан выплачивать заработную плату.";
        let b = "Статья 2. Работник обязан соблюдать дисциплину.";

        IncrementalCrawler::new(store.clone(), source(a, Some(b)), CrawlTracker::open(&state), options(false))
            .run(&seeds())
            .await
            .unwrap();

        // B now fails to fetch: flagged deleted, chunks stay
        let keep = source(a, None);
        let report = IncrementalCrawler::new(store.clone(), keep.clone(), CrawlTracker::open(&state), options(false))
            .run(&seeds())
            .await
            .unwrap();
        assert_eq!(report.diff.deleted, vec![PAGE_B]);
        assert_eq!(report.failed, vec![PAGE_B]);
        assert_eq!(report.documents_removed, 0);
        assert_eq!(store.len().await, 2);
        assert_eq!(keep.fetches.load(Ordering::SeqCst), 2);

        // restore B, then drop it again with purging on
        IncrementalCrawler::new(store.clone(), source(a, Some(b)), CrawlTracker::open(&state), options(true))
            .run(&seeds())
            .await
            .unwrap();
        let report = IncrementalCrawler::new(store.clone(), source(a, None), CrawlTracker::open(&state), options(true))
            .run(&seeds())
            .await
            .unwrap();
        assert_eq!(report.diff.deleted, vec![PAGE_B]);
        assert_eq!(report.documents_removed, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_chunk_survives_change_of_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("kb")).await;
        let state = dir.path().join("crawl.json");
        let shared = "Общие положения применяются ко всем трудовым договорам.";
        let own_a = "Наниматель обязан выплачивать заработную плату.";
        let own_b = "Работник обязан соблюдать трудовую дисциплину.";

        let mut stub = StubSource::default();
        stub.pages.insert(PAGE_A.to_string(), paragraphs(&[own_a, shared]));
        stub.pages.insert(PAGE_B.to_string(), paragraphs(&[own_b, shared]));
        let report = IncrementalCrawler::new(store.clone(), Arc::new(stub), CrawlTracker::open(&state), options(false))
            .run(&seeds())
            .await
            .unwrap();
        assert_eq!(report.documents_added, 3);

        // A drops the shared paragraph; B still lists it
        let mut stub = StubSource::default();
        stub.pages.insert(PAGE_A.to_string(), paragraphs(&[own_a]));
        stub.pages.insert(PAGE_B.to_string(), paragraphs(&[own_b, shared]));
        let second = IncrementalCrawler::new(store.clone(), Arc::new(stub), CrawlTracker::open(&state), options(false));
        let report = second.run(&seeds()).await.unwrap();
        assert_eq!(report.diff.changed, vec![PAGE_A]);
        assert_eq!(report.documents_removed, 0);
        assert_eq!(report.documents_added, 0);

        let shared_id = content_id(shared);
        assert!(store.exists(&shared_id).await);
        let b = second.tracker.get(PAGE_B).await.unwrap();
        assert!(b.chunk_ids.contains(&shared_id));
        let a = second.tracker.get(PAGE_A).await.unwrap();
        assert_eq!(a.chunk_ids, vec![content_id(own_a)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_purge_keeps_chunks_other_pages_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("kb")).await;
        let state = dir.path().join("crawl.json");
        let shared = "Общие положения применяются ко всем трудовым договорам.";

        let mut stub = StubSource::default();
        stub.pages.insert(PAGE_A.to_string(), paragraphs(&["Наниматель обязан выплачивать заработную плату.", shared]));
        stub.pages.insert(PAGE_B.to_string(), paragraphs(&[shared]));
        IncrementalCrawler::new(store.clone(), Arc::new(stub), CrawlTracker::open(&state), options(true))
            .run(&seeds())
            .await
            .unwrap();

        let mut stub = StubSource::default();
        stub.pages.insert(PAGE_A.to_string(), paragraphs(&["Наниматель обязан выплачивать заработную плату.", shared]));
        let report = IncrementalCrawler::new(store.clone(), Arc::new(stub), CrawlTracker::open(&state), options(true))
            .run(&seeds())
            .await
            .unwrap();
        assert_eq!(report.diff.deleted, vec![PAGE_B]);
        assert_eq!(report.documents_removed, 0);
        assert!(store.exists(&content_id(shared)).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_page_retried_after_failed_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashedNgramEmbedder::default(),
            down: AtomicBool::new(true),
        });
        let store = Arc::new(
            KnowledgeStore::open(&dir.path().join("kb"), embedder.clone(), DEFAULT_RELEVANCE_THRESHOLD)
                .await
                .unwrap(),
        );
        let state = dir.path().join("crawl.json");
        let text = "Статья 1. Наниматель обязан выплачивать заработную плату.";

        let report = IncrementalCrawler::new(store.clone(), source(text, None), CrawlTracker::open(&state), options(false))
            .run(&[PAGE_A.to_string()])
            .await
            .unwrap();
        assert_eq!(report.documents_added, 0);
        assert_eq!(report.ingest_failed, vec![PAGE_A]);
        assert_eq!(store.len().await, 0);

        embedder.down.store(false, Ordering::SeqCst);
        let report = IncrementalCrawler::new(store.clone(), source(text, None), CrawlTracker::open(&state), options(false))
            .run(&[PAGE_A.to_string()])
            .await
            .unwrap();
        assert_eq!(report.diff.changed, vec![PAGE_A]);
        assert_eq!(report.documents_added, 1);
        assert!(report.ingest_failed.is_empty());
        assert_eq!(store.len().await, 1);
    }
}
