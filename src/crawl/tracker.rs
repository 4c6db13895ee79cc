//! Per-URL content hashes persisted between crawl passes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::knowledge::types::DocId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    New,
    Unchanged,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub content_hash: String,
    /// Unix seconds of the last pass that saw this URL.
    pub last_seen: i64,
    pub status: CrawlStatus,
    /// Knowledge store documents currently holding this page's text.
    #[serde(default)]
    pub chunk_ids: Vec<DocId>,
}

/// URLs of one pass grouped by what happened to them, each list sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlDiff {
    pub new: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

impl CrawlDiff {
    /// URLs whose content must be (re)ingested.
    pub fn to_ingest(&self) -> impl Iterator<Item = &String> {
        self.new.iter().chain(self.changed.iter())
    }
}

pub struct CrawlTracker {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CrawlRecord>>,
}

impl CrawlTracker {
    /// Open the state file. A missing or unreadable file starts from empty
    /// state, so every URL of the next pass counts as new.
    pub fn open(path: &Path) -> Self {
        let records = match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, CrawlRecord>>(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), "Crawl state is corrupt, starting empty: {}", e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), "Failed to read crawl state, starting empty: {}", e);
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        }
    }

    /// Classify this pass against the previous one and record the new
    /// hashes in memory. Nothing reaches disk until [`save`](Self::save), so
    /// a pass that dies before its pages are stored is redone in full.
    ///
    /// `hashes` holds the content hash of each seen URL that was fetched
    /// successfully; a seen URL without a hash keeps its previous record.
    pub async fn diff_and_update(
        &self,
        urls_seen: &HashSet<String>,
        hashes: &HashMap<String, String>,
    ) -> CrawlDiff {
        let now = chrono::Utc::now().timestamp();
        let mut records = self.records.lock().await;
        let mut diff = CrawlDiff::default();

        for url in urls_seen {
            let Some(hash) = hashes.get(url) else {
                if let Some(record) = records.get_mut(url) {
                    if record.status != CrawlStatus::Deleted {
                        record.last_seen = now;
                        record.status = CrawlStatus::Unchanged;
                        diff.unchanged.push(url.clone());
                    }
                }
                continue;
            };

            match records.get_mut(url) {
                Some(record) if record.status != CrawlStatus::Deleted => {
                    record.status = if &record.content_hash == hash {
                        diff.unchanged.push(url.clone());
                        CrawlStatus::Unchanged
                    } else {
                        diff.changed.push(url.clone());
                        CrawlStatus::Changed
                    };
                    record.content_hash = hash.clone();
                    record.last_seen = now;
                }
                previous => {
                    let chunk_ids = previous.map(|r| r.chunk_ids.clone()).unwrap_or_default();
                    records.insert(
                        url.clone(),
                        CrawlRecord {
                            url: url.clone(),
                            content_hash: hash.clone(),
                            last_seen: now,
                            status: CrawlStatus::New,
                            chunk_ids,
                        },
                    );
                    diff.new.push(url.clone());
                }
            }
        }

        for (url, record) in records.iter_mut() {
            if !urls_seen.contains(url) && record.status != CrawlStatus::Deleted {
                record.status = CrawlStatus::Deleted;
                diff.deleted.push(url.clone());
            }
        }

        diff.new.sort();
        diff.changed.sort();
        diff.deleted.sort();
        diff.unchanged.sort();

        debug!(
            new = diff.new.len(),
            changed = diff.changed.len(),
            deleted = diff.deleted.len(),
            unchanged = diff.unchanged.len(),
            "crawl state updated"
        );
        diff
    }

    pub async fn set_chunk_ids(&self, url: &str, chunk_ids: Vec<DocId>) {
        if let Some(record) = self.records.lock().await.get_mut(url) {
            record.chunk_ids = chunk_ids;
        }
    }

    /// Forget the content hash of a page whose chunks did not all get
    /// stored, so the next pass sees it as changed and ingests it again.
    pub async fn invalidate(&self, url: &str, chunk_ids: Vec<DocId>) {
        if let Some(record) = self.records.lock().await.get_mut(url) {
            record.content_hash.clear();
            record.chunk_ids = chunk_ids;
        }
    }

    pub async fn save(&self) -> Result<()> {
        save(&self.path, &*self.records.lock().await)
    }

    pub async fn get(&self, url: &str) -> Option<CrawlRecord> {
        self.records.lock().await.get(url).cloned()
    }

    pub async fn records(&self) -> Vec<CrawlRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

/// Write to a sibling temp file and rename over the target.
fn save(path: &Path, records: &BTreeMap<String, CrawlRecord>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(records).context("serialize crawl state")?;
    std::fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("rename to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seen(urls: &[&str]) -> HashSet<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    fn hashes(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect()
    }

    #[tokio::test]
    async fn test_new_unchanged_changed_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CrawlTracker::open(&dir.path().join("crawl.json"));

        let first = tracker
            .diff_and_update(&seen(&["a", "b"]), &hashes(&[("a", "h1"), ("b", "h2")]))
            .await;
        assert_eq!(first.new, vec!["a", "b"]);

        let second = tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        assert_eq!(second.unchanged, vec!["a"]);
        assert_eq!(second.deleted, vec!["b"]);

        let third = tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h9")]))
            .await;
        assert_eq!(third.changed, vec!["a"]);
        // already flagged, not reported again
        assert!(third.deleted.is_empty());
        assert_eq!(tracker.get("b").await.unwrap().status, CrawlStatus::Deleted);
    }

    #[tokio::test]
    async fn test_deleted_url_that_returns_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CrawlTracker::open(&dir.path().join("crawl.json"));
        tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        tracker.set_chunk_ids("a", vec!["c1".to_string()]).await;
        tracker.diff_and_update(&seen(&[]), &hashes(&[])).await;

        let back = tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        assert_eq!(back.new, vec!["a"]);
        assert_eq!(tracker.get("a").await.unwrap().chunk_ids, vec!["c1"]);
    }

    #[tokio::test]
    async fn test_seen_without_hash_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CrawlTracker::open(&dir.path().join("crawl.json"));
        tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        let diff = tracker
            .diff_and_update(&seen(&["a", "x"]), &hashes(&[]))
            .await;
        assert_eq!(diff.unchanged, vec!["a"]);
        assert!(diff.new.is_empty());
        assert!(tracker.get("x").await.is_none());
        assert_eq!(tracker.get("a").await.unwrap().content_hash, "h1");
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("crawl.json");
        {
            let tracker = CrawlTracker::open(&path);
            tracker
                .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
                .await;
            tracker.save().await.unwrap();
        }
        let reopened = CrawlTracker::open(&path);
        let diff = reopened
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        assert_eq!(diff.unchanged, vec!["a"]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_state_means_everything_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.json");
        std::fs::write(&path, b"[[[").unwrap();
        let tracker = CrawlTracker::open(&path);
        let diff = tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        assert_eq!(diff.new, vec!["a"]);
    }

    #[tokio::test]
    async fn test_unsaved_pass_is_redone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.json");
        {
            let tracker = CrawlTracker::open(&path);
            tracker
                .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
                .await;
        }
        let reopened = CrawlTracker::open(&path);
        let diff = reopened
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        assert_eq!(diff.new, vec!["a"]);
    }

    #[tokio::test]
    async fn test_invalidated_page_counts_as_changed() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = CrawlTracker::open(&dir.path().join("crawl.json"));
        tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        tracker.invalidate("a", vec!["c1".to_string()]).await;

        let diff = tracker
            .diff_and_update(&seen(&["a"]), &hashes(&[("a", "h1")]))
            .await;
        assert_eq!(diff.changed, vec!["a"]);
        assert_eq!(tracker.get("a").await.unwrap().chunk_ids, vec!["c1"]);
    }
}
