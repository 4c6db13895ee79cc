use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::types::{content_id, DocId, DocumentMeta, SourceType};
use super::KnowledgeStore;
use crate::text::{blocks_for_ingest, ChunkConfig};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub total_blocks: usize,
    pub added_blocks: usize,
    pub failed_files: Vec<String>,
}

/// Outcome of storing one page's chunks.
#[derive(Debug, Default, Clone)]
pub struct PageIngest {
    /// Chunks newly written by this call.
    pub added: usize,
    /// Every chunk id of the page, including chunks that were already stored.
    pub ids: Vec<DocId>,
    /// Chunks the page was split into.
    pub blocks: usize,
}

impl PageIngest {
    /// Every chunk of the page is in the store.
    pub fn is_complete(&self) -> bool {
        self.ids.len() == self.blocks
    }
}

/// Ingest every `.txt` file in `dir`: text already extracted from the
/// source PDFs. Block ids are content hashes, so re-running is cheap.
pub async fn ingest_directory(
    store: &KnowledgeStore,
    dir: &Path,
    chunking: ChunkConfig,
) -> Result<IngestStats> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("txt"))
        .collect();
    entries.sort();

    let mut stats = IngestStats {
        total_files: entries.len(),
        ..Default::default()
    };

    for path in entries {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %name, "Failed to read file: {}", e);
                stats.failed_files.push(name);
                continue;
            }
        };

        let blocks = blocks_for_ingest(&text, chunking);
        if blocks.is_empty() {
            warn!(file = %name, "No usable text blocks");
            stats.failed_files.push(name);
            continue;
        }

        let total = blocks.len();
        let mut added = 0;
        for (i, block) in blocks.iter().enumerate() {
            let meta = DocumentMeta::new(name.clone(), SourceType::Pdf).block(i, total);
            if store.add(&content_id(block), block, meta).await {
                added += 1;
            }
        }
        info!(file = %name, blocks = total, added, "File ingested");

        stats.processed_files += 1;
        stats.total_blocks += total;
        stats.added_blocks += added;
    }

    Ok(stats)
}

/// Chunk a fetched page and store each chunk with metadata derived from
/// `template` (source, type and search fields are kept, block fields set).
pub async fn ingest_page(
    store: &KnowledgeStore,
    text: &str,
    template: &DocumentMeta,
    chunking: ChunkConfig,
) -> PageIngest {
    let blocks = blocks_for_ingest(text, chunking);
    let total = blocks.len();
    let mut outcome = PageIngest {
        blocks: total,
        ..Default::default()
    };
    for (i, block) in blocks.iter().enumerate() {
        let id = content_id(block);
        let meta = template.clone().block(i, total);
        if store.add(&id, block, meta).await {
            outcome.added += 1;
        }
        if store.exists(&id).await {
            outcome.ids.push(id);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::knowledge::embed::HashedNgramEmbedder;
    use crate::knowledge::DEFAULT_RELEVANCE_THRESHOLD;

    async fn store(dir: &Path) -> KnowledgeStore {
        KnowledgeStore::open(
            dir,
            Arc::new(HashedNgramEmbedder::default()),
            DEFAULT_RELEVANCE_THRESHOLD,
        )
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ingest_directory_counts_blocks() {
        let kb_dir = tempfile::tempdir().unwrap();
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(
            docs.path().join("tk.txt"),
            "Трудовой кодекс Республики Беларусь\n\n\
             1. Трудовой договор заключается в письменной форме.\n\
             2. Работник вправе расторгнуть договор, предупредив нанимателя.\n",
        )
        .unwrap();
        std::fs::write(docs.path().join("empty.txt"), "  \n").unwrap();
        std::fs::write(docs.path().join("skip.pdf"), "binary").unwrap();

        let kb = store(kb_dir.path()).await;
        let stats = ingest_directory(&kb, docs.path(), ChunkConfig::default())
            .await
            .unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.processed_files, 1);
        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.added_blocks, 3);
        assert_eq!(stats.failed_files, vec!["empty.txt".to_string()]);

        let docs_meta = kb.documents_where(|d| d.meta.source == "tk.txt").await;
        assert!(docs_meta.iter().all(|d| d.meta.total_blocks == 3));

        // second run adds nothing new
        let again = ingest_directory(&kb, docs.path(), ChunkConfig::default())
            .await
            .unwrap();
        assert_eq!(again.added_blocks, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ingest_page_reports_existing_ids() {
        let kb_dir = tempfile::tempdir().unwrap();
        let kb = store(kb_dir.path()).await;
        let template = DocumentMeta::new("https://pravo.by/doc", SourceType::ScrapeDynamic);
        let text = "Исковое заявление подается в суд в письменной форме.";

        let first = ingest_page(&kb, text, &template, ChunkConfig::default()).await;
        assert_eq!(first.added, 1);
        let second = ingest_page(&kb, text, &template, ChunkConfig::default()).await;
        assert_eq!(second.added, 0);
        assert_eq!(second.ids, first.ids);
        assert!(second.is_complete());
    }
}
