pub mod embed;
pub mod ingest;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cnidarium::{StateDelta, StateRead, StateWrite, Storage};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use embed::{cosine_distance, Embedder};
use types::{DocId, Document, DocumentMeta, RetrievalResult, StoreStats};

// Key prefixes (no trailing slashes, cnidarium convention)
const CONTENT_PREFIX: &str = "kb/content";
const META_PREFIX: &str = "kb/meta";
const VECTOR_PREFIX: &str = "kb/vector";

/// Distance at or above which a match is treated as noise.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.8;

fn content_key(id: &str) -> String {
    format!("{}/{}", CONTENT_PREFIX, id)
}
fn meta_key(id: &str) -> String {
    format!("{}/{}", META_PREFIX, id)
}
fn vector_key(id: &str) -> String {
    format!("{}/{}", VECTOR_PREFIX, id)
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

struct IndexedDoc {
    document: Document,
    vector: Vec<f32>,
}

/// Vector-searchable store of legal text passages.
///
/// Content, metadata and embeddings live in cnidarium under separate
/// prefixes. An in-memory mirror is loaded at open and kept in sync with
/// every commit; queries scan the mirror.
pub struct KnowledgeStore {
    storage: Storage,
    location: PathBuf,
    collection: String,
    embedder: Arc<dyn Embedder>,
    relevance_threshold: f32,
    index: RwLock<HashMap<DocId, IndexedDoc>>,
    /// Held across the existence check and the commit so racing writers on
    /// one id resolve to exactly one success.
    write_lock: Mutex<()>,
}

impl KnowledgeStore {
    pub async fn open(
        data_dir: &Path,
        embedder: Arc<dyn Embedder>,
        relevance_threshold: f32,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let prefixes = vec![
            CONTENT_PREFIX.to_string(),
            META_PREFIX.to_string(),
            VECTOR_PREFIX.to_string(),
        ];
        let storage = Storage::load(data_dir.to_path_buf(), prefixes)
            .await
            .context("Failed to init cnidarium storage")?;

        let index = load_index(&storage).await?;
        let collection = format!("legal_documents:{}", embedder.model_name());
        info!(
            path = %data_dir.display(),
            documents = index.len(),
            collection = %collection,
            "Knowledge store opened"
        );

        Ok(Self {
            storage,
            location: data_dir.to_path_buf(),
            collection,
            embedder,
            relevance_threshold,
            index: RwLock::new(index),
            write_lock: Mutex::new(()),
        })
    }

    /// Store a passage. Returns false for an existing id, empty text, or a
    /// storage failure; never errors.
    pub async fn add(&self, id: &str, text: &str, meta: DocumentMeta) -> bool {
        if text.trim().is_empty() {
            debug!(doc_id = %id, "skipping empty document");
            return false;
        }

        let _guard = self.write_lock.lock().await;
        if self.index.read().await.contains_key(id) {
            debug!(doc_id = %id, "document already stored");
            return false;
        }

        let vector = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(doc_id = %id, "Failed to embed document: {:#}", e);
                return false;
            }
        };
        let meta_bytes = match serde_json::to_vec(&meta) {
            Ok(b) => b,
            Err(e) => {
                warn!(doc_id = %id, "Failed to serialize metadata: {}", e);
                return false;
            }
        };

        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        delta.put_raw(content_key(id), text.as_bytes().to_vec());
        delta.put_raw(meta_key(id), meta_bytes);
        delta.put_raw(vector_key(id), encode_vector(&vector));
        if let Err(e) = self.storage.commit(delta).await {
            warn!(doc_id = %id, "Failed to commit document: {:#}", e);
            return false;
        }

        debug!(doc_id = %id, source = %meta.source, chars = text.chars().count(), "document stored");
        self.index.write().await.insert(
            id.to_string(),
            IndexedDoc {
                document: Document {
                    id: id.to_string(),
                    text: text.to_string(),
                    meta,
                },
                vector,
            },
        );
        true
    }

    pub async fn query(&self, text: &str, k: usize) -> Vec<RetrievalResult> {
        self.query_where(text, k, |_| true).await
    }

    /// Nearest passages among those matching `filter`, ascending by distance,
    /// at most `min(k, matching documents)`, and only below the relevance threshold.
    pub async fn query_where<F>(&self, text: &str, k: usize, filter: F) -> Vec<RetrievalResult>
    where
        F: Fn(&Document) -> bool,
    {
        if text.trim().is_empty() || k == 0 || self.index.read().await.is_empty() {
            return Vec::new();
        }

        let query_vector = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to embed query: {:#}", e);
                return Vec::new();
            }
        };

        let index = self.index.read().await;
        let mut scored: Vec<(f32, &IndexedDoc)> = index
            .values()
            .filter(|d| filter(&d.document))
            .map(|d| (cosine_distance(&query_vector, &d.vector), d))
            .collect();
        scored.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.document.id.cmp(&b.1.document.id))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .filter(|(distance, _)| *distance < self.relevance_threshold)
            .map(|(distance, d)| RetrievalResult {
                document: d.document.clone(),
                distance,
            })
            .collect()
    }

    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            total_documents: self.len().await,
            collection: self.collection.clone(),
            location: self.location.display().to_string(),
        }
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn exists(&self, id: &str) -> bool {
        self.index.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> Option<Document> {
        self.index.read().await.get(id).map(|d| d.document.clone())
    }

    pub async fn documents_where<F>(&self, filter: F) -> Vec<Document>
    where
        F: Fn(&Document) -> bool,
    {
        self.index
            .read()
            .await
            .values()
            .filter(|d| filter(&d.document))
            .map(|d| d.document.clone())
            .collect()
    }

    /// Remove one document. False when it does not exist or the commit fails.
    pub async fn delete(&self, id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        if !self.index.read().await.contains_key(id) {
            return false;
        }
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        delta.delete(content_key(id));
        delta.delete(meta_key(id));
        delta.delete(vector_key(id));
        if let Err(e) = self.storage.commit(delta).await {
            warn!(doc_id = %id, "Failed to delete document: {:#}", e);
            return false;
        }
        self.index.write().await.remove(id);
        debug!(doc_id = %id, "document deleted");
        true
    }

    /// Remove every document, keeping the same location and embedder.
    pub async fn clear(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        let ids: Vec<DocId> = self.index.read().await.keys().cloned().collect();
        if ids.is_empty() {
            return true;
        }
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        for id in &ids {
            delta.delete(content_key(id));
            delta.delete(meta_key(id));
            delta.delete(vector_key(id));
        }
        if let Err(e) = self.storage.commit(delta).await {
            warn!("Failed to clear knowledge store: {:#}", e);
            return false;
        }
        self.index.write().await.clear();
        info!(removed = ids.len(), "knowledge store cleared");
        true
    }
}

async fn load_index(storage: &Storage) -> Result<HashMap<DocId, IndexedDoc>> {
    let snapshot = storage.latest_snapshot();
    let mut stream = snapshot.prefix_raw(META_PREFIX);
    let mut metas = Vec::new();
    while let Some(entry) = stream.next().await {
        match entry {
            Ok((key, value)) => {
                let Some(id) = key.strip_prefix(&format!("{}/", META_PREFIX)) else {
                    continue;
                };
                match serde_json::from_slice::<DocumentMeta>(&value) {
                    Ok(meta) => metas.push((id.to_string(), meta)),
                    Err(e) => warn!(doc_id = %id, "Skipping unreadable metadata: {}", e),
                }
            }
            Err(e) => warn!("Error reading metadata stream: {}", e),
        }
    }
    drop(stream);

    let mut index = HashMap::with_capacity(metas.len());
    for (id, meta) in metas {
        let content = snapshot.get_raw(&content_key(&id)).await?;
        let vector = snapshot.get_raw(&vector_key(&id)).await?;
        let (Some(content), Some(vector)) = (content, vector) else {
            warn!(doc_id = %id, "Skipping document with missing content or vector");
            continue;
        };
        let document = Document {
            id: id.clone(),
            text: String::from_utf8_lossy(&content).to_string(),
            meta,
        };
        index.insert(
            id,
            IndexedDoc {
                document,
                vector: decode_vector(&vector),
            },
        );
    }
    Ok(index)
}
