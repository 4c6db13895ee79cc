use serde::{Deserialize, Serialize};

/// Content-addressed document ID (blake3 hex hash) unless the caller supplies one.
pub type DocId = String;

pub fn content_id(text: &str) -> DocId {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    ScrapeStatic,
    ScrapeDynamic,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::ScrapeStatic => "scrape_static",
            SourceType::ScrapeDynamic => "scrape_dynamic",
        }
    }
}

/// Metadata stored alongside each document's content in cnidarium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// File name or URL the text came from.
    pub source: String,
    pub source_type: SourceType,
    /// Unix seconds.
    pub captured_at: i64,
    pub block_index: usize,
    pub total_blocks: usize,
    #[serde(default)]
    pub title: Option<String>,
    /// Question that triggered the dynamic search which found this document.
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
}

impl DocumentMeta {
    pub fn new(source: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            source: source.into(),
            source_type,
            captured_at: chrono::Utc::now().timestamp(),
            block_index: 0,
            total_blocks: 1,
            title: None,
            search_query: None,
            search_terms: Vec::new(),
        }
    }

    pub fn block(mut self, index: usize, total: usize) -> Self {
        self.block_index = index;
        self.total_blocks = total;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub meta: DocumentMeta,
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub document: Document,
    /// Cosine distance to the query, lower is closer.
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub collection: String,
    pub location: String,
}
