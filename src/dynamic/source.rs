use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;

use crate::error::FetchError;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']([^"'#]+)(?:#[^"']*)?["']"#).expect("href regex is valid")
});

/// Path fragments that mark legal content on the official portals.
const LEGAL_PATH_MARKERS: &[&str] = &[
    "document",
    "docs",
    "law",
    "legal",
    "zakon",
    "kodeks",
    "codex",
    "normativ",
    "pravovaya-informatsiya",
    "acts",
];

/// An authoritative site the dynamic search can query and crawl.
#[async_trait]
pub trait LegalSource: Send + Sync {
    fn name(&self) -> &str;

    /// Result page URLs for a query, best first, at most `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, FetchError>;

    /// Raw HTML of a page.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// The National Legal Internet Portal of the Republic of Belarus.
pub struct PravoBySource {
    client: reqwest::Client,
    search_url: String,
    query_param: String,
}

impl PravoBySource {
    pub const DEFAULT_SEARCH_URL: &'static str = "https://pravo.by/search/";

    pub fn new(search_url: &str, query_param: &str) -> anyhow::Result<Self> {
        Url::parse(search_url).with_context(|| format!("Invalid search URL {search_url}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("yurpomoshnik/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            search_url: search_url.to_string(),
            query_param: query_param.to_string(),
        })
    }

    async fn get(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String, FetchError> {
        let resp = request.send().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl LegalSource for PravoBySource {
    fn name(&self) -> &str {
        "pravo.by"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, FetchError> {
        let request = self
            .client
            .get(&self.search_url)
            .query(&[(self.query_param.as_str(), query)]);
        let html = self.get(request, &self.search_url).await?;
        let mut links = discover_legal_links(&html, &self.search_url);
        links.truncate(limit);
        Ok(links)
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        self.get(self.client.get(url), url).await
    }
}

/// Same-host links from `html` whose path looks like legal content,
/// resolved against `page_url`, deduplicated in document order.
pub fn discover_legal_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    seen.insert(strip_fragment(&base));

    let mut links = Vec::new();
    for caps in HREF_RE.captures_iter(html) {
        let Some(href) = caps.get(1) else { continue };
        let Ok(url) = base.join(href.as_str().trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str() != base.host_str() {
            continue;
        }
        let path = url.path().to_lowercase();
        if !LEGAL_PATH_MARKERS.iter().any(|m| path.contains(m)) {
            continue;
        }
        let link = strip_fragment(&url);
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    links
}

fn strip_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
