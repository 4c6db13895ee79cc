//! Allow-listed maintenance jobs run on admin request inside the bot process,
//! against the same knowledge store the bot answers from.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::Settings;
use crate::crawl::tracker::CrawlTracker;
use crate::crawl::{CrawlOptions, IncrementalCrawler};
use crate::dynamic::source::LegalSource;
use crate::error::JobError;
use crate::knowledge::ingest::ingest_directory;
use crate::knowledge::KnowledgeStore;
use crate::text::ChunkConfig;

/// Tail of the job output kept on the record.
const MAX_OUTPUT_CHARS: usize = 4000;

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Timeout,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Timeout => "timeout",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub command: String,
    pub args: Vec<String>,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Summary the job produced on success.
    pub output: String,
    pub error: Option<String>,
}

/// One maintenance operation. `args` come from the admin's command line.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> anyhow::Result<String>;
}

/// Load a directory of `.txt` documents; the first argument overrides the directory.
pub struct IngestJob {
    store: Arc<KnowledgeStore>,
    docs_dir: PathBuf,
    chunking: ChunkConfig,
}

#[async_trait]
impl JobRunner for IngestJob {
    async fn run(&self, args: &[String]) -> anyhow::Result<String> {
        let dir = args.first().map(PathBuf::from).unwrap_or_else(|| self.docs_dir.clone());
        let stats = ingest_directory(&self.store, &dir, self.chunking).await?;
        let mut out = format!(
            "{}: {}/{} files, {} blocks, {} added",
            dir.display(),
            stats.processed_files,
            stats.total_files,
            stats.total_blocks,
            stats.added_blocks
        );
        if !stats.failed_files.is_empty() {
            out.push_str(&format!("\nfailed: {}", stats.failed_files.join(", ")));
        }
        Ok(out)
    }
}

/// Incremental re-crawl of the seed pages, or of the URLs given as arguments.
pub struct CrawlJob {
    store: Arc<KnowledgeStore>,
    source: Arc<dyn LegalSource>,
    state_path: PathBuf,
    seeds: Vec<String>,
    options: CrawlOptions,
    /// Shared by every crawl job so two passes never race on the state file.
    running: Arc<Mutex<()>>,
}

#[async_trait]
impl JobRunner for CrawlJob {
    async fn run(&self, args: &[String]) -> anyhow::Result<String> {
        let seeds: &[String] = if args.is_empty() { &self.seeds } else { args };
        if seeds.is_empty() {
            bail!("no URLs given and CRAWL_SEEDS is empty");
        }
        let _pass = self.running.lock().await;
        let crawler = IncrementalCrawler::new(
            self.store.clone(),
            self.source.clone(),
            CrawlTracker::open(&self.state_path),
            self.options.clone(),
        );
        let report = crawler.run(seeds).await?;
        let mut out = format!(
            "fetched {}, new {}, changed {}, deleted {}, unchanged {}; {} added, {} removed",
            report.fetched,
            report.diff.new.len(),
            report.diff.changed.len(),
            report.diff.deleted.len(),
            report.diff.unchanged.len(),
            report.documents_added,
            report.documents_removed
        );
        if !report.failed.is_empty() {
            out.push_str(&format!("\nunreachable: {}", report.failed.join(", ")));
        }
        if !report.ingest_failed.is_empty() {
            out.push_str(&format!("\nretry next pass: {}", report.ingest_failed.join(", ")));
        }
        Ok(out)
    }
}

pub struct StatsJob {
    store: Arc<KnowledgeStore>,
}

#[async_trait]
impl JobRunner for StatsJob {
    async fn run(&self, _args: &[String]) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.store.stats().await)?)
    }
}

/// The maintenance jobs admins may launch from Discord.
pub fn default_jobs(
    store: Arc<KnowledgeStore>,
    source: Arc<dyn LegalSource>,
    settings: &Settings,
) -> HashMap<String, Arc<dyn JobRunner>> {
    let running = Arc::new(Mutex::new(()));
    let crawl = |purge_deleted: bool| -> Arc<dyn JobRunner> {
        let mut options = settings.crawl.clone();
        options.purge_deleted |= purge_deleted;
        Arc::new(CrawlJob {
            store: store.clone(),
            source: source.clone(),
            state_path: settings.crawl_state_path.clone(),
            seeds: settings.crawl_seeds.clone(),
            options,
            running: running.clone(),
        })
    };

    HashMap::from([
        (
            "populate_db".to_string(),
            Arc::new(IngestJob {
                store: store.clone(),
                docs_dir: settings.docs_dir.clone(),
                chunking: settings.crawl.chunking,
            }) as Arc<dyn JobRunner>,
        ),
        ("scrape_websites".to_string(), crawl(false)),
        ("update_documents".to_string(), crawl(true)),
        ("stats".to_string(), Arc::new(StatsJob { store: store.clone() })),
    ])
}

fn tail(text: &str) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(MAX_OUTPUT_CHARS)).collect()
}

pub struct JobTable {
    runners: HashMap<String, Arc<dyn JobRunner>>,
    timeout: Duration,
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobTable {
    pub fn new(runners: HashMap<String, Arc<dyn JobRunner>>, timeout: Duration) -> Self {
        Self {
            runners,
            timeout,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Allowed command names, sorted.
    pub fn allowed(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Start `command` on its own task and return at once; the outcome is
    /// recorded on the job when the task finishes or times out.
    pub async fn launch(&self, command: &str, args: &[String]) -> Result<JobId, JobError> {
        let runner = self
            .runners
            .get(command)
            .cloned()
            .ok_or_else(|| JobError::NotAllowed(command.to_string()))?;

        let started_at = Utc::now();
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("{}_{}_{}", command, started_at.format("%Y%m%d_%H%M%S"), &uuid[..8]);

        self.jobs.write().await.insert(
            id.clone(),
            JobRecord {
                id: id.clone(),
                command: command.to_string(),
                args: args.to_vec(),
                status: JobStatus::Running,
                started_at,
                finished_at: None,
                output: String::new(),
                error: None,
            },
        );
        info!(job_id = %id, command, "job started");

        let jobs = self.jobs.clone();
        let timeout = self.timeout;
        let job_id = id.clone();
        let args = args.to_vec();
        tokio::spawn(async move {
            // on timeout the job future is dropped where it stands
            let outcome = tokio::time::timeout(timeout, runner.run(&args)).await;
            let mut jobs = jobs.write().await;
            let Some(record) = jobs.get_mut(&job_id) else {
                return;
            };
            record.finished_at = Some(Utc::now());
            match outcome {
                Ok(Ok(output)) => {
                    record.status = JobStatus::Completed;
                    record.output = tail(&output);
                }
                Ok(Err(e)) => {
                    record.status = JobStatus::Error;
                    record.error = Some(format!("{:#}", e));
                }
                Err(_) => {
                    record.status = JobStatus::Timeout;
                    record.error = Some(format!("timed out after {}s", timeout.as_secs()));
                }
            }
            match record.status {
                JobStatus::Completed => info!(job_id = %job_id, "job completed"),
                status => warn!(job_id = %job_id, %status, error = ?record.error, "job did not complete"),
            }
        });

        Ok(id)
    }

    pub async fn status(&self, id: &str) -> Option<JobRecord> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Every job, newest first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id)));
        jobs
    }
}
