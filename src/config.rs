//! Process settings from the environment and the thresholds admins may
//! retune while the bot runs.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::answer::ContextBudget;
use crate::crawl::CrawlOptions;
use crate::dynamic::source::PravoBySource;
use crate::dynamic::DynamicSearchConfig;
use crate::gate::arbiter::GateThresholds;
use crate::gate::lexical::DEFAULT_ACCEPT_THRESHOLD;
use crate::knowledge::DEFAULT_RELEVANCE_THRESHOLD;
use crate::retrieval::JudgeThresholds;

/// Parsed value of `key`, or `default` when it is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    dotenv::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    dotenv::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: Option<String>,
    pub guild_id: Option<u64>,
    pub admin_ids: HashSet<u64>,

    pub kb_path: PathBuf,
    pub crawl_state_path: PathBuf,
    pub classifier_model_path: PathBuf,
    pub docs_dir: PathBuf,
    pub crawl_seeds: Vec<String>,

    /// Remote embeddings endpoint; the local hashed embedder is used when unset.
    pub embedding_base_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub relevance_threshold: f32,
    /// Lexical score at which the keyword scorer alone votes "legal".
    pub lexical_accept: f32,
    pub answer_budget: ContextBudget,

    pub search_url: String,
    pub search_param: String,
    pub dynamic: DynamicSearchConfig,
    pub dynamic_timeout: Duration,
    pub crawl: CrawlOptions,
    pub job_timeout: Duration,

    pub tunables: Tunables,
}

impl Settings {
    pub fn from_env() -> Self {
        let request_delay = Duration::from_millis(env_or("REQUEST_DELAY_MS", 1000));
        let dynamic_defaults = DynamicSearchConfig::default();
        let crawl_defaults = CrawlOptions::default();
        let budget_defaults = ContextBudget::default();
        let relevance_threshold = env_or("RELEVANCE_THRESHOLD", DEFAULT_RELEVANCE_THRESHOLD);

        Self {
            discord_token: dotenv::var("DISCORD_TOKEN").ok().filter(|t| !t.is_empty()),
            guild_id: dotenv::var("DISCORD_GUILD_ID").ok().and_then(|s| s.parse().ok()),
            admin_ids: env_list("ADMIN_USER_IDS")
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),

            kb_path: env_or("KB_PATH", PathBuf::from("./data/kb")),
            crawl_state_path: env_or("CRAWL_STATE_PATH", PathBuf::from("./data/crawl_state.json")),
            classifier_model_path: env_or(
                "CLASSIFIER_MODEL_PATH",
                PathBuf::from("./data/legal_classifier.json"),
            ),
            docs_dir: env_or("DOCS_DIR", PathBuf::from("./data/documents")),
            crawl_seeds: env_list("CRAWL_SEEDS"),

            embedding_base_url: dotenv::var("EMBEDDING_BASE_URL").ok().filter(|u| !u.is_empty()),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small".to_string()),
            embedding_api_key: dotenv::var("EMBEDDING_API_KEY").ok().filter(|k| !k.is_empty()),
            relevance_threshold,
            lexical_accept: env_or("GATE_LEXICAL_ACCEPT", DEFAULT_ACCEPT_THRESHOLD),
            answer_budget: ContextBudget {
                max_passages: env_or("ANSWER_MAX_PASSAGES", budget_defaults.max_passages),
                max_passage_chars: env_or(
                    "ANSWER_MAX_PASSAGE_CHARS",
                    budget_defaults.max_passage_chars,
                ),
                max_context_chars: env_or(
                    "ANSWER_MAX_CONTEXT_CHARS",
                    budget_defaults.max_context_chars,
                ),
            },

            search_url: env_or("SEARCH_URL", PravoBySource::DEFAULT_SEARCH_URL.to_string()),
            search_param: env_or("SEARCH_PARAM", "q".to_string()),
            dynamic: DynamicSearchConfig {
                max_results: env_or("DYNAMIC_MAX_RESULTS", dynamic_defaults.max_results),
                max_pages_per_result: env_or(
                    "DYNAMIC_MAX_PAGES_PER_RESULT",
                    dynamic_defaults.max_pages_per_result,
                ),
                request_delay,
                cache_overlap: env_or("DYNAMIC_CACHE_OVERLAP", dynamic_defaults.cache_overlap),
                response_k: env_or("DYNAMIC_RESPONSE_K", dynamic_defaults.response_k),
                chunking: dynamic_defaults.chunking,
            },
            dynamic_timeout: Duration::from_secs(env_or("DYNAMIC_TIMEOUT_SECS", 60)),
            crawl: CrawlOptions {
                request_delay,
                purge_deleted: env_or("CRAWL_PURGE_DELETED", false),
                max_pages: env_or("CRAWL_MAX_PAGES", crawl_defaults.max_pages),
                chunking: crawl_defaults.chunking,
            },
            job_timeout: Duration::from_secs(env_or("JOB_TIMEOUT_SECS", 300)),

            tunables: Tunables::from_env(relevance_threshold),
        }
    }
}

/// Thresholds read on every request; admins change them via `/yurist config`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tunables {
    pub stat_high_confidence: f32,
    pub lexical_strong: f32,
    pub good_distance: f32,
    pub marginal_distance: f32,
    pub retrieval_k: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        let gate = GateThresholds::default();
        let judge = JudgeThresholds::default();
        Self {
            stat_high_confidence: gate.stat_high_confidence,
            lexical_strong: gate.lexical_strong,
            good_distance: judge.good_distance,
            marginal_distance: judge.marginal_distance,
            retrieval_k: 5,
        }
    }
}

impl Tunables {
    pub const KEYS: [&'static str; 5] = [
        "stat_high_confidence",
        "lexical_strong",
        "good_distance",
        "marginal_distance",
        "retrieval_k",
    ];

    /// Environment overrides, held to the same rules as `/yurist config`.
    /// An inconsistent set falls back to the defaults as a whole.
    pub fn from_env(relevance_threshold: f32) -> Self {
        let d = Self::default();
        Self {
            stat_high_confidence: env_or("GATE_STAT_HIGH_CONFIDENCE", d.stat_high_confidence),
            lexical_strong: env_or("GATE_LEXICAL_STRONG", d.lexical_strong),
            good_distance: env_or("JUDGE_GOOD_DISTANCE", d.good_distance),
            marginal_distance: env_or("JUDGE_MARGINAL_DISTANCE", d.marginal_distance),
            retrieval_k: env_or("RETRIEVAL_K", d.retrieval_k),
        }
        .validated(relevance_threshold)
    }

    fn validated(self, relevance_threshold: f32) -> Self {
        if let Err(reason) = self.check() {
            warn!(%reason, "ignoring threshold overrides from the environment");
            return Self::default();
        }
        if self.marginal_distance > relevance_threshold {
            warn!(
                marginal_distance = self.marginal_distance,
                relevance_threshold,
                "marginal band reaches past the store's relevance cutoff"
            );
        }
        self
    }

    pub fn gate(&self) -> GateThresholds {
        GateThresholds {
            stat_high_confidence: self.stat_high_confidence,
            lexical_strong: self.lexical_strong,
        }
    }

    pub fn judge(&self) -> JudgeThresholds {
        JudgeThresholds {
            good_distance: self.good_distance,
            marginal_distance: self.marginal_distance,
        }
    }

    /// Parse and apply one setting. `Ok` carries a confirmation line, `Err`
    /// a message for the admin; a rejected value leaves everything unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<String, String> {
        let mut next = *self;
        if key == "retrieval_k" {
            next.retrieval_k = value
                .trim()
                .parse()
                .map_err(|_| format!("`{}` expects a whole number, got `{}`", key, value))?;
        } else {
            let v: f32 = value
                .trim()
                .parse()
                .map_err(|_| format!("`{}` expects a number, got `{}`", key, value))?;
            match key {
                "stat_high_confidence" => next.stat_high_confidence = v,
                "lexical_strong" => next.lexical_strong = v,
                "good_distance" => next.good_distance = v,
                "marginal_distance" => next.marginal_distance = v,
                _ => {
                    return Err(format!(
                        "Unknown setting `{}`. Valid: {}",
                        key,
                        Self::KEYS.map(|k| format!("`{}`", k)).join(", ")
                    ))
                }
            }
        }
        next.check()?;
        *self = next;
        Ok(format!("`{}` set to {}", key, value.trim()))
    }

    /// Range and ordering rules every accepted combination satisfies.
    pub fn check(&self) -> Result<(), String> {
        for (key, v) in [
            ("stat_high_confidence", self.stat_high_confidence),
            ("lexical_strong", self.lexical_strong),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("`{}` is a probability and must be between 0 and 1", key));
            }
        }
        for (key, v) in [
            ("good_distance", self.good_distance),
            ("marginal_distance", self.marginal_distance),
        ] {
            if !(0.0..=2.0).contains(&v) {
                return Err(format!("`{}` must be between 0 and 2", key));
            }
        }
        if !(1..=50).contains(&self.retrieval_k) {
            return Err("`retrieval_k` must be between 1 and 50".to_string());
        }
        if self.good_distance >= self.marginal_distance {
            return Err("`good_distance` must stay below `marginal_distance`".to_string());
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!(
            "**Настройки:**\n\
             `stat_high_confidence`: {}\n\
             `lexical_strong`: {}\n\
             `good_distance`: {}\n\
             `marginal_distance`: {}\n\
             `retrieval_k`: {}",
            self.stat_high_confidence,
            self.lexical_strong,
            self.good_distance,
            self.marginal_distance,
            self.retrieval_k
        )
    }
}
