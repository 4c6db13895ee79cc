//! One user question in, one reply text out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::answer::{self, ContextBudget};
use crate::config::Tunables;
use crate::dynamic::{ContextOrigin, DynamicSearchEngine};
use crate::gate::arbiter::{RelevanceArbiter, RelevanceVerdict};
use crate::knowledge::types::{RetrievalResult, SourceType};
use crate::llm::AnswerModel;
use crate::retrieval::{RetrievalQuality, SufficiencyJudge, SufficiencyReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Refused,
    Answered,
    NothingFound,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    pub kind: ReplyKind,
    pub origin: Option<ContextOrigin>,
}

impl AssistantReply {
    fn canned(text: &str, kind: ReplyKind) -> Self {
        Self {
            text: text.to_string(),
            kind,
            origin: None,
        }
    }
}

/// What the pipeline would decide for a question, without calling the model.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub verdict: RelevanceVerdict,
    pub sufficiency: Option<SufficiencyReport>,
}

impl ProbeReport {
    pub fn render(&self) -> String {
        let signals = self
            .verdict
            .contributing_signals
            .iter()
            .map(|(name, score)| format!("{}={:.2}", name, score))
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!(
            "**Gate:** {} ({:.2})\n**Rationale:** {}\n**Signals:** {}",
            if self.verdict.is_legal { "legal" } else { "rejected" },
            self.verdict.confidence,
            self.verdict.rationale,
            if signals.is_empty() { "none".to_string() } else { signals }
        );
        if let Some(report) = &self.sufficiency {
            out.push_str(&format!(
                "\n**Retrieval:** {} ({} results, avg distance {})\n**Dynamic search:** {}",
                report.quality,
                report.results.len(),
                report
                    .average_distance
                    .map(|d| format!("{:.3}", d))
                    .unwrap_or_else(|| "n/a".to_string()),
                if report.need_dynamic { "needed" } else { "not needed" }
            ));
            for r in report.results.iter().take(3) {
                out.push_str(&format!(
                    "\n• {:.3} `{}` {}",
                    r.distance,
                    r.document.meta.source_type.as_str(),
                    r.document.meta.source
                ));
            }
        }
        out
    }
}

pub struct LegalAssistant {
    arbiter: Arc<RelevanceArbiter>,
    judge: SufficiencyJudge,
    dynamic: Arc<DynamicSearchEngine>,
    model: Arc<dyn AnswerModel>,
    tunables: Arc<RwLock<Tunables>>,
    budget: ContextBudget,
    dynamic_timeout: Duration,
}

impl LegalAssistant {
    pub fn new(
        arbiter: Arc<RelevanceArbiter>,
        judge: SufficiencyJudge,
        dynamic: Arc<DynamicSearchEngine>,
        model: Arc<dyn AnswerModel>,
        tunables: Arc<RwLock<Tunables>>,
        dynamic_timeout: Duration,
    ) -> Self {
        Self {
            arbiter,
            judge,
            dynamic,
            model,
            tunables,
            budget: ContextBudget::default(),
            dynamic_timeout,
        }
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    pub async fn handle_question(&self, text: &str, user_id: u64) -> String {
        self.handle_question_with_progress(text, user_id, None).await.text
    }

    /// Full pipeline. Interim status lines go to `progress` when given; the
    /// returned reply is always user-facing text.
    pub async fn handle_question_with_progress(
        &self,
        text: &str,
        user_id: u64,
        progress: Option<UnboundedSender<String>>,
    ) -> AssistantReply {
        let started = Instant::now();
        let tunables = *self.tunables.read().await;

        let verdict = self.arbiter.evaluate_with(text, &tunables.gate());
        info!(
            user_id,
            legal = verdict.is_legal,
            confidence = verdict.confidence,
            rationale = %verdict.rationale,
            "question gated"
        );
        if !verdict.is_legal {
            return AssistantReply::canned(answer::REFUSAL, ReplyKind::Refused);
        }

        let report = self
            .judge
            .assess_with(text, tunables.retrieval_k, &tunables.judge())
            .await;

        let (results, origin, weak_context) = if report.need_dynamic {
            if let Some(tx) = &progress {
                let _ = tx.send(answer::DYNAMIC_SEARCH_NOTICE.to_string());
            }
            match self.dynamic_context(text).await {
                Some((results, origin)) => (results, origin, false),
                None if !report.results.is_empty() => {
                    let origin = stored_origin(&report.results);
                    (report.results, origin, true)
                }
                None => {
                    info!(user_id, "no context found locally or online");
                    return AssistantReply::canned(answer::NOTHING_FOUND, ReplyKind::NothingFound);
                }
            }
        } else {
            let weak = report.quality == RetrievalQuality::Marginal;
            let origin = stored_origin(&report.results);
            (report.results, origin, weak)
        };

        let now = chrono::Utc::now().timestamp();
        let messages =
            answer::build_messages(text, &results, origin, weak_context, &self.budget, now);
        match self.model.generate(&messages).await {
            Ok(mut reply) => {
                if let Some(notice) = answer::origin_notice(origin) {
                    reply.push_str("\n\n");
                    reply.push_str(notice);
                }
                info!(
                    user_id,
                    passages = results.len(),
                    origin = ?origin,
                    weak_context,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    chars = reply.chars().count(),
                    "question answered"
                );
                AssistantReply {
                    text: reply,
                    kind: ReplyKind::Answered,
                    origin: Some(origin),
                }
            }
            Err(e) => {
                warn!(
                    user_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Answer generation failed: {:#}",
                    e
                );
                AssistantReply::canned(answer::APOLOGY, ReplyKind::Failed)
            }
        }
    }

    /// Run the dynamic search on its own task. Past the timeout the task is
    /// left running so whatever it fetches still lands in the store.
    async fn dynamic_context(&self, question: &str) -> Option<(Vec<RetrievalResult>, ContextOrigin)> {
        let engine = self.dynamic.clone();
        let owned = question.to_string();
        let handle =
            tokio::spawn(async move { engine.search_and_add_to_knowledge_base(&owned).await });

        match tokio::time::timeout(self.dynamic_timeout, handle).await {
            Ok(Ok((Some(context), _))) => Some((context.results, context.origin)),
            Ok(Ok((None, _))) => None,
            Ok(Err(e)) => {
                warn!("Dynamic search task failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.dynamic_timeout.as_secs_f32(),
                    "Dynamic search timed out, continuing in background"
                );
                None
            }
        }
    }

    /// Gate and retrieval decisions for `text` with the current tunables.
    pub async fn probe(&self, text: &str) -> ProbeReport {
        let tunables = *self.tunables.read().await;
        let verdict = self.arbiter.evaluate_with(text, &tunables.gate());
        let sufficiency = if verdict.is_legal {
            Some(
                self.judge
                    .assess_with(text, tunables.retrieval_k, &tunables.judge())
                    .await,
            )
        } else {
            None
        };
        ProbeReport {
            verdict,
            sufficiency,
        }
    }
}

/// Passages already in the store count as reused search results when most
/// of them were put there by an earlier dynamic search.
fn stored_origin(results: &[RetrievalResult]) -> ContextOrigin {
    let dynamic = results
        .iter()
        .filter(|r| r.document.meta.source_type == SourceType::ScrapeDynamic)
        .count();
    if dynamic * 2 > results.len() {
        ContextOrigin::CachedDynamic
    } else {
        ContextOrigin::Local
    }
}
