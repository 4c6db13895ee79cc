//! Decides whether local knowledge is good enough to answer from.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::knowledge::types::RetrievalResult;
use crate::knowledge::KnowledgeStore;

/// How many of the closest results the quality signal averages over.
const QUALITY_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeThresholds {
    /// Average distance below which results are good.
    pub good_distance: f32,
    /// Average distance below which results are usable but marginal.
    pub marginal_distance: f32,
}

impl Default for JudgeThresholds {
    fn default() -> Self {
        Self {
            good_distance: 0.5,
            marginal_distance: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalQuality {
    Empty,
    Good,
    Marginal,
    Poor,
}

impl RetrievalQuality {
    pub fn is_sufficient(self) -> bool {
        matches!(self, RetrievalQuality::Good | RetrievalQuality::Marginal)
    }
}

impl fmt::Display for RetrievalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetrievalQuality::Empty => "empty",
            RetrievalQuality::Good => "good",
            RetrievalQuality::Marginal => "marginal",
            RetrievalQuality::Poor => "poor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SufficiencyReport {
    pub need_dynamic: bool,
    pub quality: RetrievalQuality,
    /// Mean distance of the closest results, `None` when there are none.
    pub average_distance: Option<f32>,
    pub results: Vec<RetrievalResult>,
}

/// Quality band of an ascending result list.
pub fn classify(results: &[RetrievalResult], thresholds: &JudgeThresholds) -> (RetrievalQuality, Option<f32>) {
    if results.is_empty() {
        return (RetrievalQuality::Empty, None);
    }
    let window = &results[..results.len().min(QUALITY_WINDOW)];
    let average = window.iter().map(|r| r.distance).sum::<f32>() / window.len() as f32;
    let quality = if average < thresholds.good_distance {
        RetrievalQuality::Good
    } else if average < thresholds.marginal_distance {
        RetrievalQuality::Marginal
    } else {
        RetrievalQuality::Poor
    };
    (quality, Some(average))
}

pub struct SufficiencyJudge {
    store: Arc<KnowledgeStore>,
    thresholds: JudgeThresholds,
}

impl SufficiencyJudge {
    pub fn new(store: Arc<KnowledgeStore>, thresholds: JudgeThresholds) -> Self {
        Self { store, thresholds }
    }

    pub async fn assess(&self, question: &str, k: usize) -> SufficiencyReport {
        self.assess_with(question, k, &self.thresholds).await
    }

    pub async fn assess_with(
        &self,
        question: &str,
        k: usize,
        thresholds: &JudgeThresholds,
    ) -> SufficiencyReport {
        let results = self.store.query(question, k).await;
        let (quality, average_distance) = classify(&results, thresholds);
        debug!(
            quality = %quality,
            results = results.len(),
            average_distance = ?average_distance,
            "retrieval assessed"
        );
        SufficiencyReport {
            need_dynamic: !quality.is_sufficient(),
            quality,
            average_distance,
            results,
        }
    }

    /// `(need_dynamic, local_results)`.
    pub async fn should_use_dynamic_search(
        &self,
        question: &str,
        k: usize,
    ) -> (bool, Vec<RetrievalResult>) {
        let report = self.assess(question, k).await;
        (report.need_dynamic, report.results)
    }
}
