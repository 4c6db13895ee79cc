//! Multinomial naive Bayes relevance classifier.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{content_stems, seed, RelevanceSignal, SignalReading};
use crate::error::ClassificationUnavailable;

/// Bumped whenever feature extraction changes so stale model files retrain.
const MODEL_VERSION: u32 = 1;
const SMOOTHING: f64 = 1.0;

const LEGAL: usize = 0;
const NON_LEGAL: usize = 1;

/// Sparse feature vector of a question: feature name to occurrence count.
pub fn features(question: &str) -> BTreeMap<String, u32> {
    let mut out = BTreeMap::new();
    let stems = content_stems(question);
    for s in &stems {
        *out.entry(format!("w:{s}")).or_insert(0) += 1;
    }
    for pair in stems.windows(2) {
        *out.entry(format!("b:{}_{}", pair[0], pair[1])).or_insert(0) += 1;
    }
    if question.chars().any(|c| c.is_ascii_alphabetic()) {
        out.insert("f:latin".to_string(), 1);
    }
    if question.contains('?') {
        out.insert("f:question".to_string(), 1);
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    version: u32,
    /// Number of training documents per class (legal, non-legal).
    doc_counts: [u64; 2],
    /// Sum of feature counts per class.
    feature_totals: [u64; 2],
    feature_counts: BTreeMap<String, [u64; 2]>,
}

impl NaiveBayesModel {
    pub fn train<'a>(examples: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        let mut model = Self {
            version: MODEL_VERSION,
            doc_counts: [0; 2],
            feature_totals: [0; 2],
            feature_counts: BTreeMap::new(),
        };
        for (text, is_legal) in examples {
            let class = if is_legal { LEGAL } else { NON_LEGAL };
            model.doc_counts[class] += 1;
            for (feature, count) in features(text) {
                model.feature_counts.entry(feature).or_insert([0; 2])[class] += count as u64;
                model.feature_totals[class] += count as u64;
            }
        }
        model
    }

    pub fn train_on_seed() -> Self {
        Self::train(
            seed::LEGAL
                .iter()
                .map(|q| (*q, true))
                .chain(seed::NON_LEGAL.iter().map(|q| (*q, false))),
        )
    }

    pub fn vocabulary_size(&self) -> usize {
        self.feature_counts.len()
    }

    fn is_usable(&self) -> bool {
        self.version == MODEL_VERSION
            && self.doc_counts.iter().all(|&n| n > 0)
            && !self.feature_counts.is_empty()
    }

    /// Posterior probability that the question is legal.
    pub fn predict(&self, question: &str) -> Result<f64, ClassificationUnavailable> {
        if question.trim().is_empty() {
            return Err(ClassificationUnavailable::EmptyInput);
        }
        if !self.is_usable() {
            return Err(ClassificationUnavailable::Model(
                "model has not been trained".to_string(),
            ));
        }

        let total_docs = (self.doc_counts[LEGAL] + self.doc_counts[NON_LEGAL]) as f64;
        let vocab = self.feature_counts.len() as f64;
        let mut log_score = [0.0f64; 2];
        for class in [LEGAL, NON_LEGAL] {
            log_score[class] = (self.doc_counts[class] as f64 / total_docs).ln();
        }

        let mut known = 0usize;
        for (feature, count) in features(question) {
            let Some(counts) = self.feature_counts.get(&feature) else {
                continue;
            };
            known += 1;
            for class in [LEGAL, NON_LEGAL] {
                let likelihood = (counts[class] as f64 + SMOOTHING)
                    / (self.feature_totals[class] as f64 + SMOOTHING * vocab);
                log_score[class] += count as f64 * likelihood.ln();
            }
        }
        if known == 0 {
            return Err(ClassificationUnavailable::NoKnownFeatures);
        }

        Ok(1.0 / (1.0 + (log_score[NON_LEGAL] - log_score[LEGAL]).exp()))
    }
}

/// Statistical relevance classifier backed by a persisted naive Bayes model.
pub struct StatisticalClassifier {
    model: NaiveBayesModel,
}

impl StatisticalClassifier {
    pub fn new(model: NaiveBayesModel) -> Self {
        Self { model }
    }

    /// Load the model from `path`, retraining from the seed corpus when the
    /// file is missing, unreadable, or from an older feature layout. A failed
    /// write of the retrained model is logged and otherwise ignored.
    pub fn load_or_train(path: &Path) -> Self {
        match Self::load(path) {
            Ok(model) => {
                info!(
                    path = %path.display(),
                    vocabulary = model.vocabulary_size(),
                    "Classifier model loaded"
                );
                return Self { model };
            }
            Err(e) => {
                info!(path = %path.display(), reason = %e, "Training classifier from seed corpus");
            }
        }

        let model = NaiveBayesModel::train_on_seed();
        if let Err(e) = save_model(&model, path) {
            warn!(path = %path.display(), "Failed to persist classifier model: {:#}", e);
        }
        Self { model }
    }

    /// Retrain from the seed corpus and overwrite `path`.
    pub fn retrain(path: &Path) -> Result<Self> {
        let model = NaiveBayesModel::train_on_seed();
        save_model(&model, path)?;
        Ok(Self { model })
    }

    fn load(path: &Path) -> Result<NaiveBayesModel> {
        let bytes = std::fs::read(path).context("read model file")?;
        let model: NaiveBayesModel =
            serde_json::from_slice(&bytes).context("parse model file")?;
        if !model.is_usable() {
            anyhow::bail!("model version {} is stale or empty", model.version);
        }
        Ok(model)
    }

    pub fn model(&self) -> &NaiveBayesModel {
        &self.model
    }

    /// `(accept, confidence, rationale)`; confidence is `P(legal | question)`.
    pub fn classify(&self, question: &str) -> (bool, f32, String) {
        match self.evaluate(question) {
            Ok(reading) => (reading.accept, reading.score, reading.rationale),
            Err(e) => (false, 0.0, format!("classifier unavailable: {}", e)),
        }
    }

    pub fn features(&self, question: &str) -> BTreeMap<String, u32> {
        features(question)
    }
}

impl RelevanceSignal for StatisticalClassifier {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn evaluate(&self, question: &str) -> Result<SignalReading, ClassificationUnavailable> {
        let p = self.model.predict(question)? as f32;
        Ok(SignalReading {
            accept: p >= 0.5,
            score: p,
            rationale: format!("P(legal)={:.2}", p),
        })
    }
}

fn save_model(model: &NaiveBayesModel, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec(model).context("serialize model")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
