use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lexical::LexicalScorer;
use super::statistical::StatisticalClassifier;
use super::{RelevanceSignal, SignalReading};

/// Tie-break thresholds used when the signals disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    /// Statistical confidence (either direction) that overrides the lexical signal.
    pub stat_high_confidence: f32,
    /// Lexical score that is enough to accept on its own.
    pub lexical_strong: f32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            stat_high_confidence: 0.7,
            lexical_strong: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceVerdict {
    pub is_legal: bool,
    pub confidence: f32,
    pub rationale: String,
    pub contributing_signals: BTreeMap<String, f32>,
}

impl RelevanceVerdict {
    fn rejected(rationale: impl Into<String>) -> Self {
        Self {
            is_legal: false,
            confidence: 0.0,
            rationale: rationale.into(),
            contributing_signals: BTreeMap::new(),
        }
    }
}

/// Combines the lexical and statistical signals into one accept/reject decision.
pub struct RelevanceArbiter {
    lexical: Box<dyn RelevanceSignal>,
    statistical: Box<dyn RelevanceSignal>,
    thresholds: GateThresholds,
}

impl RelevanceArbiter {
    pub fn new(
        lexical: Box<dyn RelevanceSignal>,
        statistical: Box<dyn RelevanceSignal>,
        thresholds: GateThresholds,
    ) -> Self {
        Self {
            lexical,
            statistical,
            thresholds,
        }
    }

    pub fn from_parts(lexical: LexicalScorer, statistical: StatisticalClassifier) -> Self {
        Self::new(
            Box::new(lexical),
            Box::new(statistical),
            GateThresholds::default(),
        )
    }

    /// `(is_legal, score, explanation)` using the construction-time thresholds.
    pub fn is_legal_question(&self, question: &str) -> (bool, f32, String) {
        let verdict = self.evaluate(question);
        (verdict.is_legal, verdict.confidence, verdict.rationale)
    }

    pub fn evaluate(&self, question: &str) -> RelevanceVerdict {
        self.evaluate_with(question, &self.thresholds)
    }

    /// Decide with explicit thresholds, so callers holding runtime-tunable
    /// values don't have to rebuild the arbiter.
    pub fn evaluate_with(&self, question: &str, thresholds: &GateThresholds) -> RelevanceVerdict {
        if question.trim().is_empty() {
            return RelevanceVerdict::rejected("empty question");
        }

        let lexical = self.lexical.evaluate(question);
        let statistical = self.statistical.evaluate(question);

        let mut signals = BTreeMap::new();
        if let Ok(r) = &lexical {
            signals.insert(self.lexical.name().to_string(), r.score);
        }
        if let Ok(r) = &statistical {
            signals.insert(self.statistical.name().to_string(), r.score);
        }

        let (is_legal, confidence, rationale) = match (&lexical, &statistical) {
            (Ok(lex), Ok(stat)) => self.combine(lex, stat, thresholds),
            (Ok(lex), Err(e)) => (
                lex.accept,
                lex.score,
                format!(
                    "{} alone ({}); {} unavailable: {}",
                    self.lexical.name(),
                    lex.rationale,
                    self.statistical.name(),
                    e
                ),
            ),
            (Err(e), Ok(stat)) => (
                stat.accept,
                stat.score,
                format!(
                    "{} alone ({}); {} unavailable: {}",
                    self.statistical.name(),
                    stat.rationale,
                    self.lexical.name(),
                    e
                ),
            ),
            (Err(lex_err), Err(stat_err)) => (
                false,
                0.0,
                format!(
                    "classification unavailable: {}: {}; {}: {}",
                    self.lexical.name(),
                    lex_err,
                    self.statistical.name(),
                    stat_err
                ),
            ),
        };

        debug!(is_legal, confidence, rationale = %rationale, "relevance verdict");
        RelevanceVerdict {
            is_legal,
            confidence: confidence.clamp(0.0, 1.0),
            rationale,
            contributing_signals: signals,
        }
    }

    fn combine(
        &self,
        lex: &SignalReading,
        stat: &SignalReading,
        t: &GateThresholds,
    ) -> (bool, f32, String) {
        let lex_name = self.lexical.name();
        let stat_name = self.statistical.name();

        if lex.accept == stat.accept {
            let (score, verdict) = if lex.accept {
                (lex.score.max(stat.score), "accept")
            } else {
                (lex.score.min(stat.score), "reject")
            };
            return (
                lex.accept,
                score,
                format!(
                    "{lex_name} and {stat_name} agree to {verdict} ({}; {})",
                    lex.rationale, stat.rationale
                ),
            );
        }

        let mean = (lex.score + stat.score) / 2.0;
        if stat.accept && stat.score >= t.stat_high_confidence {
            (
                true,
                mean,
                format!("{stat_name} confidently accepts ({}) over {lex_name} ({})", stat.rationale, lex.rationale),
            )
        } else if lex.accept && lex.score >= t.lexical_strong {
            (
                true,
                mean,
                format!("{lex_name} strongly accepts ({}) over {stat_name} ({})", lex.rationale, stat.rationale),
            )
        } else if !stat.accept && 1.0 - stat.score >= t.stat_high_confidence {
            (
                false,
                mean,
                format!("{stat_name} confidently rejects ({}) over {lex_name} ({})", stat.rationale, lex.rationale),
            )
        } else {
            (
                false,
                mean,
                format!(
                    "signals disagree without strong support ({lex_name}: {}; {stat_name}: {})",
                    lex.rationale, stat.rationale
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassificationUnavailable;
    use crate::gate::statistical::NaiveBayesModel;

    struct Fixed {
        name: &'static str,
        reading: Option<(bool, f32)>,
    }

    impl RelevanceSignal for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn evaluate(&self, _question: &str) -> Result<SignalReading, ClassificationUnavailable> {
            match self.reading {
                Some((accept, score)) => Ok(SignalReading {
                    accept,
                    score,
                    rationale: format!("fixed {score}"),
                }),
                None => Err(ClassificationUnavailable::Model("offline".to_string())),
            }
        }
    }

    fn stub(lex: Option<(bool, f32)>, stat: Option<(bool, f32)>) -> RelevanceArbiter {
        RelevanceArbiter::new(
            Box::new(Fixed { name: "lexical", reading: lex }),
            Box::new(Fixed { name: "statistical", reading: stat }),
            GateThresholds::default(),
        )
    }

    fn real() -> RelevanceArbiter {
        RelevanceArbiter::from_parts(
            LexicalScorer::new(),
            StatisticalClassifier::new(NaiveBayesModel::train_on_seed()),
        )
    }

    #[test]
    fn test_empty_input_rejected_without_signals() {
        let arbiter = stub(Some((true, 1.0)), Some((true, 1.0)));
        for q in ["", "   ", "\t\n"] {
            let v = arbiter.evaluate(q);
            assert!(!v.is_legal);
            assert_eq!(v.confidence, 0.0);
            assert!(v.contributing_signals.is_empty());
        }
    }

    #[test]
    fn test_agreement_takes_extreme() {
        let v = stub(Some((true, 0.6)), Some((true, 0.9))).evaluate("q");
        assert!(v.is_legal);
        assert!((v.confidence - 0.9).abs() < 1e-6);

        let v = stub(Some((false, 0.1)), Some((false, 0.3))).evaluate("q");
        assert!(!v.is_legal);
        assert!((v.confidence - 0.1).abs() < 1e-6);
        assert!(v.rationale.contains("agree"));
    }

    #[test]
    fn test_tie_break_order() {
        // confident statistical acceptance wins
        let v = stub(Some((false, 0.05)), Some((true, 0.8))).evaluate("q");
        assert!(v.is_legal);
        assert!(v.rationale.starts_with("statistical confidently accepts"));

        // strong lexical acceptance beats a confident statistical rejection
        let v = stub(Some((true, 0.55)), Some((false, 0.1))).evaluate("q");
        assert!(v.is_legal);
        assert!(v.rationale.starts_with("lexical strongly accepts"));

        // weak lexical acceptance loses to a confident rejection
        let v = stub(Some((true, 0.3)), Some((false, 0.2))).evaluate("q");
        assert!(!v.is_legal);
        assert!(v.rationale.starts_with("statistical confidently rejects"));

        // nothing strong: reject, mid-range score
        let v = stub(Some((true, 0.3)), Some((false, 0.45))).evaluate("q");
        assert!(!v.is_legal);
        assert!((v.confidence - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let arbiter = stub(Some((false, 0.05)), Some((true, 0.65)));
        assert!(!arbiter.evaluate("q").is_legal);
        let relaxed = GateThresholds {
            stat_high_confidence: 0.6,
            ..GateThresholds::default()
        };
        assert!(arbiter.evaluate_with("q", &relaxed).is_legal);
    }

    #[test]
    fn test_single_signal_fallback() {
        let v = stub(None, Some((true, 0.9))).evaluate("q");
        assert!(v.is_legal);
        assert!(v.rationale.contains("statistical alone"));
        assert_eq!(v.contributing_signals.len(), 1);

        let v = stub(Some((false, 0.0)), None).evaluate("q");
        assert!(!v.is_legal);
        assert!(v.rationale.contains("lexical alone"));
    }

    #[test]
    fn test_both_unavailable_rejects() {
        let (is_legal, score, explanation) = stub(None, None).is_legal_question("q");
        assert!(!is_legal);
        assert_eq!(score, 0.0);
        assert!(explanation.contains("unavailable"));
    }

    #[test]
    fn test_legal_keywords_accepted() {
        let arbiter = real();
        for q in [
            "Как подать иск?",
            "Помогите с разводом",
            "Нужен трудовой договор",
            "Как подать иск в суд в Беларуси?",
            "Как оформить наследство?",
            "Как подготовить документы для развода?",
        ] {
            let (is_legal, score, why) = arbiter.is_legal_question(q);
            assert!(is_legal, "{q}: {score} {why}");
        }
    }

    #[test]
    fn test_technical_false_positives_rejected() {
        let arbiter = real();
        for q in [
            "Права доступа к базе данных",
            "Права администратора в Windows",
            "Наследование классов в программировании",
            "Как приготовить борщ?",
        ] {
            let (is_legal, score, why) = arbiter.is_legal_question(q);
            assert!(!is_legal, "{q}: {score} {why}");
        }
    }

    #[test]
    fn test_specialized_term_accepted() {
        let v = real().evaluate("Эстоппель в гражданском праве");
        assert!(v.is_legal, "{}", v.rationale);
        assert!(v.contributing_signals.contains_key("statistical"));
    }
}
