//! Keyword and pattern based legal-relevance scoring.
//!
//! The vocabulary is written as stems. A stem matches a token when the
//! token's own stem equals it, or, for stems of five characters and more,
//! when the token starts with it. Patterns containing spaces are phrases and
//! must match consecutive tokens.

use std::sync::LazyLock;

use regex::Regex;

use super::{normalize, stem, tokenize, RelevanceSignal, SignalReading};
use crate::error::ClassificationUnavailable;

/// Shortest stem that may match by prefix instead of by equality.
const PREFIX_MATCH_MIN_CHARS: usize = 5;

/// Score at which the keyword scorer alone votes "legal".
pub const DEFAULT_ACCEPT_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Standard,
    Colloquial,
    Foreign,
    Regional,
}

impl TermKind {
    fn label(self) -> &'static str {
        match self {
            TermKind::Standard => "standard",
            TermKind::Colloquial => "colloquial",
            TermKind::Foreign => "foreign",
            TermKind::Regional => "regional",
        }
    }
}

struct Term {
    pattern: &'static str,
    words: Vec<&'static str>,
    weight: f32,
    kind: TermKind,
}

struct Exclusion {
    label: &'static str,
    regex: Regex,
    penalty: f32,
}

use TermKind::{Colloquial, Foreign, Regional, Standard};

const VOCABULARY: &[(&str, f32, TermKind)] = &[
    // core procedure and institutions
    ("иск", 1.0, Standard),
    ("суд", 1.0, Standard),
    ("судебн", 1.0, Standard),
    ("закон", 1.0, Standard),
    ("кодекс", 1.0, Standard),
    ("юрист", 1.0, Standard),
    ("юридическ", 1.0, Standard),
    ("юриспруденц", 1.0, Standard),
    ("адвокат", 1.0, Standard),
    ("нотариу", 1.0, Standard),
    ("истец", 1.0, Standard),
    ("ответчик", 1.0, Standard),
    ("обжалов", 1.0, Standard),
    ("жалоб", 1.0, Standard),
    ("претенз", 1.0, Standard),
    ("уголовн", 1.0, Standard),
    ("конституц", 1.0, Standard),
    ("арбитраж", 1.0, Standard),
    ("штраф", 1.0, Standard),
    // family, inheritance, labour, contracts
    ("развод", 1.0, Standard),
    ("алимент", 1.0, Standard),
    ("наследств", 1.0, Standard),
    ("наследник", 1.0, Standard),
    ("завещан", 1.0, Standard),
    ("договор", 1.0, Standard),
    ("трудов договор", 1.0, Standard),
    ("уволи", 1.0, Standard),
    ("увольн", 1.0, Standard),
    ("работодател", 0.8, Standard),
    ("сделк", 0.8, Standard),
    ("ущерб", 0.8, Standard),
    ("правов", 0.8, Standard),
    ("персональн данн", 0.8, Standard),
    ("ответственност", 0.5, Standard),
    ("прав", 0.5, Standard),
    ("налог", 0.6, Standard),
    ("потребител", 0.6, Standard),
    ("зарплат", 0.6, Standard),
    ("гражданск", 0.6, Standard),
    ("трудов", 0.6, Standard),
    ("административн", 0.6, Standard),
    ("долг", 0.5, Standard),
    ("жилищн", 0.5, Standard),
    ("земельн", 0.5, Standard),
    ("страхов", 0.5, Standard),
    ("регистрац", 0.3, Standard),
    // specialized doctrine
    ("эстоппел", 1.0, Standard),
    ("субсидиарн", 1.0, Standard),
    ("виндикац", 1.0, Standard),
    ("виндикацион", 1.0, Standard),
    ("негаторн", 1.0, Standard),
    ("реституц", 1.0, Standard),
    ("цесси", 1.0, Standard),
    ("новаци", 1.0, Standard),
    ("суброгац", 1.0, Standard),
    ("деликт", 1.0, Standard),
    ("недееспособн", 1.0, Standard),
    // everyday grievances
    ("кинул", 0.8, Colloquial),
    ("обман", 0.8, Colloquial),
    ("мошенн", 1.0, Colloquial),
    ("не плат", 0.8, Colloquial),
    ("без соглас", 0.8, Colloquial),
    ("задержал", 0.8, Colloquial),
    ("полици", 0.6, Colloquial),
    ("гаранти", 0.5, Colloquial),
    ("сосед", 0.3, Colloquial),
    ("списал", 0.5, Colloquial),
    // Latin and foreign doctrine
    ("habeas corpus", 1.0, Foreign),
    ("pacta sunt servanda", 1.0, Foreign),
    ("res ipsa loquitur", 1.0, Foreign),
    ("de minimis", 1.0, Foreign),
    ("ultra vires", 1.0, Foreign),
    ("pro bono", 1.0, Foreign),
    ("force majeure", 1.0, Foreign),
    ("форс-мажор", 1.0, Foreign),
    ("caveat emptor", 1.0, Foreign),
    ("respondeat superior", 1.0, Foreign),
    ("nemo dat", 1.0, Foreign),
    // Belarus-specific references
    ("рб", 0.3, Regional),
    ("беларус", 0.3, Regional),
    ("минск", 0.3, Regional),
    ("гомел", 0.3, Regional),
    ("брест", 0.3, Regional),
    ("витебск", 0.3, Regional),
    ("гродн", 0.3, Regional),
    ("могилев", 0.3, Regional),
    ("пвт", 0.5, Regional),
    ("ип", 0.6, Regional),
];

static ARTICLE_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ст\.?\s*\d+|стать[яиеюй]\s+\d+|п\.\s*\d+\s+ст\.)")
        .expect("article reference regex is valid")
});

const EXCLUSIONS: &[(&str, &str, f32)] = &[
    (
        "access rights",
        r"прав[аоы]?\s+(?:доступа|администратора|пользователя)",
        0.6,
    ),
    ("database", r"баз[аеуы]\s+данных", 0.4),
    ("class inheritance", r"наследовани\w*\s+класс|программировани", 0.8),
    ("cinema", r"\bв\s+кино\b|фильм|сериал", 0.8),
    ("video game", r"компьютерн\w*\s+игр", 0.6),
    ("software", r"\b(?:windows|linux|excel|python|java|sql)\b", 0.5),
    ("gardening", r"растени|вредител", 0.6),
    ("internet provider", r"провайдер|роутер", 0.5),
    ("hiring", r"ищет\s+программист", 0.6),
    (
        "cooking and weather",
        r"\b(?:приготов\w*|готовит\w*|рецепт\w*|погод\w*)",
        0.6,
    ),
];

/// Lexical relevance scorer.
pub struct LexicalScorer {
    terms: Vec<Term>,
    exclusions: Vec<Exclusion>,
    accept_threshold: f32,
    saturation: f32,
}

impl LexicalScorer {
    pub fn new() -> Self {
        let terms = VOCABULARY
            .iter()
            .map(|&(pattern, weight, kind)| Term {
                pattern,
                words: pattern.split(' ').collect(),
                weight,
                kind,
            })
            .collect();
        let exclusions = EXCLUSIONS
            .iter()
            .map(|&(label, pattern, penalty)| Exclusion {
                label,
                regex: Regex::new(pattern).expect("exclusion regex is valid"),
                penalty,
            })
            .collect();
        Self {
            terms,
            exclusions,
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            saturation: 2.0,
        }
    }

    pub fn with_accept_threshold(mut self, threshold: f32) -> Self {
        self.accept_threshold = threshold;
        self
    }

    /// `(accept, score, rationale)` for a question.
    pub fn score(&self, question: &str) -> (bool, f32, String) {
        let normalized = normalize(question);
        if normalized.trim().is_empty() {
            return (false, 0.0, "empty question".to_string());
        }

        let tokens = tokenize(&normalized);
        let stems: Vec<String> = tokens.iter().map(|t| stem(t)).collect();

        let mut total = 0.0f32;
        let mut matched = Vec::new();
        for term in &self.terms {
            if phrase_present(&term.words, &tokens, &stems) {
                total += term.weight;
                matched.push(format!("{}({})", term.pattern, term.kind.label()));
            }
        }
        if ARTICLE_REFERENCE_RE.is_match(&normalized) {
            total += 1.0;
            matched.push("article reference".to_string());
        }

        let mut penalty = 0.0f32;
        let mut excluded = Vec::new();
        for exclusion in &self.exclusions {
            if exclusion.regex.is_match(&normalized) {
                penalty += exclusion.penalty;
                excluded.push(exclusion.label);
            }
        }

        let score = ((total / self.saturation).min(1.0) - penalty).clamp(0.0, 1.0);
        let accept = score >= self.accept_threshold;

        let mut rationale = if matched.is_empty() {
            "no legal vocabulary".to_string()
        } else {
            format!("matched {}", matched.join(", "))
        };
        if !excluded.is_empty() {
            rationale.push_str(&format!("; penalized for {}", excluded.join(", ")));
        }
        (accept, score, rationale)
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RelevanceSignal for LexicalScorer {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn evaluate(&self, question: &str) -> Result<SignalReading, ClassificationUnavailable> {
        if question.trim().is_empty() {
            return Err(ClassificationUnavailable::EmptyInput);
        }
        let (accept, score, rationale) = self.score(question);
        Ok(SignalReading {
            accept,
            score,
            rationale,
        })
    }
}

fn word_matches(token: &str, token_stem: &str, pattern: &str) -> bool {
    token_stem == pattern
        || token == pattern
        || (pattern.chars().count() >= PREFIX_MATCH_MIN_CHARS && token.starts_with(pattern))
}

fn phrase_present(words: &[&str], tokens: &[String], stems: &[String]) -> bool {
    if words.is_empty() || tokens.len() < words.len() {
        return false;
    }
    (0..=tokens.len() - words.len()).any(|start| {
        words
            .iter()
            .enumerate()
            .all(|(i, w)| word_matches(&tokens[start + i], &stems[start + i], w))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_scores_zero() {
        let scorer = LexicalScorer::new();
        for q in ["", "   ", "\n\t"] {
            let (accept, score, _) = scorer.score(q);
            assert!(!accept);
            assert_eq!(score, 0.0);
        }
        assert!(scorer.evaluate("  ").is_err());
    }

    #[test]
    fn test_standard_terms_accept() {
        let scorer = LexicalScorer::new();
        for q in [
            "Как подать иск в суд?",
            "Какие документы нужны для развода в РБ?",
            "Как оформить трудовой договор по ТК РБ?",
            "Кто платит алименты на ребенка?",
            "Как подготовить документы для развода?",
            "Как подготовить иск?",
        ] {
            let (accept, score, rationale) = scorer.score(q);
            assert!(accept, "{q}: {score} {rationale}");
            assert!(score >= 0.5, "{q}: {score}");
            assert!(!rationale.contains("penalized"), "{q}: {rationale}");
        }
    }

    #[test]
    fn test_stricter_accept_threshold() {
        let strict = LexicalScorer::new().with_accept_threshold(0.9);
        let (accept, score, _) = strict.score("Как подготовить иск?");
        assert!(!accept, "{score}");
        let (accept, _, _) = strict.score("Как подать иск в суд по статье 15 ГК РБ?");
        assert!(accept);
    }

    #[test]
    fn test_inflected_forms_match() {
        let scorer = LexicalScorer::new();
        let (accept, _, rationale) = scorer.score("Подписали трудового договора в пятницу");
        assert!(accept);
        assert!(rationale.contains("трудов договор"), "{rationale}");
    }

    #[test]
    fn test_colloquial_and_foreign_terms() {
        let scorer = LexicalScorer::new();
        let (accept, _, rationale) = scorer.score("Меня кинули с деньгами, что делать?");
        assert!(accept);
        assert!(rationale.contains("colloquial"));

        let (accept, _, rationale) = scorer.score("Концепция force majeure в договорах");
        assert!(accept);
        assert!(rationale.contains("foreign"));
    }

    #[test]
    fn test_article_reference_counts() {
        let scorer = LexicalScorer::new();
        let (accept, score, _) = scorer.score("Что говорит ст. 1014?");
        assert!(accept);
        assert!(score >= 0.5);
    }

    #[test]
    fn test_exclusions_reject_technical_questions() {
        let scorer = LexicalScorer::new();
        for q in [
            "Права доступа к базе данных",
            "Права администратора в Windows",
            "Наследование классов в программировании",
            "Договор с интернет-провайдером не работает",
            "Как работает суд присяжных в кино?",
        ] {
            let (accept, score, rationale) = scorer.score(q);
            assert!(!accept, "{q}: {score} {rationale}");
            assert!(rationale.contains("penalized"));
        }
    }

    #[test]
    fn test_generic_and_everyday_questions_score_low() {
        let scorer = LexicalScorer::new();
        for q in ["Что мне делать?", "Как приготовить борщ?", "Какая погода завтра?"] {
            let (accept, score, _) = scorer.score(q);
            assert!(!accept, "{q}");
            assert!(score < 0.2);
        }
    }

    #[test]
    fn test_penalty_never_raises_score() {
        let scorer = LexicalScorer::new();
        let (_, plain, _) = scorer.score("Договор аренды");
        let (_, penalized, _) = scorer.score("Договор аренды в Excel");
        assert!(penalized < plain);
    }
}
