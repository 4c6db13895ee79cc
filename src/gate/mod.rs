pub mod arbiter;
pub mod lexical;
mod seed;
pub mod statistical;

use crate::error::ClassificationUnavailable;

/// Function words ignored by every text feature extractor in the crate.
const STOP_WORDS: &[&str] = &[
    "а", "без", "бы", "в", "во", "вы", "да", "для", "до", "его", "ее", "если", "же", "за",
    "и", "из", "или", "им", "их", "к", "как", "ко", "когда", "ли", "мне", "мы", "на", "над",
    "не", "него", "нет", "ни", "но", "о", "об", "он", "она", "они", "от", "по", "под", "при",
    "с", "со", "так", "там", "то", "ты", "у", "уже", "чем", "что", "чтобы", "это", "я",
];

/// Endings stripped by [`stem`], longest first so the first hit is the longest suffix.
const SUFFIXES: &[&str] = &[
    "ться", "ями", "ами", "ого", "его", "ому", "ему", "ыми", "ими", "иях", "ией", "ешь", "ишь",
    "ать", "ять", "ить", "еть", "уть", "ах", "ях", "ов", "ев", "ей", "ой", "ий", "ый", "ая",
    "яя", "ое", "ее", "ые", "ие", "ых", "их", "ом", "ем", "ам", "ям", "ую", "юю", "ть", "ет",
    "ит", "ут", "ют", "ат", "ят", "ся", "сь", "ия", "ья", "ью", "ию", "а", "я", "о", "е", "ы",
    "и", "у", "ю", "ь", "й",
];

/// One relevance signal's opinion about a question.
#[derive(Debug, Clone)]
pub struct SignalReading {
    pub accept: bool,
    /// Probability-like score in [0, 1] that the question is legal.
    pub score: f32,
    pub rationale: String,
}

/// A legal-relevance classifier the arbiter can consult.
pub trait RelevanceSignal: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, question: &str) -> Result<SignalReading, ClassificationUnavailable>;
}

pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace('ё', "е")
}

/// Split text into lowercase word tokens. Inner hyphens survive ("форс-мажор").
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Light Russian stemmer: strips at most one inflectional ending and never
/// leaves fewer than three characters.
pub fn stem(word: &str) -> String {
    let len = word.chars().count();
    if len <= 3 {
        return word.to_string();
    }
    for suffix in SUFFIXES {
        if word.ends_with(suffix) {
            let keep = len - suffix.chars().count();
            if keep >= 3 {
                return word.chars().take(keep).collect();
            }
        }
    }
    word.to_string()
}

/// Stems of the content words of `text`, in order, stop words removed.
pub fn content_stems(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .map(|t| stem(&t))
        .collect()
}
