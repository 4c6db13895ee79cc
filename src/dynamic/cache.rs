//! Memory of questions a dynamic search has already covered.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use crate::gate::content_stems;
use crate::knowledge::types::DocId;

/// Lowercased question with punctuation dropped and whitespace collapsed.
pub fn normalize_question(question: &str) -> String {
    crate::gate::tokenize(question).join(" ")
}

/// Sorted, deduplicated content stems that identify what a question is about.
pub fn salient_terms(question: &str) -> Vec<String> {
    content_stems(question)
        .into_iter()
        .filter(|s| s.chars().count() >= 3)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Jaccard similarity of two term sets; zero when both are empty.
pub fn jaccard(a: &[String], b: &[String]) -> f32 {
    let a: BTreeSet<&String> = a.iter().collect();
    let b: BTreeSet<&String> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

/// Normalized question -> documents a prior dynamic search ingested for it.
#[derive(Default)]
pub struct SearchCache {
    entries: RwLock<HashMap<String, Vec<DocId>>>,
}

impl SearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, question: &str) -> Option<Vec<DocId>> {
        self.entries
            .read()
            .await
            .get(&normalize_question(question))
            .cloned()
    }

    pub async fn insert(&self, question: &str, doc_ids: Vec<DocId>) {
        self.entries
            .write()
            .await
            .insert(normalize_question(question), doc_ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_question_ignores_case_and_punctuation() {
        assert_eq!(normalize_question("Как подать  ИСК в суд?!"), "как подать иск в суд");
        assert_eq!(normalize_question("как подать иск в суд"), "как подать иск в суд");
    }

    #[test]
    fn test_salient_terms_sorted_and_deduplicated() {
        assert_eq!(salient_terms("Иск, иска и иском в суд"), vec!["иск", "суд"]);
    }

    #[test]
    fn test_jaccard() {
        let a = vec!["иск".to_string(), "суд".to_string()];
        let b = vec!["иск".to_string(), "суд".to_string(), "пода".to_string()];
        assert!((jaccard(&a, &b) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn test_cache_hit_on_rephrased_punctuation() {
        let cache = SearchCache::new();
        cache.insert("Как подать иск в суд?", vec!["a".to_string()]).await;
        let hit = cache.get("как подать иск в суд").await.unwrap();
        assert_eq!(hit, vec!["a".to_string()]);
        assert!(cache.get("Как оформить развод?").await.is_none());
    }
}
