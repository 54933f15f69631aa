//! Knowledge base lookups for general banking questions
//!
//! A FAQ file (`[{"question": ..., "answer": ...}]`) ranked by keyword
//! overlap with the user's query. No embeddings, no index.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const KNOWLEDGE_PREFIX: &str = "Found relevant information in the knowledge base:";

/// Entries returned per lookup
const MAX_RESULTS: usize = 3;

/// Shared non-stopword terms needed for an entry to count as relevant
const MIN_OVERLAP: usize = 2;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "are", "can", "how", "what", "with", "does", "this",
    "that", "from", "have", "about", "please", "tell", "want", "into", "there", "which", "when",
];

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Supplementary context for `query`, or `None` when nothing is relevant
    async fn lookup(&self, query: &str) -> Option<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

pub struct FaqKnowledgeBase {
    entries: Vec<(FaqEntry, BTreeSet<String>)>,
}

impl FaqKnowledgeBase {
    pub fn from_entries(entries: Vec<FaqEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let terms = terms(&format!("{} {}", entry.question, entry.answer));
                (entry, terms)
            })
            .collect();

        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let entries: Vec<FaqEntry> = serde_json::from_str(&raw)?;

        info!(path = %path.display(), entries = entries.len(), "Knowledge base loaded");

        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn search(&self, query: &str) -> Vec<&FaqEntry> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize, &FaqEntry)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, (entry, entry_terms))| {
                (query_terms.intersection(entry_terms).count(), idx, entry)
            })
            .filter(|(overlap, _, _)| *overlap >= MIN_OVERLAP)
            .collect();

        // Highest overlap first, file order on ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(MAX_RESULTS)
            .map(|(_, _, entry)| entry)
            .collect()
    }
}

#[async_trait]
impl KnowledgeBase for FaqKnowledgeBase {
    async fn lookup(&self, query: &str) -> Option<String> {
        let hits = self.search(query);

        debug!(hits = hits.len(), "Knowledge base search");

        if hits.is_empty() {
            return None;
        }

        let context = hits
            .iter()
            .map(|entry| format!("Q: {}\nA: {}", entry.question, entry.answer))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        Some(format!("{}\n\n{}", KNOWLEDGE_PREFIX, context))
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn faq() -> FaqKnowledgeBase {
        FaqKnowledgeBase::from_entries(vec![
            FaqEntry {
                question: "How can I check my account balance?".to_string(),
                answer: "Open the dashboard and select the account to see its available balance."
                    .to_string(),
            },
            FaqEntry {
                question: "How do I dispute a card transaction?".to_string(),
                answer: "Ask the assistant to raise a dispute with the transaction ID and a reason."
                    .to_string(),
            },
        ])
    }

    #[tokio::test]
    async fn test_lookup_finds_overlapping_entry() {
        let context = faq().lookup("How do I check my balance?").await.unwrap();

        assert!(context.starts_with(KNOWLEDGE_PREFIX));
        assert!(context.contains("check my account balance"));
        assert!(!context.contains("dispute"));
    }

    #[tokio::test]
    async fn test_lookup_without_overlap_is_none() {
        assert!(faq().lookup("What's the weather today?").await.is_none());
        assert!(faq().lookup("").await.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"question": "What are transaction types?", "answer": "Debit and credit."}]"#)
            .unwrap();

        let kb = FaqKnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.len(), 1);

        let context = tokio_test::block_on(kb.lookup("list the transaction types")).unwrap();
        assert!(context.contains("Debit and credit."));
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ nope").unwrap();

        assert!(FaqKnowledgeBase::load(file.path()).is_err());
    }
}
