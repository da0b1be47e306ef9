use super::{KnowledgeBase, QueryHit};
use crate::error::Result;

/// Placeholder context when no knowledge base is attached
pub const NO_KNOWLEDGE_BASE: &str = "No knowledge base available";

/// Anything that can answer a similarity query with ranked fragments
pub trait KnowledgeSource {
    fn query(&mut self, text: &str, top_k: usize) -> Result<Vec<QueryHit>>;
}

impl KnowledgeSource for KnowledgeBase {
    fn query(&mut self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        KnowledgeBase::query(self, text, top_k)
    }
}

/// Retrieved fragment texts joined by newlines, for prompt construction
///
/// Without a source the fixed placeholder is returned and nothing is queried.
pub fn knowledge_context(
    source: Option<&mut dyn KnowledgeSource>,
    query: &str,
    top_k: usize,
) -> Result<String> {
    let Some(source) = source else {
        return Ok(NO_KNOWLEDGE_BASE.to_string());
    };

    let hits = source.query(query, top_k)?;
    Ok(hits
        .into_iter()
        .map(|hit| hit.text)
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::tests::TableProvider;
    use crate::store::Metadata;
    use std::sync::Arc;

    #[test]
    fn test_context_without_source() {
        assert_eq!(
            knowledge_context(None, "phishing", 3).unwrap(),
            NO_KNOWLEDGE_BASE
        );
    }

    #[test]
    fn test_context_joins_hit_texts() {
        let provider = Arc::new(TableProvider::new(&[
            ("hover links", vec![1.0, 0.1]),
            ("report emails", vec![0.9, 0.3]),
            ("unrelated", vec![-1.0, 0.0]),
            ("phishing", vec![1.0, 0.0]),
        ]));
        let mut kb = KnowledgeBase::new(provider);
        for text in ["hover links", "report emails", "unrelated"] {
            kb.add(text, Metadata::new()).unwrap();
        }

        let context = knowledge_context(Some(&mut kb), "phishing", 5).unwrap();
        assert_eq!(context, "hover links\nreport emails");
    }
}
