//! Answer synthesis: budgeted prompt assembly and the generation call.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::RagConfig;
use crate::document::{Answer, RetrievedMatch};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::retry::ProviderGate;

const INSTRUCTIONS: &str = "\
You answer questions using only the numbered context documents below.
Cite the documents you rely on by their bracketed number, for example [1].
If the context does not contain the answer, say that you do not know.";

/// A prompt together with the documents that made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    /// Ids of the included documents, in rank order.
    pub sources: Vec<String>,
    /// Characters of document content included.
    pub context_chars: usize,
    /// Whether the single included document was cut to fit the budget.
    pub truncated: bool,
}

/// Build a prompt from `matches` in rank order without exceeding `budget`
/// characters of document content.
///
/// Whole documents are included until the next one does not fit; it and
/// everything ranked below it are dropped. When even the top match is larger
/// than the budget, its first `budget` characters are included and it is
/// still reported in `sources`.
pub fn build_prompt(question: &str, matches: &[RetrievedMatch], budget: usize) -> Prompt {
    let mut included: Vec<(&RetrievedMatch, String)> = Vec::new();
    let mut used = 0;
    let mut truncated = false;

    for m in matches {
        let len = m.content.chars().count();
        if used + len <= budget {
            used += len;
            included.push((m, m.content.clone()));
            continue;
        }
        if included.is_empty() && budget > 0 {
            included.push((m, m.content.chars().take(budget).collect()));
            used = budget;
            truncated = true;
        }
        break;
    }

    let mut text = String::with_capacity(INSTRUCTIONS.len() + used + question.len() + 64);
    text.push_str(INSTRUCTIONS);
    text.push_str("\n\nContext:\n");
    for (position, (m, content)) in included.iter().enumerate() {
        text.push_str(&format!("[{}] (id: {})\n{}\n\n", position + 1, m.document_id, content));
    }
    text.push_str(&format!("Question: {}\nAnswer:", question.trim()));

    Prompt {
        text,
        sources: included.iter().map(|(m, _)| m.document_id.clone()).collect(),
        context_chars: used,
        truncated,
    }
}

/// Produces cited answers from ranked matches.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    gate: ProviderGate,
    context_budget: usize,
    insufficient_context_answer: String,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn GenerationProvider>, gate: ProviderGate, config: &RagConfig) -> Self {
        Self {
            generator,
            gate,
            context_budget: config.context_budget,
            insufficient_context_answer: config.insufficient_context_answer.clone(),
        }
    }

    /// The canned answer for an empty context set.
    pub fn insufficient_context(&self) -> Answer {
        Answer { text: self.insufficient_context_answer.clone(), sources: Vec::new() }
    }

    /// Answer `question` from `matches`, which must already be in rank order.
    ///
    /// With no matches the canned answer is returned and the model is not called.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `question` is blank.
    /// - [`RagError::ProviderUnavailable`] / [`RagError::ProviderRejected`] from generation,
    ///   including a model reply with no text.
    pub async fn answer(&self, question: &str, matches: &[RetrievedMatch]) -> Result<Answer> {
        if matches.is_empty() {
            info!("no context above threshold, returning canned answer");
            return Ok(self.insufficient_context());
        }
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }

        let prompt = build_prompt(question, matches, self.context_budget);
        debug!(
            provided = matches.len(),
            included = prompt.sources.len(),
            context_chars = prompt.context_chars,
            truncated = prompt.truncated,
            "assembled prompt"
        );

        let generator = self.generator.as_ref();
        let prompt_text = prompt.text.as_str();
        let text = self
            .gate
            .call(generator.name(), "generate", move || generator.generate(prompt_text))
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::ProviderRejected {
                provider: generator.name().to_string(),
                message: "model returned an empty answer".to_string(),
            });
        }

        info!(source_count = prompt.sources.len(), "answer generated");
        Ok(Answer { text: text.to_string(), sources: prompt.sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn m(id: &str, content: &str, score: f32) -> RetrievedMatch {
        RetrievedMatch {
            document_id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            score,
        }
    }

    #[test]
    fn includes_in_rank_order_within_budget() {
        let matches = [m("a", "aaaa", 0.9), m("b", "bbb", 0.8), m("c", "cc", 0.7)];
        let prompt = build_prompt("q?", &matches, 7);
        assert_eq!(prompt.sources, ["a", "b"]);
        assert_eq!(prompt.context_chars, 7);
        assert!(!prompt.truncated);
        assert!(prompt.text.find("[1] (id: a)").unwrap() < prompt.text.find("[2] (id: b)").unwrap());
        assert!(!prompt.text.contains("(id: c)"));
    }

    #[test]
    fn lower_ranked_matches_are_dropped_after_first_misfit() {
        // "c" would fit on its own but ranks below the misfit "b".
        let matches = [m("a", "aaaa", 0.9), m("b", "bbbbbb", 0.8), m("c", "c", 0.7)];
        let prompt = build_prompt("q?", &matches, 5);
        assert_eq!(prompt.sources, ["a"]);
    }

    #[test]
    fn oversized_top_match_is_cut_and_accounted() {
        let matches = [m("big", "ééééééééé", 0.9), m("small", "s", 0.5)];
        let prompt = build_prompt("q?", &matches, 4);
        assert_eq!(prompt.sources, ["big"]);
        assert_eq!(prompt.context_chars, 4);
        assert!(prompt.truncated);
        assert!(prompt.text.contains("éééé\n"));
        assert!(!prompt.text.contains("ééééé"));
    }
}
