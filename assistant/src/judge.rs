//! LLM-as-judge grading of generated answers.

use crate::llm::{Generator, TokenUsage};
use crate::prompt::relevance_prompt;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relevance {
    NonRelevant,
    PartlyRelevant,
    Relevant,
    /// The judge's output could not be read.
    #[serde(other)]
    Unknown,
}

impl Relevance {
    pub fn as_str(self) -> &'static str {
        match self {
            Relevance::NonRelevant => "NON_RELEVANT",
            Relevance::PartlyRelevant => "PARTLY_RELEVANT",
            Relevance::Relevant => "RELEVANT",
            Relevance::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    #[serde(rename = "Relevance")]
    pub relevance: Relevance,
    #[serde(rename = "Explanation", default = "unparsed_explanation")]
    pub explanation: String,
}

fn unparsed_explanation() -> String {
    "Failed to parse evaluation".to_string()
}

impl RelevanceVerdict {
    pub fn unparsed() -> Self {
        Self { relevance: Relevance::Unknown, explanation: unparsed_explanation() }
    }
}

/// Read the judge's JSON reply. Anything unreadable becomes an `Unknown` verdict.
pub fn parse_verdict(text: &str) -> RelevanceVerdict {
    match serde_json::from_str::<RelevanceVerdict>(text.trim()) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "judge returned unparsable evaluation");
            RelevanceVerdict::unparsed()
        }
    }
}

/// Ask `generator` to grade `answer`.
pub async fn evaluate_relevance(
    generator: &dyn Generator,
    question: &str,
    answer: &str,
    model: &str,
) -> Result<(RelevanceVerdict, TokenUsage)> {
    let prompt = relevance_prompt(question, answer);
    let completion = generator.generate(&prompt, model).await?;
    Ok((parse_verdict(&completion.text), completion.usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_verdict() {
        let v = parse_verdict(r#"{"Relevance": "PARTLY_RELEVANT", "Explanation": "close"}"#);
        assert_eq!(v.relevance, Relevance::PartlyRelevant);
        assert_eq!(v.explanation, "close");
    }

    #[test]
    fn missing_explanation_gets_the_fallback_text() {
        let v = parse_verdict(r#"{"Relevance": "RELEVANT"}"#);
        assert_eq!(v.relevance, Relevance::Relevant);
        assert_eq!(v.explanation, "Failed to parse evaluation");
    }

    #[test]
    fn code_fenced_output_is_unknown() {
        let v = parse_verdict("```json\n{\"Relevance\": \"RELEVANT\"}\n```");
        assert_eq!(v, RelevanceVerdict::unparsed());
    }

    #[test]
    fn unexpected_label_is_unknown() {
        let v = parse_verdict(r#"{"Relevance": "SOMEWHAT", "Explanation": "?"}"#);
        assert_eq!(v.relevance, Relevance::Unknown);
    }

    #[test]
    fn labels_round_trip_through_display() {
        for r in [Relevance::NonRelevant, Relevance::PartlyRelevant, Relevance::Relevant, Relevance::Unknown] {
            let json = serde_json::to_string(&r).unwrap();
            assert_eq!(json, format!("\"{r}\""));
        }
    }
}
