use crate::cost::openai_cost;
use crate::judge::{evaluate_relevance, Relevance};
use crate::llm::Generator;
use crate::prompt::build_prompt;
use anyhow::Result;
use nutrition_core::{FoodRecord, SearchSettings, TextIndex};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Everything known about one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerData {
    pub answer: String,
    pub model_used: String,
    /// Seconds spent on search, generation and judging.
    pub response_time: f64,
    pub relevance: Relevance,
    pub relevance_explanation: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub eval_prompt_tokens: u32,
    pub eval_completion_tokens: u32,
    pub eval_total_tokens: u32,
    pub openai_cost: f64,
}

/// Retrieval-augmented answering over the food index.
///
/// The index and generator are shared handles, so clones are cheap.
#[derive(Clone)]
pub struct Assistant {
    index: Arc<TextIndex<FoodRecord>>,
    generator: Arc<dyn Generator>,
    settings: SearchSettings,
    judge_model: String,
}

impl Assistant {
    pub fn new(index: Arc<TextIndex<FoodRecord>>, generator: Arc<dyn Generator>, settings: SearchSettings) -> Self {
        Self { index, generator, settings, judge_model: crate::llm::DEFAULT_MODEL.to_string() }
    }

    /// Build the index from `records` using the fields named in `settings`.
    pub fn from_records(
        records: Vec<FoodRecord>,
        generator: Arc<dyn Generator>,
        settings: SearchSettings,
    ) -> Result<Self> {
        let index = TextIndex::build(records, &settings.text_field_refs(), &settings.keyword_field_refs())?;
        Ok(Self::new(Arc::new(index), generator, settings))
    }

    pub fn with_judge_model(mut self, model: impl Into<String>) -> Self {
        self.judge_model = model.into();
        self
    }

    pub fn index(&self) -> &TextIndex<FoodRecord> {
        &self.index
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Top records for `question` under the configured boost.
    pub fn search(&self, question: &str) -> Vec<&FoodRecord> {
        self.index.search(&self.settings.query(question))
    }

    /// Search, prompt `model`, then have the judge model grade the answer.
    pub async fn answer(&self, question: &str, model: &str) -> Result<AnswerData> {
        let start = Instant::now();

        let prompt = {
            let records = self.search(question);
            tracing::debug!(hits = records.len(), "retrieved context");
            build_prompt(question, records)
        };
        let completion = self.generator.generate(&prompt, model).await?;
        let (verdict, eval_usage) =
            evaluate_relevance(self.generator.as_ref(), question, &completion.text, &self.judge_model).await?;

        let took = start.elapsed().as_secs_f64();
        let cost = openai_cost(model, &completion.usage) + openai_cost(&self.judge_model, &eval_usage);
        tracing::info!(model, took, relevance = %verdict.relevance, cost, "answered question");

        Ok(AnswerData {
            answer: completion.text,
            model_used: model.to_string(),
            response_time: took,
            relevance: verdict.relevance,
            relevance_explanation: verdict.explanation,
            prompt_tokens: completion.usage.prompt_tokens,
            completion_tokens: completion.usage.completion_tokens,
            total_tokens: completion.usage.total_tokens,
            eval_prompt_tokens: eval_usage.prompt_tokens,
            eval_completion_tokens: eval_usage.completion_tokens,
            eval_total_tokens: eval_usage.total_tokens,
            openai_cost: cost,
        })
    }
}
