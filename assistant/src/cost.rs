use crate::llm::TokenUsage;

/// USD per 1000 tokens: (prompt, completion).
fn price_per_1k(model: &str) -> Option<(f64, f64)> {
    match model {
        "gpt-4o-mini" => Some((0.00015, 0.0006)),
        _ => None,
    }
}

/// Cost of one call; models without a known price cost 0 and log a warning.
pub fn openai_cost(model: &str, usage: &TokenUsage) -> f64 {
    match price_per_1k(model) {
        Some((prompt, completion)) => {
            (f64::from(usage.prompt_tokens) * prompt + f64::from(usage.completion_tokens) * completion) / 1000.0
        }
        None => {
            tracing::warn!(model, "model not recognized, cost not calculated");
            0.0
        }
    }
}
