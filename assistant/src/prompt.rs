use nutrition_core::{FoodRecord, Nutrient};
use std::fmt::Write;

const ANSWER_INSTRUCTIONS: &str = "You are a precise and reliable nutrition assistant.
Answer the QUESTION based on the CONTEXT from our nutrition database.
Use only the facts from the CONTEXT when answering the QUESTION.";

const JUDGE_INSTRUCTIONS: &str = "You are an expert evaluator for a RAG system.
Your task is to analyze the relevance of the generated answer to the given question.
Based on the relevance of the generated answer, you will classify it
as \"NON_RELEVANT\", \"PARTLY_RELEVANT\", or \"RELEVANT\".";

const JUDGE_FORMAT: &str = "Please analyze the content and context of the generated answer in relation to the question
and provide your evaluation in parsable JSON without using code blocks:

{
  \"Relevance\": \"NON_RELEVANT\" | \"PARTLY_RELEVANT\" | \"RELEVANT\",
  \"Explanation\": \"[Provide a brief explanation for your evaluation]\"
}";

/// One `name: value` line per column: food, nutrients in dataset order, allergens.
pub fn format_entry(record: &FoodRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "food: {}", record.food);
    for n in Nutrient::ALL {
        let _ = writeln!(out, "{}: {}", n.name(), record.nutrients.display(n));
    }
    let _ = write!(out, "allergens: {}", record.allergens);
    out
}

/// Context entries separated by blank lines.
pub fn build_context<'a>(records: impl IntoIterator<Item = &'a FoodRecord>) -> String {
    let mut context = String::new();
    for r in records {
        context.push_str(&format_entry(r));
        context.push_str("\n\n");
    }
    context
}

pub fn build_prompt<'a>(question: &str, records: impl IntoIterator<Item = &'a FoodRecord>) -> String {
    let context = build_context(records);
    format!("{ANSWER_INSTRUCTIONS}\n\nQUESTION: {question}\nCONTEXT: {context}").trim().to_string()
}

/// Prompt asking a second model to grade `answer` against `question`.
pub fn relevance_prompt(question: &str, answer: &str) -> String {
    format!(
        "{JUDGE_INSTRUCTIONS}\n\nHere is the data for evaluation:\n\nQuestion: {question}\nGenerated Answer: {answer}\n\n{JUDGE_FORMAT}"
    )
}
