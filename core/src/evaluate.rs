//! Retrieval quality metrics over labelled questions.
//!
//! - Hit rate: share of questions whose expected record is returned at all
//! - MRR: mean of 1/rank of the expected record, 0 when it is missing

use crate::error::{CoreError, Result};
use crate::record::{Identified, RecordId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A question paired with the record that answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub question: String,
    pub id: RecordId,
}

impl GroundTruth {
    pub fn new(question: impl Into<String>, id: RecordId) -> Self {
        Self { question: question.into(), id }
    }

    /// Load pairs from a CSV with `question` and `id` columns; other columns are ignored.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let f = File::open(path.as_ref())?;
        let pairs = Self::from_reader(f)?;
        tracing::info!(path = %path.as_ref().display(), num_questions = pairs.len(), "loaded ground truth");
        Ok(pairs)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Self>> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut out = Vec::new();
        for row in rdr.deserialize() {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Split into the first `n` pairs (validation) and the rest (test).
pub fn split_validation(pairs: &[GroundTruth], n: usize) -> (&[GroundTruth], &[GroundTruth]) {
    pairs.split_at(n.min(pairs.len()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub hit_rate: f64,
    pub mrr: f64,
    pub queries: usize,
}

/// Run `retrieve` for every question and score where the expected record lands.
///
/// The result list is taken as returned; its length is up to the retrieval function.
pub fn evaluate<F, I>(ground_truth: &[GroundTruth], mut retrieve: F) -> Result<RetrievalMetrics>
where
    F: FnMut(&str) -> I,
    I: IntoIterator,
    I::Item: Identified,
{
    if ground_truth.is_empty() {
        return Err(CoreError::EmptyInput("ground truth"));
    }
    let relevance: Vec<Vec<bool>> = ground_truth
        .iter()
        .map(|gt| retrieve(&gt.question).into_iter().map(|r| r.record_id() == gt.id).collect())
        .collect();

    let metrics = RetrievalMetrics { hit_rate: hit_rate(&relevance)?, mrr: mrr(&relevance)?, queries: relevance.len() };
    tracing::debug!(hit_rate = metrics.hit_rate, mrr = metrics.mrr, queries = metrics.queries, "evaluated retrieval");
    Ok(metrics)
}

/// Fraction of rows containing at least one relevant result.
pub fn hit_rate(relevance: &[Vec<bool>]) -> Result<f64> {
    if relevance.is_empty() {
        return Err(CoreError::EmptyInput("relevance rows"));
    }
    let hits = relevance.iter().filter(|row| row.contains(&true)).count();
    Ok(hits as f64 / relevance.len() as f64)
}

/// Mean reciprocal rank of the first relevant result per row.
pub fn mrr(relevance: &[Vec<bool>]) -> Result<f64> {
    if relevance.is_empty() {
        return Err(CoreError::EmptyInput("relevance rows"));
    }
    let total: f64 = relevance
        .iter()
        .map(|row| row.iter().position(|&r| r).map_or(0.0, |rank| 1.0 / (rank + 1) as f64))
        .sum();
    Ok(total / relevance.len() as f64)
}
