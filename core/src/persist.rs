use crate::evaluate::RetrievalMetrics;
use crate::optimize::{Optimization, ParamRange};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub label: String,
    pub created_at: String,
    pub version: u32,
    pub metrics: RetrievalMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub created_at: String,
    pub version: u32,
    pub seed: u64,
    pub ranges: BTreeMap<String, ParamRange>,
    pub result: Optimization,
    /// Metrics of the best weighting on the held-out questions, if any were left.
    pub test_metrics: Option<RetrievalMetrics>,
}

pub struct ReportPaths {
    pub root: PathBuf,
}

impl ReportPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn retrieval(&self, label: &str) -> PathBuf { self.root.join(format!("retrieval-{label}.json")) }
    pub fn optimization(&self) -> PathBuf { self.root.join("optimization.json") }
    pub fn judgements(&self, model: &str) -> PathBuf { self.root.join(format!("rag-eval-{model}.csv")) }
}

/// Current UTC time as RFC 3339, empty if formatting fails.
pub fn timestamp() -> String {
    time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let json = serde_json::to_string_pretty(value)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let value = serde_json::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

pub fn save_retrieval(paths: &ReportPaths, label: &str, metrics: RetrievalMetrics) -> Result<PathBuf> {
    let report = RetrievalReport { label: label.to_string(), created_at: timestamp(), version: REPORT_VERSION, metrics };
    let path = paths.retrieval(label);
    write_json(&path, &report)?;
    Ok(path)
}

pub fn load_retrieval(path: &Path) -> Result<RetrievalReport> {
    read_json(path)
}

pub fn save_optimization(paths: &ReportPaths, report: &OptimizationReport) -> Result<PathBuf> {
    let path = paths.optimization();
    write_json(&path, report)?;
    Ok(path)
}

pub fn load_optimization(path: &Path) -> Result<OptimizationReport> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BoostWeights;
    use tempfile::tempdir;

    #[test]
    fn optimization_report_round_trips() {
        let dir = tempdir().unwrap();
        let paths = ReportPaths::new(dir.path().join("reports"));
        let mut ranges = BTreeMap::new();
        ranges.insert("food".to_string(), ParamRange::float(0.0, 3.0));
        ranges.insert("allergens".to_string(), ParamRange::int(0, 2));
        let report = OptimizationReport {
            created_at: timestamp(),
            version: REPORT_VERSION,
            seed: 42,
            ranges,
            result: Optimization {
                best_weighting: BoostWeights::uniform().with("food", 2.5).unwrap(),
                best_score: 0.8,
                trials: 20,
            },
            test_metrics: Some(RetrievalMetrics { hit_rate: 0.9, mrr: 0.7, queries: 10 }),
        };
        let path = save_optimization(&paths, &report).unwrap();
        let loaded = load_optimization(&path).unwrap();
        assert_eq!(loaded.result, report.result);
        assert_eq!(loaded.ranges, report.ranges);
        assert_eq!(loaded.seed, 42);
    }

    #[test]
    fn retrieval_report_is_labelled() {
        let dir = tempdir().unwrap();
        let paths = ReportPaths::new(dir.path());
        let metrics = RetrievalMetrics { hit_rate: 0.5, mrr: 0.25, queries: 4 };
        let path = save_retrieval(&paths, "tuned", metrics).unwrap();
        assert!(path.ends_with("retrieval-tuned.json"));
        let loaded = load_retrieval(&path).unwrap();
        assert_eq!(loaded.label, "tuned");
        assert_eq!(loaded.metrics, metrics);
        assert!(!loaded.created_at.is_empty());
    }
}
