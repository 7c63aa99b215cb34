use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use nutrition_assistant::llm::DEFAULT_MODEL;
use nutrition_assistant::{Assistant, LlmConfig, OpenAiClient, Relevance};
use nutrition_core::evaluate::split_validation;
use nutrition_core::ingest::prepare;
use nutrition_core::persist::{save_optimization, save_retrieval, timestamp, OptimizationReport, ReportPaths, REPORT_VERSION};
use nutrition_core::{
    evaluate, try_optimize, try_optimize_parallel, BoostWeights, FoodRecord, GroundTruth, ParamRange, Query, RecordId, RecordStore,
    RetrievalMetrics, SearchSettings, TextIndex,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Prepare the nutrition dataset and evaluate retrieval and answers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DataArgs {
    /// Cleaned nutrition dataset (CSV)
    #[arg(long, env = "DATA_PATH", default_value = "./data/data.csv")]
    data: PathBuf,
    /// Ground-truth questions (CSV with `question` and `id` columns)
    #[arg(long, env = "GROUND_TRUTH_PATH", default_value = "./data/ground-truth-retrieval.csv")]
    ground_truth: PathBuf,
    /// Number of records retrieved per question
    #[arg(long, default_value_t = 10)]
    num_results: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the raw export: drop duplicate foods, fill empty cells, assign ids
    Prepare {
        /// Raw export path
        #[arg(long)]
        input: PathBuf,
        /// Cleaned CSV output path
        #[arg(long)]
        output: PathBuf,
        /// Field delimiter of the raw export
        #[arg(long, default_value_t = ';')]
        delimiter: char,
    },
    /// Hit rate and MRR of the uniform and the tuned boost
    Retrieval {
        #[command(flatten)]
        data: DataArgs,
        /// Optimization report to evaluate instead of the built-in tuned boost
        #[arg(long, env = "BOOST_FILE")]
        boost_file: Option<PathBuf>,
        /// Directory for JSON reports
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Random search for field boosts maximising MRR on a validation slice
    Optimize {
        #[command(flatten)]
        data: DataArgs,
        /// Leading ground-truth rows used for tuning; the rest are held out
        #[arg(long, default_value_t = 100)]
        validation_size: usize,
        #[arg(long, default_value_t = 20)]
        iterations: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Lower bound of every field's weight
        #[arg(long, default_value_t = 0.0)]
        min_weight: f64,
        /// Upper bound of every field's weight
        #[arg(long, default_value_t = 3.0)]
        max_weight: f64,
        /// Fields to tune (defaults to the indexed text fields)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Score trials on all cores
        #[arg(long, default_value_t = false)]
        parallel: bool,
        /// Directory for the optimization report
        #[arg(long, default_value = "./reports")]
        output: PathBuf,
    },
    /// Answer sampled questions and have a second LLM call grade each answer
    Judge {
        #[command(flatten)]
        data: DataArgs,
        #[arg(long, default_value_t = 200)]
        sample: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Model answering the questions
        #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
        model: String,
        #[arg(long, env = "BOOST_FILE")]
        boost_file: Option<PathBuf>,
        /// Directory for the graded answers CSV
        #[arg(long, default_value = "./reports")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare { input, output, delimiter } => prepare_dataset(&input, &output, delimiter),
        Commands::Retrieval { data, boost_file, output } => run_retrieval(&data, boost_file.as_deref(), output.as_deref()),
        Commands::Optimize { data, validation_size, iterations, seed, min_weight, max_weight, fields, parallel, output } => {
            let opts = OptimizeOpts { validation_size, iterations, seed, min_weight, max_weight, fields, parallel };
            run_optimize(&data, &opts, &output)
        }
        Commands::Judge { data, sample, seed, model, boost_file, output } => {
            run_judge(&data, sample, seed, &model, boost_file.as_deref(), &output).await
        }
    }
}

fn prepare_dataset(input: &Path, output: &Path, delimiter: char) -> Result<()> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    let reader = BufReader::new(File::open(input).with_context(|| format!("opening {}", input.display()))?);
    let writer = BufWriter::new(File::create(output).with_context(|| format!("creating {}", output.display()))?);
    let stats = prepare(reader, writer, delimiter as u8)?;
    eprintln!(
        "prepared: read={} written={} duplicates_dropped={} -> {}",
        stats.rows_read,
        stats.rows_written,
        stats.duplicates_dropped,
        output.display()
    );
    Ok(())
}

fn load_index(data: &DataArgs, settings: &SearchSettings) -> Result<TextIndex<FoodRecord>> {
    let store = RecordStore::load_csv(&data.data).with_context(|| format!("loading {}", data.data.display()))?;
    let index = TextIndex::build(store.into_records(), &settings.text_field_refs(), &settings.keyword_field_refs())?;
    Ok(index)
}

fn load_ground_truth(data: &DataArgs) -> Result<Vec<GroundTruth>> {
    let gt = GroundTruth::load_csv(&data.ground_truth)
        .with_context(|| format!("loading {}", data.ground_truth.display()))?;
    if gt.is_empty() {
        bail!("{} has no questions", data.ground_truth.display());
    }
    Ok(gt)
}

fn progress(len: usize, label: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(label);
    pb
}

/// Evaluate `gt` against the index with a fixed boost.
fn measure(index: &TextIndex<FoodRecord>, gt: &[GroundTruth], boost: &BoostWeights, k: usize) -> Result<RetrievalMetrics> {
    let metrics = evaluate(gt, |q| index.search(&Query::new(q).with_boost(boost.clone()).with_limit(k)))?;
    Ok(metrics)
}

fn run_retrieval(data: &DataArgs, boost_file: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let mut settings = SearchSettings::default();
    if let Some(path) = boost_file {
        settings = settings.with_boost_file(path)?;
    }
    let index = load_index(data, &settings)?;
    let gt = load_ground_truth(data)?;

    let mut results = BTreeMap::new();
    for (label, boost) in [("uniform", BoostWeights::uniform()), ("tuned", settings.boost.clone())] {
        let pb = progress(gt.len(), label);
        let metrics = evaluate(&gt, |q| {
            pb.inc(1);
            index.search(&Query::new(q).with_boost(boost.clone()).with_limit(data.num_results))
        })?;
        pb.finish_and_clear();
        tracing::info!(label, hit_rate = metrics.hit_rate, mrr = metrics.mrr, "retrieval evaluated");
        if let Some(dir) = output {
            let path = save_retrieval(&ReportPaths::new(dir), label, metrics)?;
            tracing::info!(path = %path.display(), "report written");
        }
        results.insert(label, metrics);
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

struct OptimizeOpts {
    validation_size: usize,
    iterations: usize,
    seed: u64,
    min_weight: f64,
    max_weight: f64,
    fields: Vec<String>,
    parallel: bool,
}

fn run_optimize(data: &DataArgs, opts: &OptimizeOpts, output: &Path) -> Result<()> {
    let settings = SearchSettings::default();
    let index = load_index(data, &settings)?;
    let gt = load_ground_truth(data)?;
    let (validation, test) = split_validation(&gt, opts.validation_size);
    if validation.is_empty() {
        bail!("validation slice is empty; raise --validation-size");
    }

    let mut ranges = settings.uniform_ranges(opts.min_weight, opts.max_weight);
    if !opts.fields.is_empty() {
        ranges = opts.fields.iter().map(|f| (f.clone(), ParamRange::float(opts.min_weight, opts.max_weight))).collect();
    }
    tracing::info!(
        validation = validation.len(),
        test = test.len(),
        iterations = opts.iterations,
        seed = opts.seed,
        fields = ?ranges.keys().collect::<Vec<_>>(),
        "starting boost search"
    );

    let pb = progress(opts.iterations, "trials");
    let objective = |boost: &BoostWeights| -> Result<f64> {
        let metrics = measure(&index, validation, boost, data.num_results)?;
        pb.inc(1);
        Ok(metrics.mrr)
    };
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let result = if opts.parallel {
        try_optimize_parallel(&ranges, objective, opts.iterations, &mut rng)?
    } else {
        try_optimize(&ranges, objective, opts.iterations, &mut rng)?
    };
    pb.finish_and_clear();

    let test_metrics = if test.is_empty() {
        None
    } else {
        Some(measure(&index, test, &result.best_weighting, data.num_results)?)
    };
    if let Some(m) = &test_metrics {
        tracing::info!(hit_rate = m.hit_rate, mrr = m.mrr, "best weighting on held-out questions");
    }

    let report = OptimizationReport {
        created_at: timestamp(),
        version: REPORT_VERSION,
        seed: opts.seed,
        ranges,
        result,
        test_metrics,
    };
    let path = save_optimization(&ReportPaths::new(output), &report)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("optimization report -> {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct JudgedAnswer<'a> {
    id: RecordId,
    question: &'a str,
    answer: &'a str,
    relevance: Relevance,
    explanation: &'a str,
}

async fn run_judge(
    data: &DataArgs,
    sample: usize,
    seed: u64,
    model: &str,
    boost_file: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let mut settings = SearchSettings::default().with_num_results(data.num_results);
    if let Some(path) = boost_file {
        settings = settings.with_boost_file(path)?;
    }
    let store = RecordStore::load_csv(&data.data).with_context(|| format!("loading {}", data.data.display()))?;
    let gt = load_ground_truth(data)?;
    let generator = Arc::new(OpenAiClient::new(&LlmConfig::from_env())?);
    let assistant = Assistant::from_records(store.into_records(), generator, settings)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let picked: Vec<&GroundTruth> = gt.choose_multiple(&mut rng, sample.min(gt.len())).collect();

    let paths = ReportPaths::new(output);
    std::fs::create_dir_all(&paths.root)?;
    let out_path = paths.judgements(model);
    let mut wtr = csv::Writer::from_path(&out_path).with_context(|| format!("creating {}", out_path.display()))?;

    let pb = progress(picked.len(), "judging");
    let mut counts: HashMap<Relevance, usize> = HashMap::new();
    let mut failures = 0usize;
    for record in &picked {
        match assistant.answer(&record.question, model).await {
            Ok(answer) => {
                *counts.entry(answer.relevance).or_insert(0) += 1;
                wtr.serialize(JudgedAnswer {
                    id: record.id,
                    question: &record.question,
                    answer: &answer.answer,
                    relevance: answer.relevance,
                    explanation: &answer.relevance_explanation,
                })?;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(id = record.id, error = %e, "question skipped");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    wtr.flush()?;

    let judged: usize = counts.values().sum();
    for relevance in [Relevance::Relevant, Relevance::PartlyRelevant, Relevance::NonRelevant, Relevance::Unknown] {
        let n = counts.get(&relevance).copied().unwrap_or(0);
        let share = if judged == 0 { 0.0 } else { n as f64 / judged as f64 };
        println!("{relevance:<16} {n:>5} {share:>7.3}");
    }
    eprintln!("judged={} failed={} -> {}", judged, failures, out_path.display());
    Ok(())
}
