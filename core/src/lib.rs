pub mod config;
pub mod error;
pub mod evaluate;
pub mod index;
pub mod ingest;
pub mod optimize;
pub mod persist;
pub mod record;
pub mod tokenizer;

pub use config::SearchSettings;
pub use error::{CoreError, Result};
pub use evaluate::{evaluate, GroundTruth, RetrievalMetrics};
pub use index::{BoostWeights, Query, ScoredRecord, TextIndex};
pub use optimize::{optimize, optimize_parallel, try_optimize, try_optimize_parallel, Optimization, ParamRange};
pub use record::{Document, FoodRecord, Identified, Nutrient, Nutrients, RecordId, RecordStore};
