use crate::error::Result;
use crate::index::{BoostWeights, Query};
use crate::optimize::ParamRange;
use crate::persist::load_optimization;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_TEXT_FIELDS: &[&str] = &["food", "allergens"];
pub const DEFAULT_KEYWORD_FIELDS: &[&str] = &["id"];
pub const DEFAULT_NUM_RESULTS: usize = 10;

/// Weighting found by an earlier boost search over the full dataset.
/// Entries for nutrient columns are kept as found; the index ignores fields it does not score.
const TUNED_BOOST: &[(&str, f64)] = &[
    ("food", 3.00),
    ("serving_size_g", 0.45),
    ("calories_kcal", 0.32),
    ("protein_g", 2.86),
    ("fat_g", 1.10),
    ("carbohydrates_g", 2.11),
    ("vitamin_a_mg", 0.91),
    ("vitamin_b6_mg", 1.38),
    ("vitamin_b12_mg", 2.64),
    ("vitamin_c_mg", 2.90),
    ("vitamin_d_mg", 1.30),
    ("vitamin_e_mg", 0.09),
    ("calcium_mg", 0.91),
    ("iron_mg", 2.44),
    ("potassium_mg", 0.03),
    ("magnesium_mg", 2.03),
    ("selenium_mg", 2.78),
    ("zinc_mg", 1.70),
    ("iodine_mg", 1.67),
    ("allergens", 0.21),
];

/// How the assistant searches the index.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub text_fields: Vec<String>,
    pub keyword_fields: Vec<String>,
    pub num_results: usize,
    pub boost: BoostWeights,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            text_fields: DEFAULT_TEXT_FIELDS.iter().map(|s| s.to_string()).collect(),
            keyword_fields: DEFAULT_KEYWORD_FIELDS.iter().map(|s| s.to_string()).collect(),
            num_results: DEFAULT_NUM_RESULTS,
            boost: tuned_boost(),
        }
    }
}

impl SearchSettings {
    /// Replace the boost with the best weighting of a saved optimization run.
    pub fn with_boost_file<P: AsRef<Path>>(mut self, path: P) -> anyhow::Result<Self> {
        let saved = load_optimization(path.as_ref())?;
        validate_boost(&saved.result.best_weighting)?;
        tracing::info!(path = %path.as_ref().display(), score = saved.result.best_score, "using saved boost");
        self.boost = saved.result.best_weighting;
        Ok(self)
    }

    pub fn with_boost(mut self, boost: BoostWeights) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    /// Query for a question under these settings, no filter.
    pub fn query(&self, text: &str) -> Query {
        Query::new(text).with_boost(self.boost.clone()).with_limit(self.num_results)
    }

    pub fn text_field_refs(&self) -> Vec<&str> {
        self.text_fields.iter().map(String::as_str).collect()
    }

    pub fn keyword_field_refs(&self) -> Vec<&str> {
        self.keyword_fields.iter().map(String::as_str).collect()
    }

    /// The same `[min, max]` float range for every text field.
    pub fn uniform_ranges(&self, min: f64, max: f64) -> BTreeMap<String, ParamRange> {
        self.text_fields.iter().map(|f| (f.clone(), ParamRange::float(min, max))).collect()
    }
}

pub fn tuned_boost() -> BoostWeights {
    BoostWeights::from_table(TUNED_BOOST)
}

/// Ensure `boost` is usable, for weightings coming from user input.
pub fn validate_boost(boost: &BoostWeights) -> Result<()> {
    let mut checked = BoostWeights::uniform();
    for (field, weight) in boost.iter() {
        checked.insert(field, weight)?;
    }
    Ok(())
}
