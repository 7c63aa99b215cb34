use crate::error::{CoreError, Result};
use crate::record::{Document, RecordId};
use crate::tokenizer::{term_counts, tokenize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;
/// Position of a record in the collection the index was built from.
pub type DocPos = u32;

/// Length normalization strength, as in BM25.
const LENGTH_NORM_B: f64 = 0.75;
const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct Posting {
    pub doc: DocPos,
    pub tf: u32,
}

/// Term statistics of one text field.
#[derive(Debug, Default)]
struct FieldIndex {
    dictionary: HashMap<String, TermId>,
    df: Vec<u32>,
    postings: HashMap<TermId, Vec<Posting>>, // postings sorted by doc
    lengths: Vec<u32>,
    avg_len: f64,
}

impl FieldIndex {
    fn add(&mut self, doc: DocPos, text: &str) {
        let counts = term_counts(text);
        self.lengths.push(counts.values().sum());
        for (term, tf) in counts {
            let next_id = self.dictionary.len() as TermId;
            let tid = *self.dictionary.entry(term).or_insert(next_id);
            if self.df.len() <= tid as usize {
                self.df.resize(tid as usize + 1, 0);
            }
            self.df[tid as usize] += 1;
            self.postings.entry(tid).or_default().push(Posting { doc, tf });
        }
    }

    fn finish(&mut self) {
        let total: u64 = self.lengths.iter().map(|l| u64::from(*l)).sum();
        self.avg_len = if self.lengths.is_empty() { 0.0 } else { total as f64 / self.lengths.len() as f64 };
    }

    fn idf(&self, tid: TermId, num_docs: usize) -> f64 {
        let df_t = f64::from(self.df.get(tid as usize).copied().unwrap_or(1).max(1));
        (1.0 + num_docs as f64 / df_t).ln()
    }

    fn length_norm(&self, doc: DocPos) -> f64 {
        if self.avg_len <= 0.0 {
            return 1.0;
        }
        let len = f64::from(self.lengths[doc as usize]);
        1.0 - LENGTH_NORM_B + LENGTH_NORM_B * len / self.avg_len
    }

    /// Add this field's contribution for `query_terms` into `scores`, scaled by `boost`.
    fn accumulate(&self, query_terms: &BTreeMap<String, u32>, num_docs: usize, boost: f64, scores: &mut [f64]) {
        for (term, q_tf) in query_terms {
            let Some(&tid) = self.dictionary.get(term) else { continue };
            let q_w = 1.0 + f64::from(*q_tf).ln();
            let idf = self.idf(tid, num_docs);
            if let Some(postings) = self.postings.get(&tid) {
                for p in postings {
                    let tf = 1.0 + f64::from(p.tf).ln();
                    scores[p.doc as usize] += boost * q_w * tf * idf / self.length_norm(p.doc);
                }
            }
        }
    }
}

/// Per-field score multipliers. Fields without an entry weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoostWeights(BTreeMap<String, f64>);

impl BoostWeights {
    /// Uniform weighting: every field 1.0.
    pub fn uniform() -> Self {
        Self::default()
    }

    /// Set a field's weight. Weights must be finite and non-negative.
    pub fn insert(&mut self, field: impl Into<String>, weight: f64) -> Result<()> {
        let field = field.into();
        if !weight.is_finite() || weight < 0.0 {
            return Err(CoreError::InvalidArgument(format!("boost for `{field}` must be finite and >= 0, got {weight}")));
        }
        self.0.insert(field, weight);
        Ok(())
    }

    /// Weights from compiled-in tables, which are already known to be valid.
    pub(crate) fn from_table(table: &[(&str, f64)]) -> Self {
        debug_assert!(table.iter().all(|(_, w)| w.is_finite() && *w >= 0.0));
        Self(table.iter().map(|(field, weight)| (field.to_string(), *weight)).collect())
    }

    pub fn with(mut self, field: impl Into<String>, weight: f64) -> Result<Self> {
        self.insert(field, weight)?;
        Ok(self)
    }

    pub fn weight(&self, field: &str) -> f64 {
        self.0.get(field).copied().unwrap_or(1.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A ranked-retrieval request.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub filter: HashMap<String, String>,
    pub boost: BoostWeights,
    pub limit: usize,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), filter: HashMap::new(), boost: BoostWeights::uniform(), limit: DEFAULT_LIMIT }
    }

    /// Require a keyword field to equal `value` exactly.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn with_boost(mut self, boost: BoostWeights) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRecord<'a, D> {
    pub record: &'a D,
    pub score: f64,
}

/// In-memory keyword index over a fixed record collection.
///
/// Built once; read-only afterwards, so `search` can be called from many threads.
#[derive(Debug)]
pub struct TextIndex<D> {
    records: Vec<D>,
    text_fields: Vec<String>,
    fields: HashMap<String, FieldIndex>,
    keywords: HashMap<String, Vec<String>>, // keyword field -> value per record position
    by_id: HashMap<RecordId, DocPos>,
}

impl<D: Document> TextIndex<D> {
    /// Index `text_fields` for relevance scoring and `keyword_fields` for exact filters.
    ///
    /// Both lists are treated as sets: a repeated name is indexed once.
    pub fn build(records: Vec<D>, text_fields: &[&str], keyword_fields: &[&str]) -> Result<Self> {
        let text_fields = dedup_names(text_fields);
        let keyword_fields = dedup_names(keyword_fields);
        let mut fields: HashMap<String, FieldIndex> =
            text_fields.iter().map(|f| (f.to_string(), FieldIndex::default())).collect();
        let mut keywords: HashMap<String, Vec<String>> =
            keyword_fields.iter().map(|f| (f.to_string(), Vec::with_capacity(records.len()))).collect();
        let mut by_id = HashMap::with_capacity(records.len());

        for (pos, record) in records.iter().enumerate() {
            let doc = pos as DocPos;
            for name in &text_fields {
                let value = record.field(name).ok_or_else(|| CoreError::Schema { record: pos, field: name.to_string() })?;
                if let Some(fi) = fields.get_mut(*name) {
                    fi.add(doc, &value);
                }
            }
            for name in &keyword_fields {
                let value = record.field(name).ok_or_else(|| CoreError::Schema { record: pos, field: name.to_string() })?;
                if let Some(values) = keywords.get_mut(*name) {
                    values.push(value.into_owned());
                }
            }
            by_id.entry(record.record_id()).or_insert(doc);
        }
        for fi in fields.values_mut() {
            fi.finish();
        }

        tracing::debug!(
            num_records = records.len(),
            text_fields = ?text_fields,
            keyword_fields = ?keyword_fields,
            vocabulary = fields.values().map(|f| f.dictionary.len()).sum::<usize>(),
            "built text index"
        );

        Ok(Self {
            records,
            text_fields: text_fields.iter().map(|f| f.to_string()).collect(),
            fields,
            keywords,
            by_id,
        })
    }

    /// Records matching the query's filter, ordered by descending score.
    pub fn search(&self, query: &Query) -> Vec<&D> {
        self.search_scored(query).into_iter().map(|s| s.record).collect()
    }

    /// Like [`search`](Self::search) but keeps each record's score.
    ///
    /// Ties keep collection order. Zero-score records are returned when they pass the filter.
    pub fn search_scored(&self, query: &Query) -> Vec<ScoredRecord<'_, D>> {
        if query.limit == 0 {
            return Vec::new();
        }
        let scores = self.score(&query.text, &query.boost);

        let mut candidates: Vec<DocPos> =
            (0..self.records.len() as DocPos).filter(|&doc| self.passes_filter(doc, &query.filter)).collect();
        // stable, so equal scores stay in collection order
        candidates.sort_by(|a, b| scores[*b as usize].partial_cmp(&scores[*a as usize]).unwrap_or(Ordering::Equal));
        candidates.truncate(query.limit);

        candidates
            .into_iter()
            .map(|doc| ScoredRecord { record: &self.records[doc as usize], score: scores[doc as usize] })
            .collect()
    }

    /// Total score of every record for `text` under `boost`.
    fn score(&self, text: &str, boost: &BoostWeights) -> Vec<f64> {
        let mut scores = vec![0.0; self.records.len()];
        // ordered, so every record sums its term contributions in the same sequence
        let mut query_terms: BTreeMap<String, u32> = BTreeMap::new();
        for term in tokenize(text) {
            *query_terms.entry(term).or_insert(0) += 1;
        }
        if query_terms.is_empty() {
            return scores;
        }
        for name in &self.text_fields {
            let weight = boost.weight(name);
            if weight == 0.0 {
                continue;
            }
            if let Some(fi) = self.fields.get(name) {
                fi.accumulate(&query_terms, self.records.len(), weight, &mut scores);
            }
        }
        scores
    }

    fn passes_filter(&self, doc: DocPos, filter: &HashMap<String, String>) -> bool {
        filter.iter().all(|(field, wanted)| match self.keywords.get(field) {
            Some(values) => values[doc as usize] == *wanted,
            // not a keyword field of this index
            None => true,
        })
    }

    pub fn get(&self, id: RecordId) -> Option<&D> {
        self.by_id.get(&id).map(|&doc| &self.records[doc as usize])
    }

    pub fn records(&self) -> &[D] {
        &self.records
    }

    pub fn text_fields(&self) -> &[String] {
        &self.text_fields
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// First occurrence of each name, in the given order.
fn dedup_names<'a>(names: &[&'a str]) -> Vec<&'a str> {
    let mut out: Vec<&'a str> = Vec::with_capacity(names.len());
    for &name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FoodRecord;

    fn sample() -> Vec<FoodRecord> {
        vec![
            FoodRecord::new(0, "Duck, roasted", "no"),
            FoodRecord::new(1, "Tofu", "soy"),
            FoodRecord::new(2, "Duck egg", "egg"),
            FoodRecord::new(3, "Milk chocolate", "milk, soy"),
        ]
    }

    fn build() -> TextIndex<FoodRecord> {
        TextIndex::build(sample(), &["food", "allergens"], &["id"]).unwrap()
    }

    #[test]
    fn matching_records_rank_first() {
        let index = build();
        let hits = index.search(&Query::new("How many calories in duck"));
        assert_eq!(hits.len(), 4);
        assert!(hits[..2].iter().all(|r| r.food.contains("Duck")));
    }

    #[test]
    fn no_matching_term_scores_zero() {
        let index = build();
        let hits = index.search_scored(&Query::new("tofu"));
        assert_eq!(hits[0].record.id, 1);
        assert!(hits[0].score > 0.0);
        assert!(hits[1..].iter().all(|h| h.score == 0.0));
        // zero scores keep collection order
        let ids: Vec<_> = hits[1..].iter().map(|h| h.record.id).collect();
        assert_eq!(ids, vec![0, 2, 3]);
    }

    #[test]
    fn boost_reorders_fields() {
        let index = build();
        // "soy" in allergens for 1 and 3, "milk" in food and allergens for 3
        let q = Query::new("soy milk");
        let plain = index.search(&q);
        assert_eq!(plain[0].id, 3);

        let boost = BoostWeights::uniform().with("food", 0.0).unwrap().with("allergens", 1.0).unwrap();
        let hits = index.search_scored(&q.clone().with_boost(boost));
        assert_eq!(hits[0].record.id, 3);
        assert!(hits.iter().any(|h| h.record.id == 1 && h.score > 0.0));
    }

    #[test]
    fn zero_boost_silences_field() {
        let index = build();
        let boost = BoostWeights::uniform().with("allergens", 0.0).unwrap();
        let hits = index.search_scored(&Query::new("soy").with_boost(boost));
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn get_by_id() {
        let index = build();
        assert_eq!(index.get(2).map(|r| r.food.as_str()), Some("Duck egg"));
        assert!(index.get(42).is_none());
    }

    #[test]
    fn negative_boost_is_rejected() {
        let mut boost = BoostWeights::uniform();
        assert!(matches!(boost.insert("food", -1.0), Err(CoreError::InvalidArgument(_))));
        assert!(boost.insert("food", f64::NAN).is_err());
        assert!(boost.is_empty());
    }
}
