use nutrition_core::{BoostWeights, CoreError, Document, FoodRecord, GroundTruth, Identified, Query, RecordId, TextIndex};
use std::borrow::Cow;

fn foods() -> Vec<FoodRecord> {
    vec![
        FoodRecord::new(0, "Apple, raw", "no"),
        FoodRecord::new(2, "Orange juice", "no"),
        FoodRecord::new(3, "Duck, roasted", "no"),
        FoodRecord::new(5, "Tofu, firm", "soy"),
        FoodRecord::new(6, "Soy milk", "soy"),
        FoodRecord::new(9, "Apple pie", "gluten, egg, milk"),
        FoodRecord::new(10, "Duck liver pate", "milk"),
    ]
}

fn index() -> TextIndex<FoodRecord> {
    TextIndex::build(foods(), &["food", "allergens"], &["id"]).unwrap()
}

#[test]
fn results_respect_limit_and_order() {
    let index = index();
    for text in ["apple", "duck milk", "soy", "orange apple duck"] {
        for limit in [1, 3, 10] {
            let hits = index.search_scored(&Query::new(text).with_limit(limit));
            assert!(hits.len() <= limit);
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score), "unsorted for {text}");
        }
    }
}

#[test]
fn filter_excludes_non_matching_records() {
    let index = index();
    let hits = index.search(&Query::new("apple").with_filter("id", "9"));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 9);

    let none = index.search(&Query::new("apple").with_filter("id", "1"));
    assert!(none.is_empty());
}

#[test]
fn filter_on_unknown_field_is_ignored() {
    let index = index();
    let hits = index.search(&Query::new("apple").with_filter("colour", "red"));
    assert_eq!(hits.len(), 7);
}

#[test]
fn unknown_boost_fields_are_ignored() {
    let index = index();
    let q = Query::new("duck");
    let boosted = BoostWeights::uniform().with("protein_g", 2.5).unwrap();
    let plain: Vec<RecordId> = index.search(&q).iter().map(|r| r.id).collect();
    let with_unknown: Vec<RecordId> = index.search(&q.clone().with_boost(boosted)).iter().map(|r| r.id).collect();
    assert_eq!(plain, with_unknown);
}

#[test]
fn empty_query_returns_collection_order() {
    let index = index();
    let hits = index.search_scored(&Query::new("   ").with_limit(4));
    let ids: Vec<RecordId> = hits.iter().map(|h| h.record.id).collect();
    assert_eq!(ids, vec![0, 2, 3, 5]);
    assert!(hits.iter().all(|h| h.score == 0.0));
}

#[test]
fn zero_limit_is_empty() {
    assert!(index().search(&Query::new("apple").with_limit(0)).is_empty());
}

#[test]
fn rebuilding_gives_identical_results() {
    let a = index();
    let b = index();
    for text in ["apple", "duck milk", "soy milk tofu", "juice"] {
        let q = Query::new(text);
        let ra: Vec<RecordId> = a.search(&q).iter().map(|r| r.id).collect();
        let rb: Vec<RecordId> = b.search(&q).iter().map(|r| r.id).collect();
        assert_eq!(ra, rb);
    }
}

#[test]
fn tied_records_keep_one_order_across_builds() {
    // same length and the same term frequencies, spread over different terms
    let records = || {
        vec![
            FoodRecord::new(0, "kale kale plum fig fig fig pear lime", "no"),
            FoodRecord::new(1, "kale plum plum plum fig pear pear lime", "no"),
            FoodRecord::new(2, "Kale salad", "no"),
            FoodRecord::new(3, "kale plum fig pear lime", "no"),
            FoodRecord::new(4, "kale plum fig pear lime", "no"),
        ]
    };
    let q = Query::new("kale plum fig pear lime");
    let order = |index: &TextIndex<FoodRecord>| index.search(&q).iter().map(|r| r.id).collect::<Vec<RecordId>>();

    let first = order(&TextIndex::build(records(), &["food"], &["id"]).unwrap());
    for _ in 0..30 {
        let index = TextIndex::build(records(), &["food"], &["id"]).unwrap();
        assert_eq!(order(&index), first);
        assert_eq!(order(&index), first);
    }
    // identical text scores identically, so collection order decides
    let p3 = first.iter().position(|&id| id == 3).unwrap();
    let p4 = first.iter().position(|&id| id == 4).unwrap();
    assert_eq!(p4, p3 + 1);
}

#[test]
fn repeated_field_names_are_indexed_once() {
    let once = TextIndex::build(foods(), &["food"], &["id"]).unwrap();
    let twice = TextIndex::build(foods(), &["food", "food"], &["id", "id"]).unwrap();
    assert_eq!(twice.text_fields(), ["food".to_string()]);

    let hits = twice.search(&Query::new("").with_filter("id", "3"));
    assert_eq!(hits.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);

    let q = Query::new("duck liver").with_limit(100);
    let a: Vec<(RecordId, f64)> = once.search_scored(&q).iter().map(|h| (h.record.id, h.score)).collect();
    let b: Vec<(RecordId, f64)> = twice.search_scored(&q).iter().map(|h| (h.record.id, h.score)).collect();
    assert_eq!(a, b);
}

#[test]
fn more_matching_terms_never_lower_a_record() {
    let index = index();
    let score_of = |text: &str, id: RecordId| {
        index.search_scored(&Query::new(text).with_limit(100)).into_iter().find(|h| h.record.id == id).map(|h| h.score)
    };
    let one = score_of("duck", 10).unwrap();
    let two = score_of("duck liver", 10).unwrap();
    let three = score_of("duck liver pate", 10).unwrap();
    assert!(one > 0.0);
    assert!(two >= one);
    assert!(three >= two);
}

#[derive(Debug)]
struct Sparse {
    id: RecordId,
    title: Option<String>,
}

impl Identified for Sparse {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl Document for Sparse {
    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "title" => self.title.as_deref().map(Cow::Borrowed),
            _ => None,
        }
    }
}

#[test]
fn missing_declared_field_is_schema_error() {
    let docs = vec![Sparse { id: 0, title: Some("a".into()) }, Sparse { id: 1, title: None }];
    let err = TextIndex::build(docs, &["title"], &[]).unwrap_err();
    match err {
        CoreError::Schema { record, field } => {
            assert_eq!(record, 1);
            assert_eq!(field, "title");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn index_drives_the_evaluator() {
    let index = index();
    let gt = vec![
        GroundTruth::new("calories in roasted duck", 3),
        GroundTruth::new("is there soy in tofu", 5),
        GroundTruth::new("vitamin c in orange juice", 2),
    ];
    let m = nutrition_core::evaluate(&gt, |q| index.search(&Query::new(q).with_limit(3))).unwrap();
    assert_eq!(m.queries, 3);
    assert!(m.hit_rate > 0.0);
    assert!(m.mrr <= m.hit_rate);
    assert!((0.0..=1.0).contains(&m.hit_rate));
}
