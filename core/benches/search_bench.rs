use criterion::{criterion_group, criterion_main, Criterion};
use nutrition_core::config::tuned_boost;
use nutrition_core::tokenizer::tokenize;
use nutrition_core::{FoodRecord, Query, TextIndex};

const FOODS: &[&str] = &[
    "Apple", "Banana", "Roasted duck", "Tofu", "Salmon fillet", "Cheddar cheese", "Whole milk", "Oat porridge",
    "Almonds", "Lentil soup", "Brown rice", "Boiled egg", "Spinach", "Peanut butter", "Greek yogurt",
];
const ALLERGENS: &[&str] = &["no", "soy", "milk", "egg", "fish", "peanut, tree nuts", "gluten"];

fn records(n: usize) -> Vec<FoodRecord> {
    (0..n)
        .map(|i| {
            let food = format!("{} {}", FOODS[i % FOODS.len()], FOODS[(i / FOODS.len()) % FOODS.len()]);
            FoodRecord::new(i as u32, food, ALLERGENS[i % ALLERGENS.len()])
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = "What is the vitamin C content in a 100g apple compared to an orange?";
    c.bench_function("tokenize_question", |b| b.iter(|| tokenize(text)));
}

fn bench_search(c: &mut Criterion) {
    let index = TextIndex::build(records(2_000), &["food", "allergens"], &["id"]).unwrap();
    let query = Query::new("How much protein is in roasted duck with milk?").with_boost(tuned_boost());
    c.bench_function("search_2000_records", |b| b.iter(|| index.search(&query)));
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
