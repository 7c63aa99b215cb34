use nutrition_core::tokenizer::tokenize;

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Roasted Almonds ROAST! The café's crème brûlée.");
    assert!(words.contains(&"roast".to_string()));
    assert!(words.contains(&"almond".to_string()));
    // NFKC keeps accents but folds compatibility forms
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords_and_placeholder() {
    let words = tokenize("How much protein is in the tofu? no");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"how".to_string()));
    assert!(!words.contains(&"no".to_string()));
    assert!(words.contains(&"tofu".to_string()));
    assert!(words.contains(&"protein".to_string()));
}

#[test]
fn it_skips_bare_numbers() {
    let words = tokenize("100g of vitamin b12");
    assert!(!words.iter().any(|w| w.chars().all(|c| c.is_ascii_digit())));
    assert!(words.contains(&"b12".to_string()));
}
