use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","her","here","hers","him","his","how",
            "i","i'd","i'm","if","in","into","is","isn't","it","it's","its","itself",
            "me","more","most","my",
            "no","nor","not","of","off","on","once","only","or","other","our","ours","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","them","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","what's","when","where","which","while","who","whom","why","with","would",
            "you","your","yours"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Tokenize text into stemmed terms using NFKC normalization, lowercase, and stopword removal.
///
/// Numbers on their own never become terms; "b12" does, since it starts with a letter.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| !is_stopword(t))
        .map(|t| STEMMER.stem(t).into_owned())
        .collect()
}

/// Term frequencies of `text`, the bag-of-words view used by the index.
pub fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Boiled eggs, egg whites");
        assert!(t.iter().any(|w| w == "egg"));
    }

    #[test]
    fn counts_repeated_terms() {
        let c = term_counts("milk, milk powder");
        assert_eq!(c.get("milk"), Some(&2));
        assert_eq!(c.get("powder"), Some(&1));
    }
}
