//! Name preprocessing, tokenization and matching-key extraction.
//!
//! Every operation here is pure: given the same schema and names, the output
//! is always the same set of keyword/keys/parts/phonetic/symbol strings.

use std::collections::BTreeSet;

use rphonetic::{DoubleMetaphone, Encoder};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use search_types::SchemaCatalog;

use super::symbols::{format_symbol, NameSymbolDictionary};

/// Schema names whose `tokenize` pass canonicalizes organization-type words
/// ("Corp" -> "Corporation") instead of stripping honorifics.
const ORGANIZATION_SCHEMATA: &[&str] = &["Organization", "Company", "PublicBody"];
const PERSON_SCHEMA: &str = "Person";

/// Canonical forms for common organization-type abbreviations, checked
/// case-insensitively against whole tokens.
const ORG_TYPE_CANONICAL: &[(&str, &str)] = &[
    ("corp", "Corporation"),
    ("corp.", "Corporation"),
    ("inc", "Incorporated"),
    ("inc.", "Incorporated"),
    ("ltd", "Limited"),
    ("ltd.", "Limited"),
    ("llc", "LimitedLiabilityCompany"),
    ("co", "Company"),
    ("co.", "Company"),
    ("gmbh", "GesellschaftMitBeschraenkterHaftung"),
    ("plc", "PublicLimitedCompany"),
];

/// Honorifics and name prefixes stripped from `Person` names before
/// tokenization.
const PERSON_HONORIFICS: &[&str] = &[
    "mr", "mr.", "mrs", "mrs.", "ms", "ms.", "miss", "dr", "dr.", "prof", "prof.", "sir", "madam",
];

/// NFC-normalize, lowercase and collapse whitespace.
pub fn preprocess(name: &str) -> String {
    let nfc: String = name.nfc().collect();
    let lower = nfc.to_lowercase();
    collapse_whitespace(&lower)
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// Schema-aware tokenization: canonicalizes organization-type words or
/// strips person honorifics, then splits on Unicode word boundaries.
pub fn tokenize(schema: &str, name: &str) -> Vec<String> {
    let processed = preprocess(name);
    let words: Vec<&str> = processed.unicode_words().collect();

    if ORGANIZATION_SCHEMATA.contains(&schema) {
        words
            .iter()
            .map(|w| canonical_org_word(w))
            .collect()
    } else if schema == PERSON_SCHEMA {
        words
            .iter()
            .filter(|w| !PERSON_HONORIFICS.contains(&w.to_lowercase().as_str()))
            .map(|w| w.to_string())
            .collect()
    } else {
        words.into_iter().map(|w| w.to_string()).collect()
    }
}

fn canonical_org_word(word: &str) -> String {
    let lower = word.to_lowercase();
    for (abbr, canonical) in ORG_TYPE_CANONICAL {
        if lower == *abbr {
            return canonical.to_string();
        }
    }
    word.to_string()
}

/// Strips diacritics by NFD-decomposing and discarding combining marks,
/// keeping only ASCII-representable characters.
pub fn ascii_fold(token: &str) -> String {
    token
        .nfd()
        .filter(|c| unicode_normalization::char::canonical_combining_class(*c) == 0)
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase()
}

/// For each name: ASCII-fold tokens, sort ascending, concatenate without
/// separators. Keys shorter than 5 characters are dropped.
pub fn name_keys(schema: &str, names: &[String]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for name in names {
        let mut tokens: Vec<String> = tokenize(schema, name)
            .iter()
            .map(|t| ascii_fold(t))
            .filter(|t| !t.is_empty())
            .collect();
        tokens.sort();
        let key = tokens.concat();
        if key.chars().count() >= 5 {
            out.insert(key);
        }
    }
    out
}

/// Tokens of length >= 2, plus their ASCII-folded variants.
pub fn name_parts(schema: &str, names: &[String]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for name in names {
        for token in tokenize(schema, name) {
            if token.chars().count() >= 2 {
                out.insert(token.clone());
                let folded = ascii_fold(&token);
                if folded.chars().count() >= 2 {
                    out.insert(folded);
                }
            }
        }
    }
    out
}

/// Whether a token is made up only of modern (non-historic, non-combining)
/// alphabetic characters -- the gate the spec applies before phonetic
/// encoding.
fn is_modern_alphabetic(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_alphabetic())
}

/// Double Metaphone codes for tokens of at least 3 characters using only
/// modern alphabetic characters; codes of length <= 2 are discarded as too
/// weak to discriminate.
pub fn phonetic(schema: &str, names: &[String]) -> BTreeSet<String> {
    let encoder = DoubleMetaphone::new(None);
    let mut out = BTreeSet::new();
    for name in names {
        for token in tokenize(schema, name) {
            if token.chars().count() < 3 || !is_modern_alphabetic(&token) {
                continue;
            }
            let code = encoder.encode(&token);
            if code.chars().count() > 2 {
                out.insert(code);
            }
        }
    }
    out
}

/// Cross-alphabet name symbols, rendered as `[NAME:<id>]` tags.
pub fn symbols(schema: &str, names: &[String], dictionary: &dyn NameSymbolDictionary) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for name in names {
        for token in tokenize(schema, name) {
            for id in dictionary.symbols_for(&token) {
                out.insert(format_symbol(id));
            }
        }
    }
    out
}

/// Levenshtein edit distance between two strings, operating on Unicode
/// scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Picks at most `limit` names that are maximally representative of `names`.
///
/// The first pick is the centroid: the name with the smallest sum of
/// distances to every other name. Each subsequent pick maximizes the sum of
/// Levenshtein distances to the names already picked, which biases the
/// selection toward diverse renderings (transliterations, nicknames, ...)
/// rather than near-duplicates.
pub fn pick_names(names: &[String], limit: usize) -> Vec<String> {
    if names.is_empty() || limit == 0 {
        return Vec::new();
    }
    if names.len() <= limit {
        return names.to_vec();
    }

    let distances = |a: &str, b: &str| levenshtein(a, b);

    let centroid_idx = (0..names.len())
        .min_by_key(|&i| {
            names
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, n)| distances(&names[i], n))
                .sum::<usize>()
        })
        .expect("names is non-empty");

    let mut picked = vec![centroid_idx];

    while picked.len() < limit {
        let next = (0..names.len())
            .filter(|i| !picked.contains(i))
            .max_by_key(|&i| picked.iter().map(|&p| distances(&names[i], &names[p])).sum::<usize>())
            .expect("candidates remain");
        picked.push(next);
    }

    picked.into_iter().map(|i| names[i].clone()).collect()
}

/// Bundles the name pipeline behind the schema catalog and name-symbol
/// dictionary it needs, for callers that want one call producing every
/// representation at once (as used by `MatchQuery` and document building).
pub struct NameProcessor<'a> {
    pub catalog: &'a dyn SchemaCatalog,
    pub dictionary: &'a dyn NameSymbolDictionary,
}

/// Every name representation the document builder and `MatchQuery` need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameRepresentations {
    pub names: BTreeSet<String>,
    pub name_keys: BTreeSet<String>,
    pub name_parts: BTreeSet<String>,
    pub name_phonetic: BTreeSet<String>,
    pub name_symbols: BTreeSet<String>,
}

impl<'a> NameProcessor<'a> {
    pub fn new(catalog: &'a dyn SchemaCatalog, dictionary: &'a dyn NameSymbolDictionary) -> Self {
        NameProcessor { catalog, dictionary }
    }

    pub fn represent(&self, schema: &str, raw_names: &[String]) -> NameRepresentations {
        let _ = self.catalog; // reserved for future schema-specific lookups
        let preprocessed: Vec<String> = raw_names.iter().map(|n| preprocess(n)).collect();
        NameRepresentations {
            names: preprocessed.iter().cloned().collect(),
            name_keys: name_keys(schema, &preprocessed),
            name_parts: name_parts(schema, &preprocessed),
            name_phonetic: phonetic(schema, &preprocessed),
            name_symbols: symbols(schema, &preprocessed, self.dictionary),
        }
    }

    pub fn pick_names(&self, raw_names: &[String], limit: usize) -> Vec<String> {
        let preprocessed: Vec<String> = raw_names.iter().map(|n| preprocess(n)).collect();
        pick_names(&preprocessed, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_normalizes_case_and_whitespace() {
        assert_eq!(preprocess("  Vladimir   Putin  "), "vladimir putin");
    }

    #[test]
    fn tokenize_strips_person_honorifics() {
        let tokens = tokenize("Person", "Dr. Jane Doe");
        assert_eq!(tokens, vec!["jane".to_string(), "doe".to_string()]);
    }

    #[test]
    fn tokenize_canonicalizes_organization_types() {
        let tokens = tokenize("Company", "Acme Corp");
        assert_eq!(tokens, vec!["acme".to_string(), "Corporation".to_string()]);
    }

    #[test]
    fn name_keys_are_case_and_diacritic_invariant() {
        let a = name_keys("Person", &["José Álvarez".to_string()]);
        let b = name_keys("Person", &["JOSE ALVAREZ".to_string()]);
        assert_eq!(a, b);
        assert!(a.iter().next().unwrap().chars().count() >= 5);
    }

    #[test]
    fn name_keys_drop_short_results() {
        let keys = name_keys("Person", &["Al Jo".to_string()]);
        assert!(keys.is_empty());
    }

    #[test]
    fn name_parts_include_ascii_folded_variants() {
        let parts = name_parts("Person", &["Müller".to_string()]);
        assert!(parts.contains("müller"));
        assert!(parts.contains("muller"));
    }

    #[test]
    fn phonetic_shares_code_for_similar_spellings() {
        let smith = phonetic("Person", &["smith".to_string()]);
        let smythe = phonetic("Person", &["smythe".to_string()]);
        assert!(!smith.is_disjoint(&smythe));
    }

    #[test]
    fn phonetic_skips_short_and_non_alphabetic_tokens() {
        let codes = phonetic("Person", &["ab 99".to_string()]);
        assert!(codes.is_empty());
    }

    #[test]
    fn levenshtein_distance_basic_cases() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
    }

    #[test]
    fn pick_names_returns_all_when_fewer_than_limit() {
        let names = vec!["Ana".to_string(), "Bob".to_string()];
        let picked = pick_names(&names, 5);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn pick_names_caps_at_limit() {
        let names = vec![
            "Vladimir Putin".to_string(),
            "Владимир Путин".to_string(),
            "V. Putin".to_string(),
            "Vladimir Vladimirovich Putin".to_string(),
            "Putin".to_string(),
            "V.V. Putin".to_string(),
        ];
        let picked = pick_names(&names, 3);
        assert_eq!(picked.len(), 3);
        let unique: BTreeSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 3);
    }
}
