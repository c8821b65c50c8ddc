//! Cross-alphabet name symbols.
//!
//! The real Rigour Names catalog that assigns stable ids to
//! transliteration-equivalent names (e.g. "Putin" / "Путин") is externally
//! defined; this module only *consumes* it through [`NameSymbolDictionary`],
//! per the "the core only consumes it" non-goal.

use std::collections::HashMap;

use smallvec::SmallVec;

/// An opaque id identifying a cross-alphabet name or name-part synonym set.
pub type NameSymbolId = u32;

/// Resolves name tokens to name-symbol ids. Implementors may back this with
/// a large externally-loaded dictionary (the real Rigour Names data); the
/// core never hard-codes the catalog.
pub trait NameSymbolDictionary: Send + Sync {
    fn symbols_for(&self, token: &str) -> SmallVec<[NameSymbolId; 2]>;
}

/// Renders a symbol id in the `[NAME:<id>]` shape used as an ES term value.
pub fn format_symbol(id: NameSymbolId) -> String {
    format!("[NAME:{id}]")
}

/// A small built-in dictionary covering a handful of well-known cross-alphabet
/// transliteration synonyms, enough to exercise the matching pipeline and its
/// tests. Production embedders supply their own larger dictionary backed by
/// the real Rigour Names data.
#[derive(Debug, Clone, Default)]
pub struct StaticNameSymbolDictionary {
    table: HashMap<String, NameSymbolId>,
}

impl StaticNameSymbolDictionary {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        let mut next_id: NameSymbolId = 1;
        for group in DEFAULT_SYNONYM_GROUPS {
            for token in *group {
                table.insert(normalize_key(token), next_id);
            }
            next_id += 1;
        }
        StaticNameSymbolDictionary { table }
    }

    pub fn insert_group(&mut self, id: NameSymbolId, tokens: &[&str]) {
        for token in tokens {
            self.table.insert(normalize_key(token), id);
        }
    }
}

fn normalize_key(token: &str) -> String {
    token.to_lowercase()
}

/// A handful of Latin/Cyrillic/Arabic renderings of frequently-matched names,
/// each inner slice sharing one symbol id.
const DEFAULT_SYNONYM_GROUPS: &[&[&str]] = &[
    &["putin", "путин", "putine"],
    &["vladimir", "владимир", "wladimir"],
    &["muhammad", "mohammed", "mohamed", "محمد"],
    &["smith", "smyth", "smythe"],
];

impl NameSymbolDictionary for StaticNameSymbolDictionary {
    fn symbols_for(&self, token: &str) -> SmallVec<[NameSymbolId; 2]> {
        let mut out = SmallVec::new();
        if let Some(id) = self.table.get(&normalize_key(token)) {
            out.push(*id);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_alphabet_synonyms_share_an_id() {
        let dict = StaticNameSymbolDictionary::new();
        let latin = dict.symbols_for("Putin");
        let cyrillic = dict.symbols_for("путин");
        assert!(!latin.is_empty());
        assert_eq!(latin, cyrillic);
    }

    #[test]
    fn unknown_token_has_no_symbols() {
        let dict = StaticNameSymbolDictionary::new();
        assert!(dict.symbols_for("zzznotaname").is_empty());
    }

    #[test]
    fn formats_bracketed_tag() {
        assert_eq!(format_symbol(7), "[NAME:7]");
    }
}
