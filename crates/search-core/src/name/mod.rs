//! Name processing: preprocessing, tokenization, matching-key extraction and
//! cross-alphabet symbol resolution.

pub mod processor;
pub mod symbols;

pub use processor::{
    ascii_fold, levenshtein, name_keys, name_parts, phonetic, pick_names, preprocess, symbols as name_symbols,
    tokenize, NameProcessor, NameRepresentations,
};
pub use symbols::{format_symbol, NameSymbolDictionary, NameSymbolId, StaticNameSymbolDictionary};
