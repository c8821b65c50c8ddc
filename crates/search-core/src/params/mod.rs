//! The URL-style parameter grammar and its typed view.

pub mod auth;
pub mod parser;

pub use auth::Auth;
pub use parser::{parse, FacetSpec, MltParams, ParsedParams, SignificantTextSpec, SortDir};
