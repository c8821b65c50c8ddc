//! The crate-wide error type. Every failure kind from the parameter parser,
//! authorization, schema resolution, transport and bulk ingestion layers is
//! a variant here rather than an ad hoc string, so callers can match on kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A parameter was malformed or out of range (e.g. `offset+limit` over
    /// `MAX_PAGE`, an unknown range operator). Raised before any request is
    /// built; never reaches the cluster.
    #[error("invalid parameter `{field}`: {message}")]
    Param { field: String, message: String },

    /// `search_auth` is enabled but no authorization object was supplied.
    #[error("authorization required but no auth context was provided")]
    AuthRequired,

    /// A `MatchQuery`/`MoreLikeThisQuery` was built from an unknown or
    /// unmatchable schema.
    #[error("schema `{schema}` is unknown or not matchable")]
    Schema { schema: String },

    /// The transport failed after exhausting retries, or a non-retryable
    /// connection-level failure occurred.
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    /// Elasticsearch returned a 4xx (other than 429) response.
    #[error("cluster rejected request (status {status}): {body}")]
    Cluster { status: u16, body: String },

    /// One or more items failed during a bulk ingestion batch (version
    /// conflicts are dropped silently and are not reported here; transient
    /// failures that exhausted retries and all other failures are).
    #[error("{failed} of {total} bulk item(s) failed")]
    Bulk {
        total: usize,
        failed: usize,
        first_reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
