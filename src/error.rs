//! Error taxonomy for the Atlas client.
//!
//! Local validation errors are raised before any network call and are never
//! retried. Transient service errors (HTTP 504) are handled inside the
//! upload coordinator and only escalate to [`AtlasError::ServiceOverloaded`]
//! when the retry volume indicates an overloaded backend. Per-shard
//! permanent failures do not surface here at all: they are aggregated into
//! the [`UploadReport`](crate::models::UploadReport) and logged.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// All errors the Atlas client can raise.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// A record lacks the project's unique id field and the field is not
    /// the default one, so the client will not inject an id.
    #[error("record is missing the required id field `{field}`")]
    MissingRequiredField { field: String },

    /// Atlas does not support id values longer than 36 characters.
    #[error("id value `{value}` is longer than 36 characters")]
    IdTooLong { value: String },

    /// All records in a batch must share an identical key set.
    #[error("all records must have the same keys, but found key sets {expected:?} and {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A value under an inferred timestamp key does not parse as an
    /// ISO-8601 calendar date.
    #[error("value `{value}` for timestamp key `{key}` cannot be parsed as an ISO-8601 date")]
    InvalidTimestamp { key: String, value: String },

    /// Keys starting with `_` are reserved for Atlas.
    #[error("metadata keys cannot start with `_`: found `{key}`")]
    MetadataKeyReserved { key: String },

    /// Empty string values were rejected by caller request.
    #[error("record has an empty string value for key `{key}`")]
    EmptyValueNotAllowed { key: String },

    /// Record values must be strings, integers, or floats.
    #[error("metadata values must be strings, integers, or floats; key `{key}` holds a {found}")]
    UnsupportedValueType { key: String, found: String },

    /// A single shard serialized past the request size limit. Raised
    /// locally, before anything is sent over the wire.
    #[error(
        "shard covering records {start}..{end} serializes to {bytes} bytes (limit {limit}); \
         decrease the shard size or remove unneeded metadata fields"
    )]
    ShardTooLarge {
        start: usize,
        end: usize,
        bytes: usize,
        limit: usize,
    },

    /// Records and embeddings must be paired one to one.
    #[error("expected records and embeddings of equal length, found {records} and {embeddings}")]
    LengthMismatch { records: usize, embeddings: usize },

    /// Data was added with the wrong modality for the target project.
    #[error("cannot add {attempted} data to a project with modality `{actual}`")]
    WrongModality { attempted: String, actual: String },

    /// The project holds its insert/update/delete lock (an index build is
    /// in progress).
    #[error("project is currently indexing and cannot ingest new datums; try again later")]
    LockHeld,

    /// The transient-error volume crossed the retry-storm threshold.
    #[error("Atlas is under high load and cannot ingest datums at this time; try again later")]
    ServiceOverloaded,

    /// The bearer token was rejected by the API.
    #[error("authorization token is not valid; obtain a new token and retry")]
    AuthInvalid,

    /// Configuration file or environment problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// A non-success response from the Atlas API outside the upload path.
    #[error("Atlas API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// An upload worker task failed to complete.
    #[error("upload worker failed: {0}")]
    TaskFailed(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}
