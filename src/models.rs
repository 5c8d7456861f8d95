//! Core data types used throughout the Atlas client.
//!
//! These types represent the records, datasets, and remote project state
//! that flow through the validation and upload pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// The id field name the client is allowed to auto-populate. Projects using
/// any other id field must supply ids themselves.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Maximum length of an id value, in characters.
pub const MAX_ID_LENGTH: usize = 36;

/// One flat datum: field name to string/integer/float value.
///
/// Records arrive as arbitrary JSON objects; the
/// [validator](crate::validate) enforces the flat shape and allowed value
/// types before anything is uploaded.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// An ordered batch of records, optionally paired one-to-one with
/// fixed-dimension embedding vectors.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub embeddings: Option<Vec<Vec<f32>>>,
}

impl Dataset {
    /// A text-modality dataset: records only.
    pub fn text(records: Vec<Record>) -> Self {
        Self {
            records,
            embeddings: None,
        }
    }

    /// An embedding-modality dataset. Fails if the records and embeddings
    /// are not the same length.
    pub fn with_embeddings(records: Vec<Record>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if records.len() != embeddings.len() {
            return Err(AtlasError::LengthMismatch {
                records: records.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(Self {
            records,
            embeddings: Some(embeddings),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Data modality of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Embedding,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Embedding => write!(f, "embedding"),
        }
    }
}

/// Remote project state as returned by `GET /v1/project/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    pub id: String,
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    pub modality: Modality,
    pub unique_id_field: String,
    #[serde(default)]
    pub project_fields: Vec<String>,
    /// Mutation lock held server-side while an index build runs. The client
    /// only observes it; enforcement is remote.
    #[serde(default)]
    pub insert_update_delete_lock: bool,
    #[serde(default)]
    pub total_datums_in_project: u64,
    #[serde(default)]
    pub atlas_indices: Vec<IndexMeta>,
}

impl ProjectMeta {
    /// True once the project has at least one built index; further uploads
    /// must use the progressive endpoint.
    pub fn has_indices(&self) -> bool {
        !self.atlas_indices.is_empty()
    }
}

/// A built index over a project's data, with its 2D projections.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexMeta {
    pub id: String,
    pub index_name: String,
    #[serde(default)]
    pub projections: Vec<ProjectionMeta>,
}

/// A single 2D projection (browsable map) under an index.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionMeta {
    pub id: String,
}

/// Outcome tally for one upload call. Counters are in datums, not shards,
/// and are scoped to the call; nothing is persisted between calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Datums acknowledged by the server (ID conflicts count here too).
    pub succeeded: usize,
    /// Datums in shards that failed permanently and were skipped.
    pub failed: usize,
    /// Cumulative datums behind transient (504) retries.
    pub transient_errors: usize,
    /// False when the call aborted on an organization quota condition.
    pub completed: bool,
}
