//! Index build job submission.
//!
//! Index and projection builds are opaque remote jobs; the client only
//! assembles the build template, submits it, and reports the job and map
//! ids back. Hyperparameter defaults follow the hosted service's current
//! recommendations and shift automatically for very large projects.

use tracing::{info, warn};

use crate::error::{AtlasError, Result};
use crate::models::Modality;
use crate::project::AtlasProject;

const DEFAULT_PROJECTION_N_NEIGHBORS: u32 = 15;
const DEFAULT_PROJECTION_EPOCHS: u32 = 50;
const DEFAULT_PROJECTION_SPREAD: f64 = 1.0;

// Defaults for projects of a million datums or more.
const LARGE_PROJECTION_N_NEIGHBORS: u32 = 128;
const LARGE_PROJECTION_EPOCHS: u32 = 128;
const LARGE_PROJECT_THRESHOLD: u64 = 1_000_000;

/// Options for building an index (and its map) over a project.
#[derive(Debug, Clone)]
pub struct IndexBuildOptions {
    /// For text projects: the metadata field to embed and index. Required
    /// for text, ignored for embedding projects.
    pub indexed_field: Option<String>,
    /// Project fields to allow coloring by on the map.
    pub colorable_fields: Vec<String>,
    /// Use the multilingual embedder for text projects.
    pub multilingual: bool,
    pub build_topic_model: bool,
    pub projection_n_neighbors: u32,
    pub projection_epochs: u32,
    pub projection_spread: f64,
    /// Text field to estimate topic labels from; defaults to the indexed
    /// field for text projects.
    pub topic_label_field: Option<String>,
    /// Name of an existing index whose embeddings should be reused.
    pub reuse_embeddings_from_index: Option<String>,
}

impl Default for IndexBuildOptions {
    fn default() -> Self {
        Self {
            indexed_field: None,
            colorable_fields: Vec::new(),
            multilingual: false,
            build_topic_model: false,
            projection_n_neighbors: DEFAULT_PROJECTION_N_NEIGHBORS,
            projection_epochs: DEFAULT_PROJECTION_EPOCHS,
            projection_spread: DEFAULT_PROJECTION_SPREAD,
            topic_label_field: None,
            reuse_embeddings_from_index: None,
        }
    }
}

/// Result of submitting an index build.
#[derive(Debug, Clone)]
pub struct CreateIndexResponse {
    /// Job id to poll for build progress.
    pub job_id: String,
    /// The index being built.
    pub index_id: String,
    /// Link to the map, once a projection was registered for the index.
    pub map_url: Option<String>,
}

impl AtlasProject {
    /// Submit an index build for this project and return the job handle.
    ///
    /// For text projects `indexed_field` is required and must name an
    /// existing project field. The id field cannot be used as a colorable
    /// field.
    pub async fn create_index(
        &mut self,
        name: &str,
        options: &IndexBuildOptions,
    ) -> Result<CreateIndexResponse> {
        let meta = self.refresh().await?.clone();

        if options
            .colorable_fields
            .iter()
            .any(|f| f == &meta.unique_id_field)
        {
            return Err(AtlasError::Api {
                status: 400,
                message: format!("cannot color by unique id field: {}", meta.unique_id_field),
            });
        }

        // Large projects get sturdier projection settings unless the
        // caller tuned them explicitly.
        let mut n_neighbors = options.projection_n_neighbors;
        let mut epochs = options.projection_epochs;
        if meta.total_datums_in_project >= LARGE_PROJECT_THRESHOLD
            && n_neighbors == DEFAULT_PROJECTION_N_NEIGHBORS
            && epochs == DEFAULT_PROJECTION_EPOCHS
        {
            n_neighbors = LARGE_PROJECTION_N_NEIGHBORS;
            epochs = LARGE_PROJECTION_EPOCHS;
        }

        let projection_hyperparameters = serde_json::json!({
            "n_neighbors": n_neighbors,
            "n_epochs": epochs,
            "spread": options.projection_spread,
        })
        .to_string();
        let nearest_neighbor_hyperparameters = serde_json::json!({
            "space": "l2",
            "ef_construction": 100,
            "M": 16,
        })
        .to_string();

        let template = match meta.modality {
            Modality::Embedding => serde_json::json!({
                "project_id": meta.id,
                "index_name": name,
                "indexed_field": null,
                "atomizer_strategies": null,
                "model": null,
                "colorable_fields": options.colorable_fields,
                "model_hyperparameters": null,
                "nearest_neighbor_index": "HNSWIndex",
                "nearest_neighbor_index_hyperparameters": nearest_neighbor_hyperparameters,
                "projection": "NomicProject",
                "projection_hyperparameters": projection_hyperparameters,
                "topic_model_hyperparameters": serde_json::json!({
                    "build_topic_model": options.build_topic_model,
                    "community_description_target_field": options.topic_label_field,
                })
                .to_string(),
            }),
            Modality::Text => {
                let indexed_field =
                    options
                        .indexed_field
                        .as_deref()
                        .ok_or_else(|| AtlasError::Api {
                            status: 400,
                            message: "text projects need an indexed_field to build an index"
                                .to_string(),
                        })?;
                if !meta.project_fields.iter().any(|f| f == indexed_field) {
                    return Err(AtlasError::Api {
                        status: 400,
                        message: format!(
                            "indexed field `{}` is not a project field; valid options are {:?}",
                            indexed_field, meta.project_fields
                        ),
                    });
                }

                let reuse_from_id = match &options.reuse_embeddings_from_index {
                    Some(reuse_name) => {
                        let id = meta
                            .atlas_indices
                            .iter()
                            .find(|idx| &idx.index_name == reuse_name)
                            .map(|idx| idx.id.clone());
                        if id.is_none() {
                            let names: Vec<&str> = meta
                                .atlas_indices
                                .iter()
                                .map(|idx| idx.index_name.as_str())
                                .collect();
                            return Err(AtlasError::Api {
                                status: 400,
                                message: format!(
                                    "could not find index `{}` to reuse embeddings from; options are {:?}",
                                    reuse_name, names
                                ),
                            });
                        }
                        id
                    }
                    None => None,
                };

                let model = if options.multilingual {
                    "NomicEmbedMultilingual"
                } else {
                    "NomicEmbed"
                };

                serde_json::json!({
                    "project_id": meta.id,
                    "index_name": name,
                    "indexed_field": indexed_field,
                    "atomizer_strategies": ["document", "charchunk"],
                    "model": model,
                    "colorable_fields": options.colorable_fields,
                    "reuse_atoms_and_embeddings_from": reuse_from_id,
                    "model_hyperparameters": serde_json::json!({
                        "dataset_buffer_size": 1000,
                        "batch_size": 20,
                        "polymerize_by": "charchunk",
                        "norm": "both",
                    })
                    .to_string(),
                    "nearest_neighbor_index": "HNSWIndex",
                    "nearest_neighbor_index_hyperparameters": nearest_neighbor_hyperparameters,
                    "projection": "NomicProject",
                    "projection_hyperparameters": projection_hyperparameters,
                    "topic_model_hyperparameters": serde_json::json!({
                        "build_topic_model": options.build_topic_model,
                        "community_description_target_field":
                            options.topic_label_field.as_deref().unwrap_or(indexed_field),
                    })
                    .to_string(),
                })
            }
        };

        let response = self
            .client()
            .transport()
            .post_json("/v1/project/index/create", &template)
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("failed to create index: {}", response.detail()),
            });
        }
        let job_id = response
            .json()
            .and_then(|v| v.get("job_id").and_then(|j| j.as_str()).map(String::from))
            .ok_or_else(|| AtlasError::Api {
                status: response.status,
                message: format!("unexpected response body: {}", response.body),
            })?;

        let job = self.client().index_job(&job_id).await?;
        let index_id = job
            .get("index_id")
            .and_then(|i| i.as_str())
            .unwrap_or_default()
            .to_string();

        // The projection registers shortly after the job is accepted; it
        // may not be visible yet on the first read.
        let meta = self.refresh().await?;
        let projection_id = meta
            .atlas_indices
            .iter()
            .find(|idx| idx.id == index_id)
            .and_then(|idx| idx.projections.first())
            .map(|p| p.id.clone());

        let map_url = match projection_id {
            Some(projection_id) => {
                let url = self.map_url(&projection_id);
                info!("created map `{}` in project `{}`: {}", name, self.name(), url);
                Some(url)
            }
            None => {
                warn!("could not find a map being built for this project; check the dashboard for build status");
                None
            }
        };

        Ok(CreateIndexResponse {
            job_id,
            index_id,
            map_url,
        })
    }
}
