//! Project facade: create or load a project, add data, rebuild maps.
//!
//! [`AtlasProject`] orchestrates the full add-data flow: modality and lock
//! checks, metadata validation, shard planning, the concurrent upload
//! coordinator, and the remote rebuild trigger.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::client::{invalid_body, AtlasClient, CreateProjectRequest};
use crate::error::{AtlasError, Result};
use crate::models::{Dataset, Modality, ProjectMeta, Record, UploadReport};
use crate::progress::ProgressMode;
use crate::shard::plan_shards;
use crate::upload::{
    upload_shards, UploadBatch, UploadEndpoint, DEFAULT_SHARD_SIZE, DEFAULT_WORKERS,
};
use crate::validate::validate_and_correct_metadata;

/// Uploads are split into chunks of at most this many datums so very large
/// batches do not pin one giant worker queue in memory.
pub const MAX_MEMORY_CHUNK: usize = 150_000;

/// How often the lock is polled by [`AtlasProject::wait_until_accepting_data`].
const LOCK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Options for creating (or loading) a project by name.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub description: String,
    pub unique_id_field: String,
    pub modality: Modality,
    pub organization_name: Option<String>,
    pub is_public: bool,
    /// Delete and re-create the project if one with this name exists.
    pub reset_if_exists: bool,
    /// Allow loading an existing project of the same name to add data to
    /// it. When false, an existing project is an error.
    pub add_datums_if_exists: bool,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            description: "A description for your map.".to_string(),
            unique_id_field: crate::models::DEFAULT_ID_FIELD.to_string(),
            modality: Modality::Text,
            organization_name: None,
            is_public: true,
            reset_if_exists: false,
            add_datums_if_exists: true,
        }
    }
}

/// Options for one add-data call.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Datums per shard; capped at the server-friendly maximum of 5000.
    pub shard_size: usize,
    /// Concurrent shard uploads.
    pub workers: usize,
    /// Replace empty string values with the literal string `"null"` on
    /// text projects; when false, empty values fail validation.
    pub replace_empty_strings: bool,
    pub progress: ProgressMode,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
            workers: DEFAULT_WORKERS,
            replace_empty_strings: true,
            progress: ProgressMode::default_for_tty(),
        }
    }
}

/// A remote Atlas project plus its cached state.
pub struct AtlasProject {
    client: AtlasClient,
    meta: ProjectMeta,
}

impl std::fmt::Debug for AtlasProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasProject")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl AtlasProject {
    /// Load an existing project by id.
    pub async fn load(client: AtlasClient, project_id: &str) -> Result<Self> {
        let meta = client.project_by_id(project_id).await?;
        Ok(Self { client, meta })
    }

    /// Create a project by name, or load the existing one.
    ///
    /// With `reset_if_exists`, an existing project of the same name is
    /// deleted first. With `add_datums_if_exists` off, an existing project
    /// is an error rather than a load.
    pub async fn create_or_load(
        client: AtlasClient,
        name: &str,
        options: &ProjectOptions,
    ) -> Result<Self> {
        let organization = client
            .resolve_organization(options.organization_name.as_deref())
            .await?;

        let mut project_id = client
            .find_project_by_name(name, &organization.nickname)
            .await?;

        if let Some(id) = &project_id {
            if options.reset_if_exists {
                info!(
                    "found existing project `{}` in organization `{}`, clearing it of data by request",
                    name, organization.nickname
                );
                client.delete_project(id).await?;
                project_id = None;
            } else if !options.add_datums_if_exists {
                return Err(AtlasError::Api {
                    status: 409,
                    message: format!(
                        "project `{}` already exists in organization `{}`; \
                         set add_datums_if_exists to add data or reset_if_exists to start over",
                        name, organization.nickname
                    ),
                });
            } else {
                info!(
                    "loading existing project `{}` from organization `{}`",
                    name, organization.nickname
                );
            }
        }

        let project_id = match project_id {
            Some(id) => id,
            None => {
                client
                    .create_project(&CreateProjectRequest {
                        organization_id: organization.organization_id.clone(),
                        project_name: name.to_string(),
                        description: options.description.clone(),
                        unique_id_field: options.unique_id_field.clone(),
                        modality: options.modality,
                        is_public: options.is_public,
                    })
                    .await?
            }
        };

        Self::load(client, &project_id).await
    }

    /// The cached project state. Call [`refresh`](Self::refresh) first when
    /// staleness matters.
    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.project_name
    }

    pub fn modality(&self) -> Modality {
        self.meta.modality
    }

    pub fn total_datums(&self) -> u64 {
        self.meta.total_datums_in_project
    }

    /// Web link to a projection of this project.
    pub fn map_url(&self, projection_id: &str) -> String {
        format!(
            "{}/map/{}/{}",
            self.client.web_base(),
            self.meta.id,
            projection_id
        )
    }

    pub(crate) fn client(&self) -> &AtlasClient {
        &self.client
    }

    /// Re-fetch the project state. Call sparingly; use when it matters.
    pub async fn refresh(&mut self) -> Result<&ProjectMeta> {
        self.meta = self.client.project_by_id(&self.meta.id).await?;
        Ok(&self.meta)
    }

    /// Whether the server-side mutation lock is currently held (an index
    /// build is running). Refreshes the project state.
    pub async fn is_locked(&mut self) -> Result<bool> {
        self.refresh().await?;
        Ok(self.meta.insert_update_delete_lock)
    }

    /// Whether the project can ingest data right now.
    pub async fn is_accepting_data(&mut self) -> Result<bool> {
        Ok(!self.is_locked().await?)
    }

    /// Block until the project can ingest data, polling the lock.
    pub async fn wait_until_accepting_data(&mut self) -> Result<()> {
        loop {
            if self.is_accepting_data().await? {
                info!("project is ready to accept data");
                return Ok(());
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    /// Add records to a text project.
    ///
    /// Returns `Ok(true)` when the batch was ingested (including partial
    /// permanent failures, which are logged), `Ok(false)` when the upload
    /// aborted on the organization datum quota. Validation problems, a held
    /// project lock, and service overload raise instead.
    pub async fn add_text(
        &mut self,
        records: Vec<Record>,
        options: &UploadOptions,
    ) -> Result<bool> {
        if self.meta.modality != Modality::Text {
            return Err(AtlasError::WrongModality {
                attempted: "text".to_string(),
                actual: self.meta.modality.to_string(),
            });
        }
        info!("uploading text to Atlas");
        let report = self.add_batch(Dataset::text(records), options).await?;
        if report.failed > 0 {
            warn!("text upload partially succeeded");
        } else if report.completed {
            info!("text upload succeeded");
        }
        Ok(report.completed)
    }

    /// Add embeddings, paired one-to-one with metadata records, to an
    /// embedding project. Same return convention as [`add_text`](Self::add_text).
    pub async fn add_embeddings(
        &mut self,
        embeddings: Vec<Vec<f32>>,
        records: Vec<Record>,
        options: &UploadOptions,
    ) -> Result<bool> {
        if self.meta.modality != Modality::Embedding {
            return Err(AtlasError::WrongModality {
                attempted: "embedding".to_string(),
                actual: self.meta.modality.to_string(),
            });
        }
        let dataset = Dataset::with_embeddings(records, embeddings)?;
        info!("uploading embeddings to Atlas");
        let report = self.add_batch(dataset, options).await?;
        if report.failed > 0 {
            warn!("embedding upload partially succeeded");
        } else if report.completed {
            info!("embedding upload succeeded");
        }
        Ok(report.completed)
    }

    /// Validate, plan, and upload one dataset through the coordinator.
    async fn add_batch(
        &mut self,
        dataset: Dataset,
        options: &UploadOptions,
    ) -> Result<UploadReport> {
        let meta = self.refresh().await?.clone();
        if meta.insert_update_delete_lock {
            return Err(AtlasError::LockHeld);
        }

        let Dataset {
            mut records,
            embeddings,
        } = dataset;
        validate_and_correct_metadata(
            &mut records,
            &meta.unique_id_field,
            meta.modality,
            options.replace_empty_strings,
        )?;

        let plan = plan_shards(records.len(), options.shard_size);
        let endpoint = if meta.has_indices() {
            UploadEndpoint::Progressive
        } else {
            UploadEndpoint::Initial
        };

        let batch = Arc::new(UploadBatch {
            project_id: meta.id.clone(),
            records,
            embeddings,
        });
        let reporter = options.progress.reporter();

        upload_shards(
            self.client.transport(),
            batch,
            &plan,
            endpoint,
            meta.modality,
            options.workers,
            reporter.as_ref(),
        )
        .await
    }

    /// Add data and then rebuild all maps. Large inputs are uploaded in
    /// memory chunks of [`MAX_MEMORY_CHUNK`] datums.
    ///
    /// Pass embeddings for embedding projects and `None` for text
    /// projects. Returns `Ok(false)` without rebuilding when any chunk
    /// aborted on the organization quota.
    pub async fn update_maps(
        &mut self,
        records: Vec<Record>,
        embeddings: Option<Vec<Vec<f32>>>,
        options: &UploadOptions,
    ) -> Result<bool> {
        match (self.meta.modality, &embeddings) {
            (Modality::Embedding, None) => {
                return Err(AtlasError::WrongModality {
                    attempted: "text".to_string(),
                    actual: self.meta.modality.to_string(),
                })
            }
            (Modality::Text, Some(_)) => {
                return Err(AtlasError::WrongModality {
                    attempted: "embedding".to_string(),
                    actual: self.meta.modality.to_string(),
                })
            }
            _ => {}
        }
        if let Some(embeddings) = &embeddings {
            if embeddings.len() != records.len() {
                return Err(AtlasError::LengthMismatch {
                    records: records.len(),
                    embeddings: embeddings.len(),
                });
            }
        }

        info!("uploading data to Atlas");
        let mut records = records;
        let mut embeddings = embeddings;
        while !records.is_empty() {
            let take = records.len().min(MAX_MEMORY_CHUNK);
            let record_chunk: Vec<Record> = records.drain(..take).collect();
            let ok = match &mut embeddings {
                Some(embeddings) => {
                    let embedding_chunk: Vec<Vec<f32>> = embeddings.drain(..take).collect();
                    self.add_embeddings(embedding_chunk, record_chunk, options)
                        .await?
                }
                None => self.add_text(record_chunk, options).await?,
            };
            if !ok {
                warn!("upload aborted before completion; skipping map rebuild");
                return Ok(false);
            }
        }
        info!("upload succeeded");

        self.rebuild_maps().await?;
        Ok(true)
    }

    /// Rebuild all maps in the project against its latest data. Additions,
    /// updates, and deletions are not reflected in maps until this runs.
    pub async fn rebuild_maps(&self) -> Result<()> {
        info!("updating maps in project `{}`", self.meta.project_name);
        let body = serde_json::json!({ "project_id": self.meta.id });
        let response = self
            .client
            .transport()
            .post_json("/v1/project/update_indices", &body)
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("failed to trigger map rebuild: {}", response.detail()),
            });
        }
        Ok(())
    }

    /// Retrieve the contents of datums by id.
    pub async fn get_data(&self, ids: &[String]) -> Result<Vec<Record>> {
        let body = serde_json::json!({
            "project_id": self.meta.id,
            "datum_ids": ids,
        });
        let response = self
            .client
            .transport()
            .post_json("/v1/project/data/get", &body)
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: response.detail(),
            });
        }
        let json = response.json().ok_or_else(|| invalid_body(&response))?;
        let datums: Vec<Record> = json
            .get("datums")
            .and_then(|d| d.as_array())
            .ok_or_else(|| invalid_body(&response))?
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect();
        Ok(datums)
    }

    /// Delete datums from the project by id.
    pub async fn delete_data(&self, ids: &[String]) -> Result<()> {
        let body = serde_json::json!({
            "project_id": self.meta.id,
            "datum_ids": ids,
        });
        let response = self
            .client
            .transport()
            .post_json("/v1/project/data/delete", &body)
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: response.detail(),
            });
        }
        Ok(())
    }
}
