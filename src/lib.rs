//! # Atlas Client
//!
//! A Rust client SDK for Atlas, a hosted neural-data visualization service.
//!
//! The SDK authenticates a user, creates or loads remote *projects*, uploads
//! batches of embeddings or text records over HTTP, and triggers remote
//! index/map builds. All embedding, indexing, and projection work happens
//! server-side; this crate is the ingestion and orchestration client.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌─────────────┐   ┌───────────┐
//! │ Validator │──▶│   Shard    │──▶│   Upload    │──▶│   Atlas   │
//! │ (schema)  │   │  Planner   │   │ Coordinator │   │    API    │
//! └───────────┘   └────────────┘   └──────┬──────┘   └───────────┘
//!                                         │
//!                                  progress events
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn run() -> atlas_client::Result<()> {
//! use atlas_client::{AtlasClient, AtlasProject, Credentials, UploadOptions};
//!
//! let creds = Credentials::from_env()?;
//! let client = AtlasClient::new(&creds)?;
//! let mut project = AtlasProject::load(client, "my-project-id").await?;
//!
//! let records = vec![/* flat JSON records */];
//! project.add_text(records, &UploadOptions::default()).await?;
//! project.rebuild_maps().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Tenant and credential configuration |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`transport`] | Authenticated HTTP request sender |
//! | [`validate`] | Batch metadata validation |
//! | [`shard`] | Shard planning for bulk uploads |
//! | [`upload`] | Concurrent shard upload coordinator |
//! | [`progress`] | Upload progress reporting |
//! | [`client`] | User, organization, and project API wrappers |
//! | [`project`] | Project facade: add data, rebuild maps |
//! | [`index`] | Index build job submission |

pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod progress;
pub mod project;
pub mod shard;
pub mod transport;
pub mod upload;
pub mod validate;

pub use client::AtlasClient;
pub use config::Credentials;
pub use error::{AtlasError, Result};
pub use models::{Dataset, Modality, ProjectMeta, Record, UploadReport};
pub use progress::ProgressMode;
pub use project::{AtlasProject, ProjectOptions, UploadOptions};
