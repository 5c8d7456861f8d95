//! Concurrent shard upload coordination.
//!
//! The coordinator drives a bounded pool of workers that POST dataset
//! shards to Atlas, classifies each response, retries transient failures,
//! and aborts on fatal conditions. Workers only perform the network call;
//! the coordinator loop is the sole owner of the pending queue and the
//! outcome tally, so no mutation needs a lock.
//!
//! Per-shard lifecycle:
//!
//! ```text
//! Pending → InFlight → Succeeded
//!                    → RetryableFailure (504) → Pending
//!                    → PermanentFailure (413, other non-200)
//!                    → FatalAbort (quota, lock held, overload)
//! ```
//!
//! A fatal abort stops new submissions but does not cancel in-flight
//! requests; their results are drained and discarded.
//!
//! Server failures are recognized by substring matching on the response
//! body. This mirrors the server's current error contract and is kept as a
//! compatibility shim until the API exposes machine-readable reason codes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::{AtlasError, Result};
use crate::models::{Modality, Record, UploadReport};
use crate::progress::{UploadProgressEvent, UploadProgressReporter};
use crate::transport::{ApiResponse, Transport};

/// Maximum serialized size of one shard's metadata, in bytes. Exceeding it
/// is a local error; the shard is never sent.
pub const MAX_SHARD_BYTES: usize = 8_000_000;

/// Default number of datums per shard.
pub const DEFAULT_SHARD_SIZE: usize = 1000;

/// Default number of concurrent shard uploads.
pub const DEFAULT_WORKERS: usize = 10;

/// Fraction of transient errors (against all classified datums) above
/// which the coordinator suspects a retry storm.
const OVERLOAD_FRACTION: f64 = 0.25;

/// Transient datum count must also exceed this many shards' worth before
/// the overload abort fires.
const OVERLOAD_SHARD_MULTIPLIER: usize = 3;

const QUOTA_EXCEEDED_MARKER: &str = "more datums exceeds your organization limit";
const LOCK_HELD_MARKER: &str = "Project transaction lock is held";
const ID_CONFLICT_MARKER: &str = "Insert failed due to ID conflict";

/// Which ingestion endpoint a batch targets. Progressive uploads append to
/// a project that already has a built index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEndpoint {
    Initial,
    Progressive,
}

impl UploadEndpoint {
    /// API path for this endpoint and project modality.
    pub fn path(&self, modality: Modality) -> String {
        let kind = match modality {
            Modality::Embedding => "embedding",
            Modality::Text => "json",
        };
        let stage = match self {
            UploadEndpoint::Initial => "initial",
            UploadEndpoint::Progressive => "progressive",
        };
        format!("/v1/project/data/add/{}/{}", kind, stage)
    }
}

/// The read-only payload shared by all shard workers of one upload call.
#[derive(Debug)]
pub struct UploadBatch {
    pub project_id: String,
    pub records: Vec<Record>,
    pub embeddings: Option<Vec<Vec<f32>>>,
}

/// Classification of one shard-upload response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShardClass {
    Succeeded,
    /// The datum already exists server-side; idempotent success.
    IdConflict,
    /// Organization-level quota condition; call-level abort, reported as
    /// `completed == false` rather than an error.
    QuotaExceeded,
    /// The project is being reindexed concurrently.
    LockHeld,
    /// HTTP 413; the shard will never fit, do not retry.
    PayloadTooLarge,
    /// HTTP 504; resubmit the identical shard.
    Transient,
    /// Any other non-200 response.
    Permanent,
}

fn classify(response: &ApiResponse) -> ShardClass {
    if response.is_success() {
        return ShardClass::Succeeded;
    }
    if response.body.contains(QUOTA_EXCEEDED_MARKER) {
        return ShardClass::QuotaExceeded;
    }
    if response.body.contains(LOCK_HELD_MARKER) {
        return ShardClass::LockHeld;
    }
    if response.body.contains(ID_CONFLICT_MARKER) {
        return ShardClass::IdConflict;
    }
    match response.status {
        413 => ShardClass::PayloadTooLarge,
        504 => ShardClass::Transient,
        _ => ShardClass::Permanent,
    }
}

/// Encode an embedding shard as base64 over a little-endian f32 matrix
/// prefixed with a (rows, dims) u32 header.
fn encode_embedding_shard(rows: &[Vec<f32>]) -> String {
    let dims = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut bytes = Vec::with_capacity(8 + rows.len() * dims * 4);
    bytes.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(dims as u32).to_le_bytes());
    for row in rows {
        for v in row {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    BASE64.encode(bytes)
}

/// Build the request body for one shard, enforcing the serialized size
/// guard on the metadata portion.
fn shard_body(batch: &UploadBatch, range: &Range<usize>) -> Result<serde_json::Value> {
    let data_shard = &batch.records[range.clone()];
    let serialized = serde_json::to_vec(data_shard)?;
    if serialized.len() > MAX_SHARD_BYTES {
        return Err(AtlasError::ShardTooLarge {
            start: range.start,
            end: range.end,
            bytes: serialized.len(),
            limit: MAX_SHARD_BYTES,
        });
    }

    let mut body = serde_json::json!({
        "project_id": batch.project_id,
        "data": data_shard,
    });
    if let Some(embeddings) = &batch.embeddings {
        body["embeddings"] =
            serde_json::Value::String(encode_embedding_shard(&embeddings[range.clone()]));
    }
    Ok(body)
}

/// Upload all planned shards of `batch` with at most `workers` requests in
/// flight, reporting one progress event per terminal shard outcome.
///
/// Returns the outcome tally. `completed` is false when the call aborted on
/// an organization quota condition; partial permanent failures still count
/// as a completed call and are only logged. Raises on local validation
/// failures, a held project lock, service overload, or transport failure.
pub async fn upload_shards(
    transport: Arc<dyn Transport>,
    batch: Arc<UploadBatch>,
    plan: &[Range<usize>],
    endpoint: UploadEndpoint,
    modality: Modality,
    workers: usize,
    progress: &dyn UploadProgressReporter,
) -> Result<UploadReport> {
    let mut report = UploadReport {
        completed: true,
        ..UploadReport::default()
    };
    if plan.is_empty() {
        return Ok(report);
    }

    let path = endpoint.path(modality);
    let shard_size = plan[0].len();
    let shards_total = plan.len() as u64;
    let mut shards_done = 0u64;

    let mut pending: VecDeque<Range<usize>> = plan.iter().cloned().collect();
    let mut in_flight: JoinSet<(Range<usize>, Result<ApiResponse>)> = JoinSet::new();
    // Set on the first fatal condition; submissions stop, in-flight work
    // drains, and remaining completions are discarded.
    let mut fatal: Option<AtlasError> = None;
    let mut aborted = false;

    loop {
        while !aborted && in_flight.len() < workers.max(1) {
            let Some(range) = pending.pop_front() else {
                break;
            };
            let body = match shard_body(&batch, &range) {
                Ok(body) => body,
                Err(e) => {
                    fatal = Some(e);
                    aborted = true;
                    break;
                }
            };
            let transport = Arc::clone(&transport);
            let path = path.clone();
            in_flight.spawn(async move {
                let response = transport.post_json(&path, &body).await;
                (range, response)
            });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        let (range, response) = match joined {
            Ok(completed) => completed,
            Err(e) => {
                if fatal.is_none() {
                    fatal = Some(AtlasError::TaskFailed(e.to_string()));
                }
                aborted = true;
                continue;
            }
        };
        if aborted {
            // Draining after a fatal condition; discard the result.
            continue;
        }

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                fatal = Some(e);
                aborted = true;
                continue;
            }
        };

        match classify(&response) {
            ShardClass::Succeeded | ShardClass::IdConflict => {
                report.succeeded += range.len();
                shards_done += 1;
                progress.report(UploadProgressEvent {
                    shards_done,
                    shards_total,
                });
            }
            ShardClass::QuotaExceeded => {
                error!("shard upload failed: {}", response.detail());
                report.completed = false;
                aborted = true;
            }
            ShardClass::LockHeld => {
                fatal = Some(AtlasError::LockHeld);
                aborted = true;
            }
            ShardClass::PayloadTooLarge => {
                error!("shard upload failed: the metadata payload is too large");
                report.failed += range.len();
                shards_done += 1;
                progress.report(UploadProgressEvent {
                    shards_done,
                    shards_total,
                });
            }
            ShardClass::Transient => {
                report.transient_errors += range.len();
                debug!(
                    "connection failed for records {}..{}, retrying",
                    range.start, range.end
                );
                let classified = report.succeeded + report.failed + report.transient_errors;
                let fraction = report.transient_errors as f64 / classified as f64;
                if fraction > OVERLOAD_FRACTION
                    && report.transient_errors > shard_size * OVERLOAD_SHARD_MULTIPLIER
                {
                    fatal = Some(AtlasError::ServiceOverloaded);
                    aborted = true;
                } else {
                    pending.push_back(range);
                }
            }
            ShardClass::Permanent => {
                error!("shard upload failed: {}", response.detail());
                report.failed += range.len();
                shards_done += 1;
                progress.report(UploadProgressEvent {
                    shards_done,
                    shards_total,
                });
            }
        }

        if in_flight.is_empty() && (aborted || pending.is_empty()) {
            break;
        }
    }

    if let Some(err) = fatal {
        return Err(err);
    }

    if report.failed > 0 {
        warn!("failed to upload {} datums", report.failed);
    }
    Ok(report)
}
