#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;

use atlas_client::error::Result;
use atlas_client::models::Record;
use atlas_client::progress::{UploadProgressEvent, UploadProgressReporter};
use atlas_client::transport::{ApiResponse, Transport};

type Responder = Box<dyn Fn(&str, Option<&serde_json::Value>) -> Result<ApiResponse> + Send + Sync>;

/// A scripted transport: a closure decides the response for each request,
/// and every request is recorded for later assertions.
pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<(String, Option<serde_json::Value>)>>,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&str, Option<&serde_json::Value>) -> Result<ApiResponse>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of all POST requests matching a prefix.
    pub fn posts_to(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, body)| body.is_some() && path.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), None));
        (self.responder)(path, None)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), Some(body.clone())));
        (self.responder)(path, Some(body))
    }
}

/// Progress reporter that collects events for assertions.
#[derive(Default)]
pub struct CollectingReporter {
    pub events: Mutex<Vec<UploadProgressEvent>>,
}

impl CollectingReporter {
    pub fn shards_done_sequence(&self) -> Vec<u64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.shards_done)
            .collect()
    }
}

impl UploadProgressReporter for CollectingReporter {
    fn report(&self, event: UploadProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Build `n` flat records with ids "0".."n-1" and a text field.
pub fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            serde_json::json!({
                "id": i.to_string(),
                "text": format!("datum {}", i),
            })
            .as_object()
            .unwrap()
            .clone()
        })
        .collect()
}

/// The id of the first record in an upload body, identifying its shard.
pub fn shard_key(body: &serde_json::Value) -> String {
    body["data"][0]["id"].as_str().unwrap().to_string()
}

pub fn ok_response() -> Result<ApiResponse> {
    Ok(ApiResponse::new(200, "{}"))
}

pub fn status_response(status: u16, body: &str) -> Result<ApiResponse> {
    Ok(ApiResponse::new(status, body))
}

/// Project state JSON in the shape of `GET /v1/project/{id}`.
pub fn project_meta_json(
    id: &str,
    modality: &str,
    locked: bool,
    with_index: bool,
) -> serde_json::Value {
    let indices = if with_index {
        serde_json::json!([
            {"id": "idx-1", "index_name": "main", "projections": [{"id": "pr-1"}]}
        ])
    } else {
        serde_json::json!([])
    };
    serde_json::json!({
        "id": id,
        "project_name": "demo",
        "description": "test project",
        "modality": modality,
        "unique_id_field": "id",
        "project_fields": ["id", "text"],
        "insert_update_delete_lock": locked,
        "total_datums_in_project": 0,
        "atlas_indices": indices,
    })
}
