//! Upload progress reporting.
//!
//! Reports observable progress while shards are uploaded so users see how
//! much of a batch has reached Atlas. The coordinator invokes the reporter
//! exactly once per terminal shard outcome (success or permanent failure);
//! retried shards only count when they eventually resolve. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an upload call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadProgressEvent {
    /// Shards that reached a terminal outcome so far.
    pub shards_done: u64,
    /// Total shards planned for this call.
    pub shards_total: u64,
}

/// Reports upload progress. Implementations write to stderr (human or JSON)
/// or collect events for inspection.
pub trait UploadProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the upload coordinator.
    fn report(&self, event: UploadProgressEvent);
}

/// Human-friendly progress on stderr: "upload  3 / 12 shards".
pub struct StderrProgress;

impl UploadProgressReporter for StderrProgress {
    fn report(&self, event: UploadProgressEvent) {
        let line = format!(
            "upload  {} / {} shards\n",
            format_number(event.shards_done),
            format_number(event.shards_total)
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl UploadProgressReporter for JsonProgress {
    fn report(&self, event: UploadProgressEvent) {
        let obj = serde_json::json!({
            "event": "progress",
            "phase": "uploading",
            "shards_done": event.shards_done,
            "shards_total": event.shards_total,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl UploadProgressReporter for NoProgress {
    fn report(&self, _event: UploadProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode for upload calls: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. The project facade passes it into
    /// the upload coordinator.
    pub fn reporter(&self) -> Box<dyn UploadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
