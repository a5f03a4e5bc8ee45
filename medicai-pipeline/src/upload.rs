//! Multipart upload of the selected documents, with byte-level progress and abort.
//!
//! The orchestrator owns the selection and the in-flight generation, so any number of
//! handlers can share it behind an `Arc`. A second `submit` while one is outstanding
//! is refused rather than queued.

use futures::{Stream, StreamExt};
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::error::UploadError;
use crate::models::{ResourceKind, SessionId};
use crate::notify::Notification;
use crate::session::{SESSION_PARAM, SessionResolver};

pub const UPLOAD_PATH: &str = "upload";
pub const UPLOAD_FIELD: &str = "files[]";
const CHUNK_SIZE: usize = 64 * 1024;
const OCTET_STREAM: &str = "application/octet-stream";

/// A document chosen by the user, held in memory until upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        let content_type = content_type.into();
        Self {
            name: name.into(),
            content_type: if content_type.contains('/') {
                content_type
            } else {
                OCTET_STREAM.to_string()
            },
            data,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = content_type_for(&name);

        Ok(Self::new(name, content_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_content_type(&self.content_type)
    }
}

fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().to_string()
}

/// Preview category of a selected file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Word,
    Text,
    Other,
}

impl FileKind {
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.contains("pdf") {
            FileKind::Pdf
        } else if content_type.contains("image") {
            FileKind::Image
        } else if content_type.contains("word") {
            FileKind::Word
        } else if content_type.contains("text") {
            FileKind::Text
        } else {
            FileKind::Other
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            FileKind::Pdf => "fa-file-pdf",
            FileKind::Image => "fa-file-image",
            FileKind::Word => "fa-file-word",
            FileKind::Text => "fa-file-alt",
            FileKind::Other => "fa-file",
        }
    }
}

/// Ordered selection of files awaiting upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedFileSet {
    files: Vec<SelectedFile>,
}

impl SelectedFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection. An empty selection event is ignored.
    pub fn select(&mut self, files: Vec<SelectedFile>) {
        if !files.is_empty() {
            self.files = files;
        }
    }

    pub fn append(&mut self, file: SelectedFile) {
        self.files.push(file);
    }

    pub fn remove(&mut self, index: usize) -> Option<SelectedFile> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(SelectedFile::size).sum()
    }
}

/// Human-readable size, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub percent: u8,
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

/// Counts bytes as the request body is pulled and reports increasing percentages.
struct ProgressTracker {
    total: u64,
    sent: AtomicU64,
    reported: AtomicU8,
    sender: Option<mpsc::UnboundedSender<UploadProgress>>,
}

impl ProgressTracker {
    fn new(total: u64, sender: Option<mpsc::UnboundedSender<UploadProgress>>) -> Self {
        Self {
            total,
            sent: AtomicU64::new(0),
            reported: AtomicU8::new(0),
            sender,
        }
    }

    fn advance(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::SeqCst) + bytes;
        let Some(sender) = &self.sender else {
            return;
        };
        if self.total == 0 {
            return;
        }

        let percent = ((sent as f64 / self.total as f64) * 100.0).floor().min(100.0) as u8;
        let previous = self.reported.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            let _ = sender.send(UploadProgress {
                percent,
                bytes_sent: sent.min(self.total),
                bytes_total: self.total,
            });
        }
    }

    fn track(
        self: Arc<Self>,
        data: Vec<u8>,
    ) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
        let chunks: Vec<Vec<u8>> = data.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        futures::stream::iter(chunks).map(move |chunk| {
            self.advance(chunk.len() as u64);
            Ok(chunk)
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    session_id: Option<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub session_id: SessionId,
    pub file_count: usize,
    pub notification: Notification,
    /// Result pages carrying the new session id.
    pub result_links: Vec<String>,
}

/// Cancels the in-flight upload of the orchestrator it came from.
#[derive(Clone)]
pub struct AbortHandle {
    signal: Arc<watch::Sender<u64>>,
    active: Arc<AtomicU64>,
}

impl AbortHandle {
    /// No effect when nothing is in flight. An abort that arrives after its upload
    /// finished names a stale generation and is ignored by the next upload.
    pub fn abort(&self) {
        let generation = self.active.load(Ordering::SeqCst);
        if generation != 0 {
            self.signal.send_replace(generation);
        }
    }
}

/// Holds the generation of the upload in flight; `0` means idle.
struct InFlightGuard {
    active: Arc<AtomicU64>,
}

impl InFlightGuard {
    fn acquire(active: &Arc<AtomicU64>, generation: u64) -> Option<Self> {
        active
            .compare_exchange(0, generation, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                active: active.clone(),
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.store(0, Ordering::SeqCst);
    }
}

pub struct UploadOrchestrator {
    api: ApiClient,
    sessions: SessionResolver,
    files: Mutex<SelectedFileSet>,
    active: Arc<AtomicU64>,
    next_generation: AtomicU64,
    abort_signal: Arc<watch::Sender<u64>>,
}

impl UploadOrchestrator {
    pub fn new(api: ApiClient, sessions: SessionResolver) -> Self {
        let (abort_signal, _) = watch::channel(0);
        Self {
            api,
            sessions,
            files: Mutex::new(SelectedFileSet::new()),
            active: Arc::new(AtomicU64::new(0)),
            next_generation: AtomicU64::new(1),
            abort_signal: Arc::new(abort_signal),
        }
    }

    fn with_files<T>(&self, f: impl FnOnce(&mut SelectedFileSet) -> T) -> T {
        let mut files = self
            .files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut files)
    }

    pub fn select(&self, files: Vec<SelectedFile>) {
        self.with_files(|set| set.select(files));
    }

    pub fn append(&self, file: SelectedFile) {
        self.with_files(|set| set.append(file));
    }

    pub fn remove(&self, index: usize) -> Option<SelectedFile> {
        self.with_files(|set| set.remove(index))
    }

    pub fn selection(&self) -> SelectedFileSet {
        self.with_files(|set| set.clone())
    }

    pub fn is_in_flight(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }

    /// Whether the upload trigger should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.is_in_flight() && !self.with_files(|set| set.is_empty())
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            signal: self.abort_signal.clone(),
            active: self.active.clone(),
        }
    }

    /// Upload the current selection. Progress updates, when requested, arrive on
    /// `progress` as non-decreasing percentages.
    pub async fn submit(
        &self,
        progress: Option<mpsc::UnboundedSender<UploadProgress>>,
    ) -> Result<UploadOutcome, UploadError> {
        let selection = self.selection();
        if selection.is_empty() {
            warn!("Upload requested with no files selected");
            return Err(UploadError::NoFiles);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let _guard =
            InFlightGuard::acquire(&self.active, generation).ok_or(UploadError::AlreadyInFlight)?;
        let mut aborted = self.abort_signal.subscribe();

        let file_count = selection.len();
        let total = selection.total_bytes();
        info!("Uploading {} files ({})", file_count, format_file_size(total));

        let tracker = Arc::new(ProgressTracker::new(total, progress));
        let mut form = Form::new();
        for file in selection.files() {
            let body = Body::wrap_stream(tracker.clone().track(file.data.clone()));
            let part = Part::stream_with_length(body, file.size())
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| UploadError::Transport(e.to_string()))?;
            form = form.part(UPLOAD_FIELD, part);
        }

        let url = self.api.url_for(UPLOAD_PATH);
        let exchange = async {
            let response = self.api.http().post(&url).multipart(form).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let abort_requested = async move {
            let _ = aborted.wait_for(|target| *target == generation).await;
        };

        let (status, body) = tokio::select! {
            result = exchange => result.map_err(|e| {
                error!("Network error during file upload: {}", e);
                UploadError::Transport(e.to_string())
            })?,
            _ = abort_requested => {
                warn!("File upload was aborted");
                return Err(UploadError::Aborted);
            }
        };

        if !status.is_success() {
            let message = upload_error_message(status.as_u16(), &body);
            error!("Upload failed with status {}: {}", status, message);
            return Err(UploadError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let session_id = parse_session_id(&body)?;
        self.sessions.persist(&session_id).await?;
        self.with_files(SelectedFileSet::clear);

        info!("Upload complete, session {}", session_id);
        Ok(UploadOutcome {
            result_links: result_links(&session_id),
            notification: Notification::success(format!(
                "{} files uploaded successfully!",
                file_count
            )),
            session_id,
            file_count,
        })
    }
}

fn parse_session_id(body: &str) -> Result<SessionId, UploadError> {
    let response: UploadResponse = serde_json::from_str(body).map_err(|e| {
        error!("Error parsing upload response: {}", e);
        UploadError::ResponseUnreadable(e.to_string())
    })?;
    response
        .session_id
        .as_deref()
        .and_then(SessionId::parse)
        .ok_or_else(|| UploadError::ResponseUnreadable("response has no session_id".to_string()))
}

fn upload_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(data) => data
            .get("error")
            .and_then(serde_json::Value::as_str)
            .filter(|message| !message.is_empty())
            .unwrap_or("Upload failed")
            .to_string(),
        Err(_) => format!("Upload failed with status {}", status),
    }
}

fn result_links(session_id: &SessionId) -> Vec<String> {
    [ResourceKind::Summary, ResourceKind::Diagnosis]
        .iter()
        .map(|kind| {
            format!(
                "{}?{}={}",
                kind.page(),
                SESSION_PARAM,
                urlencoding::encode(session_id.as_str())
            )
        })
        .collect()
}

/// Notification shown when an upload fails.
pub fn failure_notification(error: &UploadError) -> Notification {
    if error.is_warning() {
        Notification::warning(error.to_string())
    } else {
        Notification::error(error.to_string())
    }
}
