use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_STORAGE_PATH: &str = ".medicai/storage.json";

/// Storage key names shared by every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub session_id: String,
    pub diagnosis: String,
    pub summary: String,
    pub theme: String,
    pub notification: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            session_id: "medicai_session_id".to_string(),
            diagnosis: "medicai_diagnosis".to_string(),
            summary: "medicai_summary".to_string(),
            theme: "theme".to_string(),
            notification: "notification".to_string(),
        }
    }
}

/// Pipeline configuration.
///
/// Defaults match a local development backend. `from_env` applies
/// `MEDICAI_API_BASE_URL`, `MEDICAI_STORAGE_PATH` and `MEDICAI_REQUEST_TIMEOUT_SECS`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_base_url: String,
    pub storage_path: PathBuf,
    /// Pages whose links carry the session id.
    pub sibling_pages: Vec<String>,
    pub keys: StorageKeys,
    /// No timeout unless set.
    pub request_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            sibling_pages: vec![
                "upload.html".to_string(),
                "summary.html".to_string(),
                "diagnosis.html".to_string(),
            ],
            keys: StorageKeys::default(),
            request_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("MEDICAI_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }
        if let Some(path) = lookup("MEDICAI_STORAGE_PATH").filter(|v| !v.trim().is_empty()) {
            config.storage_path = PathBuf::from(path);
        }
        config.request_timeout = lookup("MEDICAI_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        config
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }
}
