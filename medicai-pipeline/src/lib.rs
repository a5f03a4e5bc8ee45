pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod markup;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod page;
pub mod session;
pub mod storage;
pub mod theme;
pub mod upload;

// Re-export commonly used types
pub use api::{ApiClient, RequestOptions};
pub use cache::ReadThroughCache;
pub use config::{PipelineConfig, StorageKeys};
pub use error::{ApiError, PipelineError, StorageError, UploadError};
pub use markup::{DiagnosisCard, format_text, render_diagnoses, render_summary};
pub use models::{
    ConfidenceLevel, DiagnosisEntry, NormalizedPayload, ResourceKind, SessionId, SoapField,
    SoapSummary,
};
pub use normalize::{normalize, normalize_diagnosis, normalize_summary};
pub use notify::{Notification, NotificationKind, PendingNotifications};
pub use page::{PageOutcome, PageView, PayloadSource, ResultPage};
pub use session::SessionResolver;
pub use storage::{FileStore, InMemoryStore, KeyValueStore};
pub use theme::Theme;
pub use upload::{
    AbortHandle, SelectedFile, SelectedFileSet, UploadOrchestrator, UploadOutcome, UploadProgress,
};

pub use reqwest::Url;

use std::sync::Arc;

/// Everything one page needs, wired from a single configuration.
#[derive(Clone)]
pub struct Pipeline {
    pub config: PipelineConfig,
    pub api: ApiClient,
    pub persistent: Arc<dyn KeyValueStore>,
    pub transient: Arc<dyn KeyValueStore>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        api: ApiClient,
        persistent: Arc<dyn KeyValueStore>,
        transient: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            api,
            persistent,
            transient,
        }
    }

    /// Build the API client from `config` and open its persistent store on disk.
    pub async fn open(config: PipelineConfig) -> Result<Self, PipelineError> {
        let api = ApiClient::from_config(&config)?;
        let persistent: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::open(&config.storage_path).await?);
        let transient: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        Ok(Self::new(config, api, persistent, transient))
    }

    pub fn sessions(&self) -> SessionResolver {
        SessionResolver::new(self.persistent.clone(), &self.config)
    }

    pub fn cache(&self) -> ReadThroughCache {
        ReadThroughCache::new(self.persistent.clone(), self.config.keys.clone())
    }

    pub fn pending_notifications(&self) -> PendingNotifications {
        PendingNotifications::new(self.transient.clone(), self.config.keys.notification.clone())
    }

    pub fn result_page(&self, kind: ResourceKind) -> ResultPage {
        ResultPage::new(
            kind,
            self.api.clone(),
            self.cache(),
            self.sessions(),
            self.pending_notifications(),
        )
    }

    pub fn uploader(&self) -> UploadOrchestrator {
        UploadOrchestrator::new(self.api.clone(), self.sessions())
    }

    pub async fn theme(&self) -> Option<Theme> {
        crate::theme::load_theme(self.persistent.as_ref(), &self.config.keys.theme)
            .await
            .ok()
            .flatten()
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), StorageError> {
        crate::theme::save_theme(self.persistent.as_ref(), &self.config.keys.theme, theme).await
    }
}
