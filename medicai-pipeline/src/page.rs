//! Load flow shared by the result pages:
//! session → cache → fetch → normalize → cache → render.

use reqwest::Url;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::cache::ReadThroughCache;
use crate::models::{NormalizedPayload, ResourceKind, SessionId};
use crate::normalize::normalize;
use crate::notify::{Notification, PendingNotifications};
use crate::session::SessionResolver;

/// Presentation collaborator for a result page.
pub trait PageView {
    /// No session, or the fetch failed.
    fn show_no_data(&mut self);
    fn show_loading(&mut self);
    fn render(&mut self, payload: &NormalizedPayload);
    fn notify(&mut self, notification: &Notification);
}

/// Where the rendered payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    NoSession,
    Rendered {
        session_id: SessionId,
        source: PayloadSource,
    },
    Failed {
        session_id: SessionId,
        message: String,
    },
}

/// Controller for the diagnosis or the summary page.
#[derive(Clone)]
pub struct ResultPage {
    kind: ResourceKind,
    api: ApiClient,
    cache: ReadThroughCache,
    sessions: SessionResolver,
    pending: PendingNotifications,
}

impl ResultPage {
    pub fn new(
        kind: ResourceKind,
        api: ApiClient,
        cache: ReadThroughCache,
        sessions: SessionResolver,
        pending: PendingNotifications,
    ) -> Self {
        Self {
            kind,
            api,
            cache,
            sessions,
            pending,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Run the page's load handler. `links` are the page's outgoing hrefs and are
    /// rewritten in place to carry the session id.
    pub async fn load(
        &self,
        location: &Url,
        links: &mut [String],
        view: &mut dyn PageView,
    ) -> PageOutcome {
        if let Some(notification) = self.pending.take().await {
            view.notify(&notification);
        }

        let Some(session_id) = self.sessions.resolve_and_propagate(location, links).await else {
            info!("No session ID available for {} page", self.kind);
            view.show_no_data();
            return PageOutcome::NoSession;
        };

        if let Some(cached) = self.cache.get(self.kind).await {
            info!("Using cached {} data", self.kind);
            view.render(&cached);
            return PageOutcome::Rendered {
                session_id,
                source: PayloadSource::Cache,
            };
        }

        self.fetch(session_id, view).await
    }

    async fn fetch(&self, session_id: SessionId, view: &mut dyn PageView) -> PageOutcome {
        view.show_loading();

        match self.api.fetch_resource(self.kind, &session_id).await {
            Ok(raw) => {
                let payload = normalize(self.kind, &raw);
                if let Err(e) = self.cache.put(&payload).await {
                    warn!("Failed to cache {} data: {}", self.kind, e);
                }
                view.render(&payload);
                PageOutcome::Rendered {
                    session_id,
                    source: PayloadSource::Network,
                }
            }
            Err(e) => {
                error!("Error fetching {}: {}", self.kind, e);
                let message = e.user_message();
                view.notify(&Notification::error(format!("Error: {}", message)));
                view.show_no_data();
                PageOutcome::Failed {
                    session_id,
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::storage::{InMemoryStore, KeyValueStore};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingView {
        events: Vec<String>,
    }

    impl PageView for RecordingView {
        fn show_no_data(&mut self) {
            self.events.push("no-data".to_string());
        }

        fn show_loading(&mut self) {
            self.events.push("loading".to_string());
        }

        fn render(&mut self, payload: &NormalizedPayload) {
            self.events.push(format!("render:{}", payload.kind()));
        }

        fn notify(&mut self, notification: &Notification) {
            self.events.push(format!("notify:{}", notification.message));
        }
    }

    fn page(store: Arc<InMemoryStore>, transient: Arc<InMemoryStore>) -> ResultPage {
        let config = PipelineConfig::default();
        // Port 9 (discard) is never reached in these tests.
        let api = ApiClient::new("http://127.0.0.1:9/api");
        ResultPage::new(
            ResourceKind::Diagnosis,
            api,
            ReadThroughCache::new(store.clone(), config.keys.clone()),
            SessionResolver::new(store, &config),
            PendingNotifications::new(transient, config.keys.notification.clone()),
        )
    }

    #[tokio::test]
    async fn missing_session_renders_no_data_without_fetch() {
        let page = page(Arc::new(InMemoryStore::new()), Arc::new(InMemoryStore::new()));
        let mut view = RecordingView::default();
        let location = Url::parse("http://localhost/diagnosis.html").unwrap();
        let mut links = vec!["summary.html".to_string()];

        let outcome = page.load(&location, &mut links, &mut view).await;

        assert_eq!(outcome, PageOutcome::NoSession);
        assert_eq!(view.events, vec!["no-data"]);
        assert_eq!(links[0], "summary.html");
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let store = Arc::new(InMemoryStore::new());
        let page = page(store.clone(), Arc::new(InMemoryStore::new()));
        page.cache
            .put(&NormalizedPayload::Diagnosis(Vec::new()))
            .await
            .unwrap();

        let mut view = RecordingView::default();
        let location = Url::parse("http://localhost/diagnosis.html?session_id=s1").unwrap();
        let mut links = vec!["summary.html".to_string()];

        let outcome = page.load(&location, &mut links, &mut view).await;

        assert_eq!(
            outcome,
            PageOutcome::Rendered {
                session_id: SessionId::parse("s1").unwrap(),
                source: PayloadSource::Cache,
            }
        );
        assert_eq!(view.events, vec!["render:diagnosis"]);
        assert_eq!(links[0], "http://localhost/summary.html?session_id=s1");
    }

    #[tokio::test]
    async fn pending_notification_shown_on_load() {
        let transient = Arc::new(InMemoryStore::new());
        transient
            .set(
                "notification",
                r#"{"message":"Welcome back","type":"info"}"#.to_string(),
            )
            .await
            .unwrap();
        let page = page(Arc::new(InMemoryStore::new()), transient.clone());
        let mut view = RecordingView::default();
        let location = Url::parse("http://localhost/diagnosis.html").unwrap();

        page.load(&location, &mut [], &mut view).await;

        assert_eq!(view.events, vec!["notify:Welcome back", "no-data"]);
        assert!(transient.get("notification").await.unwrap().is_none());
    }
}
