use reqwest::Url;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::SessionId;
use crate::storage::KeyValueStore;

pub const SESSION_PARAM: &str = "session_id";

/// Determines the active session and carries it across page navigations.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn KeyValueStore>,
    key: String,
    sibling_pages: Vec<String>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &PipelineConfig) -> Self {
        Self {
            store,
            key: config.keys.session_id.clone(),
            sibling_pages: config.sibling_pages.clone(),
        }
    }

    /// The `session_id` query parameter wins over the persisted id. A query id is
    /// persisted so later pages without the parameter resolve the same session.
    pub async fn resolve(&self, location: &Url) -> Option<SessionId> {
        if let Some(session_id) = query_session_id(location) {
            info!("Using session ID from query: {}", session_id);
            if let Err(e) = self.persist(&session_id).await {
                warn!("Failed to persist session ID {}: {}", session_id, e);
            }
            return Some(session_id);
        }

        match self.store.get(&self.key).await {
            Ok(stored) => {
                let session_id = stored.as_deref().and_then(SessionId::parse);
                if let Some(id) = &session_id {
                    info!("Using persisted session ID: {}", id);
                }
                session_id
            }
            Err(e) => {
                warn!("Failed to read persisted session ID: {}", e);
                None
            }
        }
    }

    /// Replace the persisted session id. There is only ever one.
    pub async fn persist(&self, session_id: &SessionId) -> Result<()> {
        self.store.set(&self.key, session_id.to_string()).await
    }

    /// Resolve and rewrite `links` in one step, as a page does on load.
    pub async fn resolve_and_propagate(
        &self,
        location: &Url,
        links: &mut [String],
    ) -> Option<SessionId> {
        let session_id = self.resolve(location).await?;
        self.propagate(location, &session_id, links);
        Some(session_id)
    }

    /// Add the session id to every same-origin link that targets a sibling page.
    /// Returns how many links were rewritten.
    pub fn propagate(&self, location: &Url, session_id: &SessionId, links: &mut [String]) -> usize {
        let mut rewritten = 0;
        for href in links.iter_mut() {
            let Ok(mut target) = location.join(href) else {
                continue;
            };
            if !same_origin(location, &target) || !self.is_sibling(&target) {
                continue;
            }
            set_session_param(&mut target, session_id);
            *href = target.to_string();
            rewritten += 1;
        }
        rewritten
    }

    fn is_sibling(&self, target: &Url) -> bool {
        target
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .is_some_and(|page| self.sibling_pages.iter().any(|sibling| sibling == page))
    }
}

fn query_session_id(location: &Url) -> Option<SessionId> {
    location
        .query_pairs()
        .find(|(name, _)| name == SESSION_PARAM)
        .and_then(|(_, value)| SessionId::parse(&value))
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

fn set_session_param(target: &mut Url, session_id: &SessionId) {
    let retained: Vec<(String, String)> = target
        .query_pairs()
        .filter(|(name, _)| name != SESSION_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    target
        .query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(SESSION_PARAM, session_id.as_str());
}
