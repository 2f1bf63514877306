use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use shelfbot_core::context::{ContextState, ConversationContext};
use shelfbot_core::errors::ApplicationError;
use shelfbot_core::resolution::{ResolutionOutcome, ResolutionTrace, Resolver};

use crate::catalog::CatalogHandle;
use crate::session::{SessionId, SessionStore};

/// Everything the reply layer gets back for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub session_id: SessionId,
    pub query: String,
    #[serde(flatten)]
    pub outcome: ResolutionOutcome,
    pub context: ConversationContext,
    pub degraded: bool,
    pub catalog_fingerprint: String,
    pub catalog_built_at: DateTime<Utc>,
    pub trace: ResolutionTrace,
}

/// Session-level entry point: load context, resolve, store context.
///
/// Turns of one session run one at a time in arrival order; different
/// sessions never wait on each other.
pub struct ResolutionService<S> {
    resolver: Resolver,
    catalog: Arc<CatalogHandle>,
    sessions: S,
    session_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl<S> ResolutionService<S>
where
    S: SessionStore,
{
    pub fn new(resolver: Resolver, catalog: Arc<CatalogHandle>, sessions: S) -> Self {
        Self { resolver, catalog, sessions, session_locks: Mutex::new(HashMap::new()) }
    }

    pub fn catalog(&self) -> &Arc<CatalogHandle> {
        &self.catalog
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub async fn resolve(
        &self,
        session_id: &SessionId,
        raw_query: &str,
    ) -> Result<ResolutionReport, ApplicationError> {
        let lock = self.session_lock(session_id).await;
        let turn = lock.lock().await;
        let report = self.resolve_turn(session_id, raw_query).await;
        self.release_session_lock(session_id, &lock).await;
        drop(turn);
        report
    }

    async fn resolve_turn(
        &self,
        session_id: &SessionId,
        raw_query: &str,
    ) -> Result<ResolutionReport, ApplicationError> {
        let context = self.sessions.load(session_id).await?.unwrap_or_default();
        let index = self.catalog.snapshot();
        let resolution = self.resolver.resolve(raw_query, &context, &index);

        let mut next = resolution.context;
        next.updated_at = Some(Utc::now());
        self.sessions.save(session_id, next.clone()).await?;

        let degraded = self.catalog.is_degraded();
        info!(
            event_name = "resolution.completed",
            session_id = %session_id,
            outcome = resolution.outcome.label(),
            candidates = resolution.outcome.products().len(),
            anchored = matches!(next.state, ContextState::Anchored { .. }),
            carryover = ?resolution.trace.carryover,
            turn = next.turn,
            degraded,
            "query resolved"
        );

        Ok(ResolutionReport {
            session_id: session_id.clone(),
            query: raw_query.to_string(),
            outcome: resolution.outcome,
            context: next,
            degraded,
            catalog_fingerprint: index.fingerprint().to_string(),
            catalog_built_at: index.built_at(),
            trace: resolution.trace,
        })
    }

    /// Forget a session's context. Later turns start from an empty context.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<(), ApplicationError> {
        let lock = self.session_lock(session_id).await;
        let turn = lock.lock().await;
        let removed = self.sessions.remove(session_id).await;
        self.release_session_lock(session_id, &lock).await;
        drop(turn);

        removed?;
        info!(event_name = "session.ended", session_id = %session_id, "session context removed");
        Ok(())
    }

    async fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        Arc::clone(locks.entry(session_id.clone()).or_default())
    }

    /// Drop the session's mutex from the map once no other turn holds or
    /// waits on it. Must be called while the caller still owns the turn guard.
    ///
    /// Clones are only handed out under the map lock, so a strong count of two
    /// (the map and the caller) means nobody else can be queued behind it.
    async fn release_session_lock(&self, session_id: &SessionId, lock: &Arc<Mutex<()>>) {
        let mut locks = self.session_locks.lock().await;
        let idle = locks
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(session_id);
        }
    }
}
