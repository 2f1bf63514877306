use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use shelfbot_core::context::ConversationContext;
use shelfbot_core::errors::ApplicationError;

const MAX_SESSION_ID_CHARS: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, ApplicationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ApplicationError::InvalidRequest(
                "session id must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_SESSION_ID_CHARS {
            return Err(ApplicationError::InvalidRequest(format!(
                "session id must be at most {MAX_SESSION_ID_CHARS} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("stored context for session `{session_id}` could not be decoded: {message}")]
    Decode { session_id: String, message: String },
}

impl From<SessionStoreError> for ApplicationError {
    fn from(error: SessionStoreError) -> Self {
        ApplicationError::Session(error.to_string())
    }
}

/// Where conversation contexts live between turns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<ConversationContext>, SessionStoreError>;
    async fn save(&self, id: &SessionId, context: ConversationContext)
        -> Result<(), SessionStoreError>;
    async fn remove(&self, id: &SessionId) -> Result<(), SessionStoreError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    contexts: RwLock<HashMap<SessionId, ConversationContext>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<ConversationContext>, SessionStoreError> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(id).cloned())
    }

    async fn save(
        &self,
        id: &SessionId,
        context: ConversationContext,
    ) -> Result<(), SessionStoreError> {
        let mut contexts = self.contexts.write().await;
        contexts.insert(id.clone(), context);
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        let mut contexts = self.contexts.write().await;
        contexts.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shelfbot_core::context::ConversationContext;
    use shelfbot_core::errors::ApplicationError;

    use super::{InMemorySessionStore, SessionId, SessionStore, SessionStoreError};

    #[test]
    fn session_id_rejects_blank_and_oversized_values() {
        assert!(matches!(SessionId::parse("  "), Err(ApplicationError::InvalidRequest(_))));
        assert!(matches!(
            SessionId::parse(&"x".repeat(129)),
            Err(ApplicationError::InvalidRequest(_))
        ));
        assert_eq!(SessionId::parse(" chat-42 ").expect("valid id").as_str(), "chat-42");
    }

    #[test]
    fn store_errors_map_to_session_application_error() {
        let error =
            ApplicationError::from(SessionStoreError::Unavailable("redis down".to_string()));
        assert!(matches!(error, ApplicationError::Session(_)));
    }

    #[tokio::test]
    async fn in_memory_store_round_trip() {
        let store = InMemorySessionStore::default();
        let id = SessionId::parse("chat-1").expect("valid id");
        let context = ConversationContext { turn: 3, ..ConversationContext::default() };

        assert_eq!(store.load(&id).await.expect("load"), None);
        store.save(&id, context.clone()).await.expect("save");
        assert_eq!(store.load(&id).await.expect("load"), Some(context));

        store.remove(&id).await.expect("remove");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemorySessionStore::default();
        let first = SessionId::parse("a").expect("valid id");
        let second = SessionId::parse("b").expect("valid id");

        store
            .save(&first, ConversationContext { turn: 1, ..ConversationContext::default() })
            .await
            .expect("save");

        assert_eq!(store.load(&second).await.expect("load"), None);
        assert_eq!(store.len().await, 1);
    }
}
