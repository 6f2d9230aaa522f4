use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::pipeline::decision::RoundEvaluation;

use super::{Round, Session, SessionError, SessionSummary};

/// Durable session storage. Every operation is scoped to `owner_id`: a session
/// owned by someone else is reported as `NotFound`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, owner_id: &str, role: &str) -> Result<Session, SessionError>;

    /// Newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<SessionSummary>, SessionError>;

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Session, SessionError>;

    async fn add_round(
        &self,
        owner_id: &str,
        id: Uuid,
        evaluation: &RoundEvaluation,
    ) -> Result<Round, SessionError>;

    async fn complete(&self, owner_id: &str, id: Uuid) -> Result<Session, SessionError>;

    fn backend(&self) -> &'static str;
}

/// Process-local store. Sessions are kept in creation order.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<Vec<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_mut<'a>(
    sessions: &'a mut [Session],
    owner_id: &str,
    id: Uuid,
) -> Result<&'a mut Session, SessionError> {
    sessions
        .iter_mut()
        .find(|s| s.id == id && s.owner_id == owner_id)
        .ok_or(SessionError::NotFound(id))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, owner_id: &str, role: &str) -> Result<Session, SessionError> {
        let session = Session::new(owner_id, role);
        self.sessions.lock().await.push(session.clone());
        info!("Created session {} for role {:?}", session.id, role);
        Ok(session)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id)
            .map(Session::summary)
            .collect())
    }

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock().await;
        find_mut(&mut sessions, owner_id, id).map(|s| s.clone())
    }

    async fn add_round(
        &self,
        owner_id: &str,
        id: Uuid,
        evaluation: &RoundEvaluation,
    ) -> Result<Round, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = find_mut(&mut sessions, owner_id, id)?;
        let round = session.add_round(evaluation)?.clone();
        info!("Recorded round {} for session {}", round.round_number, id);
        Ok(round)
    }

    async fn complete(&self, owner_id: &str, id: Uuid) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = find_mut(&mut sessions, owner_id, id)?;
        session.complete()?;
        info!("Completed session {} after {} rounds", id, session.rounds.len());
        Ok(session.clone())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::evaluation;
    use crate::session::SessionStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lifecycle() {
        let store = InMemorySessionStore::new();
        let session = store.create("owner-1", "Backend Engineer").await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);

        let first = store.add_round("owner-1", session.id, &evaluation(70, false)).await.unwrap();
        let second = store.add_round("owner-1", session.id, &evaluation(80, true)).await.unwrap();
        assert_eq!((first.round_number, second.round_number), (1, 2));

        let completed = store.complete("owner-1", session.id).await.unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
        assert_eq!(completed.rounds.len(), 2);

        let err = store
            .add_round("owner-1", session.id, &evaluation(90, false))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert_eq!(store.get("owner-1", session.id).await.unwrap().rounds.len(), 2);
    }

    #[tokio::test]
    async fn test_foreign_and_unknown_sessions_are_not_found() {
        let store = InMemorySessionStore::new();
        let session = store.create("owner-1", "SRE").await.unwrap();

        assert!(matches!(
            store.get("owner-2", session.id).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            store.complete("owner-1", Uuid::new_v4()).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped_and_newest_first() {
        let store = InMemorySessionStore::new();
        let a = store.create("owner-1", "SRE").await.unwrap();
        store.create("owner-2", "SRE").await.unwrap();
        let b = store.create("owner-1", "Data Engineer").await.unwrap();

        let listed = store.list_for_owner("owner-1").await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_numbers() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = store.create("owner-1", "SRE").await.unwrap().id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add_round("owner-1", id, &evaluation(60 + i, false))
                    .await
                    .unwrap()
                    .round_number
            }));
        }
        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort();
        assert_eq!(numbers, (1..=8).collect::<Vec<i32>>());
    }
}
