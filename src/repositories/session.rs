use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, Result},
    models::{session::SharingSession, watched::WatchedSession},
    traits::KeyValueStore,
};

/// The single owner of the persisted sharing records.
///
/// No other code knows the storage keys. All writes go through one async
/// mutex, so a read-modify-write through [`SessionRepository::update`] never
/// interleaves with a `save` or `clear`.
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
    session_key: String,
    watched_key: String,
    write_lock: Mutex<()>,
}

fn decode<T: DeserializeOwned>(key: &str, json: &str) -> Result<T> {
    sonic_rs::from_str(json)
        .map_err(|e| AppError::Storage(format!("Corrupted record at {}: {}", key, e)))
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    sonic_rs::to_string(value)
        .map_err(|e| AppError::Storage(format!("Record serialization failed: {}", e)))
}

impl SessionRepository {
    /// Creates a new `SessionRepository`.
    ///
    /// # Arguments
    ///
    /// * `store` - The key-value store.
    /// * `prefix` - Key namespace.
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        Self {
            store,
            session_key: format!("{}:sharing_session", prefix),
            watched_key: format!("{}:watched_sessions", prefix),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Option<SharingSession>> {
        match self.store.get(&self.session_key).await? {
            Some(json) => decode(&self.session_key, &json).map(Some),
            None => Ok(None),
        }
    }

    async fn persist(&self, session: &SharingSession) -> Result<()> {
        self.store.set(&self.session_key, &encode(session)?).await
    }

    /// Loads the local sharing session, if any.
    pub async fn get(&self) -> Result<Option<SharingSession>> {
        self.load().await
    }

    /// Replaces the local sharing session.
    pub async fn save(&self, session: &SharingSession) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(session).await
    }

    /// Removes the local sharing session. Clearing nothing succeeds.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(&self.session_key).await
    }

    /// Read-modify-write of the local session.
    ///
    /// # Arguments
    ///
    /// * `apply` - Mutates the freshly loaded session. If it returns an
    ///   error nothing is written.
    ///
    /// # Returns
    ///
    /// `None` if there is no session, otherwise what `apply` returned.
    pub async fn update<T, F>(&self, apply: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut SharingSession) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;

        let Some(mut session) = self.load().await? else {
            return Ok(None);
        };

        let output = apply(&mut session)?;
        self.persist(&session).await?;
        Ok(Some(output))
    }

    /// Removes the local session only if `predicate` holds for it.
    ///
    /// # Returns
    ///
    /// Whether a session was removed.
    pub async fn clear_if<F>(&self, predicate: F) -> Result<bool>
    where
        F: FnOnce(&SharingSession) -> bool,
    {
        let _guard = self.write_lock.lock().await;

        match self.load().await? {
            Some(session) if predicate(&session) => {
                self.store.remove(&self.session_key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Loads the local session and the watched list in one round trip.
    pub async fn snapshot(&self) -> Result<(Option<SharingSession>, Vec<WatchedSession>)> {
        let values = self
            .store
            .multi_get(&[self.session_key.as_str(), self.watched_key.as_str()])
            .await?;

        let mut values = values.into_iter();
        let session = match values.next().flatten() {
            Some(json) => Some(decode(&self.session_key, &json)?),
            None => None,
        };
        let watched = match values.next().flatten() {
            Some(json) => decode(&self.watched_key, &json)?,
            None => Vec::new(),
        };

        Ok((session, watched))
    }

    /// Lists the sessions this device watches.
    pub async fn list_watched(&self) -> Result<Vec<WatchedSession>> {
        match self.store.get(&self.watched_key).await? {
            Some(json) => decode(&self.watched_key, &json),
            None => Ok(Vec::new()),
        }
    }

    /// Inserts or refreshes a watched session, keyed by share code.
    ///
    /// An existing entry keeps its `added_at` and, when the update carries
    /// none, its label.
    pub async fn save_watched(&self, watched: WatchedSession) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.list_watched().await?;

        match list.iter_mut().find(|w| w.share_code == watched.share_code) {
            Some(existing) => {
                existing.password = watched.password;
                existing.last_seen_at = watched.last_seen_at.or(existing.last_seen_at);
                if watched.label.is_some() {
                    existing.label = watched.label;
                }
            }
            None => list.push(watched),
        }

        self.store.set(&self.watched_key, &encode(&list)?).await
    }

    /// Stops watching a share code.
    ///
    /// # Returns
    ///
    /// Whether an entry was removed.
    pub async fn remove_watched(&self, share_code: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.list_watched().await?;
        let before = list.len();
        list.retain(|w| w.share_code != share_code);

        if list.len() == before {
            return Ok(false);
        }

        self.store.set(&self.watched_key, &encode(&list)?).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::error::ErrorKind;
    use crate::models::session::SharingConfig;

    fn repo() -> (SessionRepository, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (SessionRepository::new(store.clone(), "test"), store)
    }

    fn session() -> SharingSession {
        SharingSession::from_config(
            &SharingConfig {
                share_code: "my-code".into(),
                password: "secret1".into(),
                update_interval: 60,
                auto_stop_minutes: None,
            },
            1_000,
        )
    }

    fn watched(code: &str, label: Option<&str>) -> WatchedSession {
        WatchedSession {
            share_code: code.into(),
            password: "secret1".into(),
            label: label.map(str::to_string),
            added_at: 1,
            last_seen_at: None,
        }
    }

    #[tokio::test]
    async fn save_get_clear() {
        let (repo, _) = repo();
        assert_eq!(repo.get().await.unwrap(), None);
        repo.save(&session()).await.unwrap();
        assert_eq!(repo.get().await.unwrap(), Some(session()));
        repo.clear().await.unwrap();
        repo.clear().await.unwrap();
        assert_eq!(repo.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_persists_changes() {
        let (repo, _) = repo();
        repo.save(&session()).await.unwrap();
        let out = repo
            .update(|s| {
                s.last_update_time = Some(5_000);
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(out, Some(7));
        assert_eq!(repo.get().await.unwrap().unwrap().last_update_time, Some(5_000));
    }

    #[tokio::test]
    async fn update_without_session_is_none() {
        let (repo, _) = repo();
        let out = repo.update(|_| Ok(())).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let (repo, _) = repo();
        repo.save(&session()).await.unwrap();
        let err = repo
            .update(|s| -> Result<()> {
                s.active = false;
                Err(AppError::NoDeadline)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDeadline);
        assert!(repo.get().await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn clear_if_respects_predicate() {
        let (repo, _) = repo();
        repo.save(&session()).await.unwrap();
        assert!(!repo.clear_if(|s| s.start_time == 2).await.unwrap());
        assert!(repo.get().await.unwrap().is_some());
        assert!(repo.clear_if(|s| s.start_time == 1_000).await.unwrap());
        assert!(repo.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupted_record_is_storage_error() {
        let (repo, store) = repo();
        store.insert_raw("test:sharing_session", "{not json");
        assert_eq!(repo.get().await.unwrap_err().kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let (repo, store) = repo();
        store.set_fail(true);
        assert_eq!(repo.save(&session()).await.unwrap_err().kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn watched_upsert_keeps_added_at_and_label() {
        let (repo, _) = repo();
        repo.save_watched(watched("friend-1", Some("Ana"))).await.unwrap();
        let mut refresh = watched("friend-1", None);
        refresh.added_at = 99;
        refresh.last_seen_at = Some(50);
        repo.save_watched(refresh).await.unwrap();

        let list = repo.list_watched().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].added_at, 1);
        assert_eq!(list[0].label.as_deref(), Some("Ana"));
        assert_eq!(list[0].last_seen_at, Some(50));
    }

    #[tokio::test]
    async fn remove_watched_reports_presence() {
        let (repo, _) = repo();
        repo.save_watched(watched("friend-1", None)).await.unwrap();
        repo.save_watched(watched("friend-2", None)).await.unwrap();
        assert!(repo.remove_watched("friend-1").await.unwrap());
        assert!(!repo.remove_watched("friend-1").await.unwrap());
        assert_eq!(repo.list_watched().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_reads_both_records() {
        let (repo, _) = repo();
        repo.save(&session()).await.unwrap();
        repo.save_watched(watched("friend-1", None)).await.unwrap();
        let (local, list) = repo.snapshot().await.unwrap();
        assert_eq!(local, Some(session()));
        assert_eq!(list.len(), 1);
    }
}
