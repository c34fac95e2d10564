//! In-memory mastery and attempt storage.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use masterytrace_core::attempt::Attempt;
use masterytrace_core::error::AttemptError;
use masterytrace_core::model::MasteryRecord;
use masterytrace_core::traits::{AttemptEditFn, AttemptStore, MasteryStore, MasteryUpdateFn};

use crate::snapshot::Snapshot;

type MasteryKey = (String, String);

/// Thread-safe in-memory store.
///
/// Each map is guarded by one async mutex that is held while an update
/// closure runs, so read-modify-write cycles on the same key are serialized.
#[derive(Default)]
pub struct MemoryStore {
    mastery: Mutex<HashMap<MasteryKey, MasteryRecord>>,
    attempts: Mutex<HashMap<Uuid, Attempt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded with the contents of a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mastery = snapshot
            .mastery
            .into_iter()
            .map(|r| ((r.user_id.clone(), r.skill_id.clone()), r))
            .collect();
        let attempts = snapshot.attempts.into_iter().map(|a| (a.id, a)).collect();
        Self {
            mastery: Mutex::new(mastery),
            attempts: Mutex::new(attempts),
        }
    }

    /// Copy the current contents into a snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        let mut mastery: Vec<MasteryRecord> =
            self.mastery.lock().await.values().cloned().collect();
        mastery.sort_by(|a, b| (&a.user_id, &a.skill_id).cmp(&(&b.user_id, &b.skill_id)));

        let mut attempts: Vec<Attempt> = self.attempts.lock().await.values().cloned().collect();
        attempts.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));

        Snapshot { mastery, attempts }
    }
}

#[async_trait]
impl MasteryStore for MemoryStore {
    async fn get(&self, user_id: &str, skill_id: &str) -> Result<Option<MasteryRecord>> {
        let map = self.mastery.lock().await;
        Ok(map
            .get(&(user_id.to_string(), skill_id.to_string()))
            .cloned())
    }

    async fn upsert_with(
        &self,
        user_id: &str,
        skill_id: &str,
        update: MasteryUpdateFn<'_>,
    ) -> Result<MasteryRecord> {
        let key = (user_id.to_string(), skill_id.to_string());
        let mut map = self.mastery.lock().await;
        let next = update(map.get(&key));
        map.insert(key, next.clone());
        Ok(next)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<MasteryRecord>> {
        let map = self.mastery.lock().await;
        let mut records: Vec<MasteryRecord> = map
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));
        Ok(records)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert(&self, attempt: Attempt) -> Result<()> {
        let mut map = self.attempts.lock().await;
        if map.contains_key(&attempt.id) {
            anyhow::bail!("attempt {} already exists", attempt.id);
        }
        map.insert(attempt.id, attempt);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Attempt>> {
        Ok(self.attempts.lock().await.get(&id).cloned())
    }

    async fn modify(&self, id: Uuid, edit: AttemptEditFn<'_>) -> Result<Attempt> {
        let mut map = self.attempts.lock().await;
        let stored = map.get_mut(&id).ok_or(AttemptError::AttemptNotFound(id))?;

        // Edit a copy so a rejected edit leaves the stored attempt untouched.
        let mut draft = stored.clone();
        edit(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }
}
