//! Storage traits consumed by the submission engine.
//!
//! These async traits are implemented by `masterytrace-store`. Both expose
//! their read-modify-write as a single call taking the update closure, so an
//! implementation can serialize writers per key (a row lock, a transaction,
//! or a mutex held across the closure) and two concurrent submissions for
//! the same key never lose an update.

use async_trait::async_trait;
use uuid::Uuid;

use crate::attempt::Attempt;
use crate::error::AttemptError;
use crate::model::MasteryRecord;

/// Computes the next mastery record from the stored one, if any.
pub type MasteryUpdateFn<'a> =
    Box<dyn FnOnce(Option<&MasteryRecord>) -> MasteryRecord + Send + 'a>;

/// Mutates an attempt in place; an error leaves the stored attempt unchanged.
pub type AttemptEditFn<'a> = Box<dyn FnOnce(&mut Attempt) -> Result<(), AttemptError> + Send + 'a>;

// ---------------------------------------------------------------------------
// Mastery storage
// ---------------------------------------------------------------------------

/// Keyed storage of mastery records, unique on (user, skill).
#[async_trait]
pub trait MasteryStore: Send + Sync {
    /// Fetch the record for (user, skill).
    async fn get(&self, user_id: &str, skill_id: &str) -> anyhow::Result<Option<MasteryRecord>>;

    /// Atomically read, update, and upsert the record for (user, skill).
    /// Returns the stored record.
    async fn upsert_with(
        &self,
        user_id: &str,
        skill_id: &str,
        update: MasteryUpdateFn<'_>,
    ) -> anyhow::Result<MasteryRecord>;

    /// All records of one user, ordered by skill id.
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<MasteryRecord>>;
}

// ---------------------------------------------------------------------------
// Attempt storage
// ---------------------------------------------------------------------------

/// Storage of quiz attempts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Persist a newly started attempt.
    async fn insert(&self, attempt: Attempt) -> anyhow::Result<()>;

    /// Fetch an attempt by id.
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Attempt>>;

    /// Atomically apply `edit` to the attempt and return the result.
    ///
    /// Fails with [`AttemptError::AttemptNotFound`] if no such attempt
    /// exists, or with the error returned by `edit`.
    async fn modify(&self, id: Uuid, edit: AttemptEditFn<'_>) -> anyhow::Result<Attempt>;
}
