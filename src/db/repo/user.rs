use crate::db::DbResult;
use crate::models::types::UserId;
use crate::models::user::UserRecord;
use chrono::{DateTime, Utc};

/// Persistence contract for user and security records.
///
/// "Not found" is never an error: lookups answer `None` and deletes answer `false`,
/// and callers branch on that explicitly.
#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> DbResult<Option<UserRecord>>;
    async fn get_by_handle(&self, handle: &str) -> DbResult<Option<UserRecord>>;
    async fn get_by_real_name(&self, real_name: &str) -> DbResult<Option<UserRecord>>;
    /// All records ordered by id
    async fn all(&self) -> DbResult<Vec<UserRecord>>;
    /// Records whose handle or real name match a `*`/`?` pattern, ordered by id.
    /// A pattern without wildcards matches as a prefix.
    async fn by_wildcard(&self, pattern: &str) -> DbResult<Vec<UserRecord>>;
    /// Stores a new record and returns its index. The id on the passed record is ignored.
    async fn insert(&self, user: UserRecord) -> DbResult<UserId>;
    /// Overwrites an existing record. Returns false when there is no such record.
    async fn update(&self, user: &UserRecord) -> DbResult<bool>;
    async fn delete(&self, id: UserId) -> DbResult<bool>;
    /// Records a logon attempt on the stored record: a failure bumps the hack
    /// counter, a success clears it and stamps `at`. Leaves every other field as
    /// stored and returns the updated record, `None` when it is gone.
    async fn record_logon(&self, id: UserId, success: bool, at: DateTime<Utc>) -> DbResult<Option<UserRecord>>;
}
