use crate::db::DbResult;
use crate::db::error::DbError;
use crate::db::repo::UserRepo;
use crate::models::types::UserId;
use crate::models::user::UserRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::sync::atomic::{AtomicI64, Ordering};

/// Process-local user store. Handles are unique, case-insensitively.
pub struct MemoryUserRepository {
    users: DashMap<UserId, UserRecord>,
    next_id: AtomicI64,
    // Serializes every write with the checks that precede it
    writes: Mutex<()>,
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
            writes: Mutex::new(()),
        }
    }

    fn sorted(&self, mut f: impl FnMut(&UserRecord) -> bool) -> Vec<UserRecord> {
        let mut out: Vec<UserRecord> = self
            .users
            .iter()
            .filter(|e| f(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|u| u.id);
        out
    }

    fn handle_taken(&self, handle: &str, except: Option<UserId>) -> bool {
        self.users
            .iter()
            .any(|e| Some(e.id) != except && e.handle.eq_ignore_ascii_case(handle))
    }
}

/// Compiles a `*`/`?` pattern into an anchored, case-insensitive regex.
pub(crate) fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = pattern.trim();
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    if !pattern.contains(['*', '?']) {
        re.push_str(".*");
    }
    re.push('$');
    RegexBuilder::new(&re).case_insensitive(true).build()
}

#[async_trait]
impl UserRepo for MemoryUserRepository {
    async fn get_by_id(&self, id: UserId) -> DbResult<Option<UserRecord>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn get_by_handle(&self, handle: &str) -> DbResult<Option<UserRecord>> {
        let handle = handle.trim();
        Ok(self
            .users
            .iter()
            .find(|e| e.handle.eq_ignore_ascii_case(handle))
            .map(|e| e.value().clone()))
    }

    async fn get_by_real_name(&self, real_name: &str) -> DbResult<Option<UserRecord>> {
        let real_name = real_name.trim();
        Ok(self
            .users
            .iter()
            .find(|e| e.real_name.eq_ignore_ascii_case(real_name))
            .map(|e| e.value().clone()))
    }

    async fn all(&self) -> DbResult<Vec<UserRecord>> {
        Ok(self.sorted(|_| true))
    }

    async fn by_wildcard(&self, pattern: &str) -> DbResult<Vec<UserRecord>> {
        let re = wildcard_regex(pattern)?;
        Ok(self.sorted(|u| re.is_match(&u.handle) || re.is_match(&u.real_name)))
    }

    async fn insert(&self, mut user: UserRecord) -> DbResult<UserId> {
        if user.handle.trim().is_empty() {
            return Err(DbError::Validation("handle cannot be empty".into()));
        }
        let _guard = self.writes.lock();
        if self.handle_taken(&user.handle, None) {
            return Err(DbError::UniqueViolation(user.handle));
        }

        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        if raw <= 0 {
            return Err(DbError::Exhausted);
        }
        let id = UserId(raw);
        user.id = id;
        self.users.insert(id, user);
        Ok(id)
    }

    async fn update(&self, user: &UserRecord) -> DbResult<bool> {
        let _guard = self.writes.lock();
        if !self.users.contains_key(&user.id) {
            return Ok(false);
        }
        if self.handle_taken(&user.handle, Some(user.id)) {
            return Err(DbError::UniqueViolation(user.handle.clone()));
        }
        self.users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn delete(&self, id: UserId) -> DbResult<bool> {
        let _guard = self.writes.lock();
        Ok(self.users.remove(&id).is_some())
    }

    async fn record_logon(&self, id: UserId, success: bool, at: DateTime<Utc>) -> DbResult<Option<UserRecord>> {
        let _guard = self.writes.lock();
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        if success {
            user.hack_attempts = 0;
            user.last_login = Some(at);
        } else {
            user.hack_attempts = user.hack_attempts.saturating_add(1);
        }
        Ok(Some(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::SecurityRecord;

    fn user(handle: &str) -> UserRecord {
        UserRecord::new(handle, "x", SecurityRecord::with_level(10))
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let repo = MemoryUserRepository::new();
        let a = repo.insert(user("alpha")).await.unwrap();
        let b = repo.insert(user("beta")).await.unwrap();
        assert!(b > a);
        assert_eq!(repo.get_by_id(a).await.unwrap().unwrap().handle, "alpha");
    }

    #[tokio::test]
    async fn missing_records_are_none_not_errors() {
        let repo = MemoryUserRepository::new();
        assert!(repo.get_by_id(UserId(42)).await.unwrap().is_none());
        assert!(repo.get_by_handle("ghost").await.unwrap().is_none());
        assert!(!repo.delete(UserId(42)).await.unwrap());
        assert!(!repo.update(&user("ghost")).await.unwrap());
    }

    #[tokio::test]
    async fn logon_bookkeeping_keeps_concurrent_edits() {
        let repo = MemoryUserRepository::new();
        let id = repo.insert(user("merlin")).await.unwrap();
        let stale = repo.get_by_id(id).await.unwrap().unwrap();

        // an editor saves while the logon is still checking the password
        let mut edited = stale.clone();
        edited.email = "merlin@example.org".into();
        assert!(repo.update(&edited).await.unwrap());

        let after = repo.record_logon(id, false, Utc::now()).await.unwrap().unwrap();
        assert_eq!(after.hack_attempts, 1);
        assert_eq!(after.email, "merlin@example.org");

        let after = repo.record_logon(id, true, Utc::now()).await.unwrap().unwrap();
        assert_eq!(after.hack_attempts, 0);
        assert!(after.last_login.is_some());
        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().email, "merlin@example.org");
    }

    #[tokio::test]
    async fn writes_on_deleted_records_report_missing() {
        let repo = MemoryUserRepository::new();
        let id = repo.insert(user("merlin")).await.unwrap();
        let copy = repo.get_by_id(id).await.unwrap().unwrap();

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.update(&copy).await.unwrap());
        assert!(repo.get_by_id(id).await.unwrap().is_none());
        assert!(repo.record_logon(id, true, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_handles_are_rejected() {
        let repo = MemoryUserRepository::new();
        repo.insert(user("Alpha")).await.unwrap();
        assert!(matches!(repo.insert(user("alpha")).await, Err(DbError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn wildcard_lookup() {
        let repo = MemoryUserRepository::new();
        repo.insert(user("merlin")).await.unwrap();
        repo.insert(user("Medusa")).await.unwrap();
        repo.insert(user("arthur")).await.unwrap();

        let hits = repo.by_wildcard("me*").await.unwrap();
        assert_eq!(hits.len(), 2);

        let hits = repo.by_wildcard("me").await.unwrap();
        assert_eq!(hits.len(), 2);

        let hits = repo.by_wildcard("?rthur").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, "arthur");

        let hits = repo.by_wildcard("*.*").await.unwrap();
        assert!(hits.is_empty());
    }
}
