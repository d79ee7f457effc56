use crate::db::repo::UserRepo;
use crate::error::{AppResult, DomainError, LoginError};
use crate::models::user::{SecurityRecord, UserRecord};
use argon2::Argon2;
use chrono::Utc;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::Arc;

/// Failed password attempts after which logins are refused.
pub const MAX_HACK_ATTEMPTS: u32 = 5;

pub struct AuthService {
    repo: Arc<dyn UserRepo>,
    argon: Argon2<'static>,
}

impl AuthService {
    pub fn new(repo: Arc<dyn UserRepo>) -> Self {
        Self::with_hasher(repo, Argon2::default())
    }

    pub fn with_hasher(repo: Arc<dyn UserRepo>, argon: Argon2<'static>) -> Self {
        Self { repo, argon }
    }

    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(password.as_bytes(), &salt)
            .map_err(DomainError::Password)?
            .to_string();
        Ok(hash)
    }

    pub async fn register(
        &self,
        handle: &str,
        email: &str,
        password: &str,
        security: SecurityRecord,
    ) -> AppResult<UserRecord> {
        UserRecord::validate_handle(handle)?;
        if self.repo.get_by_handle(handle).await?.is_some() {
            return Err(LoginError::HandleTaken.into());
        }

        let mut user = UserRecord::new(handle.trim(), self.hash_password(password)?, security);
        user.email = email.trim().to_string();

        let id = self.repo.insert(user.clone()).await?;
        user.id = id;
        tracing::info!(user = %user.handle, id = %id, "new user registered");
        Ok(user)
    }

    pub async fn login(&self, handle: &str, password: &str) -> AppResult<UserRecord> {
        if UserRecord::validate_handle(handle).is_err() {
            return Err(LoginError::UserNotFound.into());
        }

        let Some(user) = self.repo.get_by_handle(handle).await? else {
            return Err(LoginError::UserNotFound.into());
        };

        if user.hack_attempts >= MAX_HACK_ATTEMPTS {
            return Err(LoginError::TooManyAttempts.into());
        }

        let parsed = PasswordHash::new(&user.password_hash).map_err(DomainError::Password)?;
        let verified = self.argon.verify_password(password.as_bytes(), &parsed).is_ok();

        // Bookkeeping goes through the store so edits made meanwhile survive
        let Some(user) = self.repo.record_logon(user.id, verified, Utc::now()).await? else {
            return Err(LoginError::UserNotFound.into());
        };
        if !verified {
            tracing::warn!(user = %user.handle, attempts = user.hack_attempts, "invalid password");
            return Err(LoginError::InvalidPassword.into());
        }

        Ok(user)
    }
}

#[cfg(test)]
pub(crate) fn cheap_argon() -> Argon2<'static> {
    use argon2::{Algorithm, Params, Version};
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::new(64, 1, 1, None).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::MemoryUserRepository;

    fn service() -> AuthService {
        AuthService::with_hasher(Arc::new(MemoryUserRepository::new()), cheap_argon())
    }

    #[tokio::test]
    async fn register_then_login() {
        let auth = service();
        let user = auth
            .register("Zed", "zed@example.com", "hunter2", SecurityRecord::with_level(20))
            .await
            .unwrap();
        assert_eq!(user.security.level, 20);

        let back = auth.login("zed", "hunter2").await.unwrap();
        assert_eq!(back.id, user.id);
        assert!(back.last_login.is_some());
    }

    #[tokio::test]
    async fn duplicate_handle_is_refused() {
        let auth = service();
        auth.register("Zed", "", "pw", SecurityRecord::default()).await.unwrap();
        let err = auth.register("zed", "", "pw", SecurityRecord::default()).await.unwrap_err();
        assert!(matches!(err, DomainError::LoginError(LoginError::HandleTaken)));
    }

    #[tokio::test]
    async fn wrong_password_counts_attempts_until_locked() {
        let auth = service();
        auth.register("Zed", "", "right", SecurityRecord::default()).await.unwrap();

        for _ in 0..MAX_HACK_ATTEMPTS {
            let err = auth.login("Zed", "wrong").await.unwrap_err();
            assert!(matches!(err, DomainError::LoginError(LoginError::InvalidPassword)));
        }
        let err = auth.login("Zed", "right").await.unwrap_err();
        assert!(matches!(err, DomainError::LoginError(LoginError::TooManyAttempts)));
    }

    #[tokio::test]
    async fn unknown_user() {
        let auth = service();
        let err = auth.login("nobody", "pw").await.unwrap_err();
        assert!(matches!(err, DomainError::LoginError(LoginError::UserNotFound)));
    }
}
