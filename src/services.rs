mod auth;

pub use auth::AuthService;

use crate::access::AccessEvaluator;
use crate::config::Config;
use crate::error::{AppResult, ConfigErrorKind, InfraError};
use crate::db::repo::UserRepo;
use crate::models::menu::MenuLibrary;
use crate::models::user::SecurityRecord;
use crate::prompts::PromptStore;
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything a session needs besides its own state. Built once in `main` and shared
/// by every connection.
pub struct Services {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserRepo>,
    pub auth: Arc<AuthService>,
    pub access: Arc<AccessEvaluator>,
    pub menus: RwLock<MenuLibrary>,
    pub prompts: PromptStore,
}

impl Services {
    pub fn new(config: Arc<Config>, users: Arc<dyn UserRepo>, menus: MenuLibrary, prompts: PromptStore) -> Self {
        Self {
            auth: Arc::new(AuthService::new(users.clone())),
            config,
            users,
            access: Arc::new(AccessEvaluator::new()),
            menus: RwLock::new(menus),
            prompts,
        }
    }

    /// Same as [`Services::new`] with a caller supplied auth service (tests use cheap hashing).
    pub fn with_auth(
        config: Arc<Config>,
        users: Arc<dyn UserRepo>,
        auth: AuthService,
        menus: MenuLibrary,
        prompts: PromptStore,
    ) -> Self {
        Self {
            auth: Arc::new(auth),
            config,
            users,
            access: Arc::new(AccessEvaluator::new()),
            menus: RwLock::new(menus),
            prompts,
        }
    }
}

impl Services {
    /// Creates a level 255 `sysop` account with the default password when the user
    /// store is empty, so a fresh board can be administered at all.
    pub async fn ensure_sysop(&self) -> AppResult<()> {
        if !self.users.all().await?.is_empty() {
            return Ok(());
        }
        let user = self
            .auth
            .register("sysop", "", &self.config.default_user_password, SecurityRecord::with_level(255))
            .await?;
        tracing::warn!(user = %user.handle, "created sysop account with the default password, change it");
        Ok(())
    }
}

/// Menus from `<data_dir>/menus.yaml`, or the built-in set. With a data directory and
/// no file yet, the built-in set is written there for the sysop to edit.
pub fn load_menus(config: &Config) -> AppResult<MenuLibrary> {
    let Some(dir) = &config.data_dir else {
        return Ok(MenuLibrary::builtin());
    };

    let path = dir.join("menus.yaml");
    if path.exists() {
        let data = std::fs::read_to_string(&path)?;
        let menus = MenuLibrary::from_yaml(&data).map_err(|e| InfraError::Config {
            path: path.clone(),
            source: ConfigErrorKind::ParseYaml(e),
        })?;
        tracing::info!(path = %path.display(), count = menus.len(), "menus loaded");
        return Ok(menus);
    }

    let menus = MenuLibrary::builtin();
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, menus.to_yaml()?)?;
    tracing::info!(path = %path.display(), "wrote default menus");
    Ok(menus)
}
