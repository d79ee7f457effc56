//! Text prompts per module.
//!
//! Every module ships a table of default prompts. When a data directory is
//! configured the table is stored as `<module>.yaml` there the first time the module
//! asks for it, and read back (so sysops can restyle prompts) on later runs. Keys
//! missing from the file fall back to the defaults.

use crate::error::{AppResult, ConfigErrorKind, InfraError};
use crate::render::escape_pipes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// (key, description, text)
pub type PromptDefault = (&'static str, &'static str, &'static str);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub description: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    prompts: BTreeMap<String, Prompt>,
}

impl PromptSet {
    pub fn from_defaults(defaults: &[PromptDefault]) -> Self {
        let prompts = defaults
            .iter()
            .map(|(k, d, t)| {
                (
                    k.to_string(),
                    Prompt {
                        description: d.to_string(),
                        text: t.to_string(),
                    },
                )
            })
            .collect();
        Self { prompts }
    }

    /// The prompt text; unknown keys render as the key itself so a missing
    /// prompt shows up on screen instead of silently vanishing.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.prompts.get(key).map(|p| p.text.as_str()).unwrap_or(key)
    }

    /// Prompt text with its `|OT` placeholder replaced by `value`. The value is data
    /// and shows as typed, pipe codes included.
    pub fn with_value(&self, key: &str, value: &str) -> String {
        self.get(key).replace("|OT", &escape_pipes(value))
    }

    fn merge(&mut self, other: BTreeMap<String, Prompt>) {
        self.prompts.extend(other);
    }
}

#[derive(Debug, Default)]
pub struct PromptStore {
    dir: Option<PathBuf>,
    loaded: RwLock<HashMap<String, Arc<PromptSet>>>,
}

impl PromptStore {
    /// Prompts kept in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Prompts of `module`, loading or creating its file on first use.
    pub fn module(&self, module: &str, defaults: &[PromptDefault]) -> Arc<PromptSet> {
        if let Some(set) = self.loaded.read().get(module) {
            return set.clone();
        }

        let mut set = PromptSet::from_defaults(defaults);
        if let Err(e) = self.load_or_create(module, &mut set) {
            tracing::warn!(module, error = %e, "cannot use prompt file, falling back to defaults");
        }

        let set = Arc::new(set);
        self.loaded.write().insert(module.to_string(), set.clone());
        set
    }

    fn load_or_create(&self, module: &str, set: &mut PromptSet) -> AppResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let path = dir.join(format!("{module}.yaml"));
        if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            let stored: BTreeMap<String, Prompt> = serde_yaml::from_str(&data).map_err(|e| InfraError::Config {
                path: path.clone(),
                source: ConfigErrorKind::ParseYaml(e),
            })?;
            set.merge(stored);
        } else {
            std::fs::create_dir_all(dir)?;
            std::fs::write(&path, serde_yaml::to_string(&set.prompts)?)?;
            tracing::info!(path = %path.display(), "created default prompt file");
        }
        Ok(())
    }
}
