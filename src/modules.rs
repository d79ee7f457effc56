//! Interactive modules that run on a session's module stack.

mod logon;
mod prelogon;
mod signup;
mod user_editor;

pub use logon::LogonModule;
pub use prelogon::PreLogonModule;
pub use signup::SignupModule;
pub use user_editor::UserEditorModule;

use crate::menu::module::Module;
use serde::{Deserialize, Serialize};

/// Modules a menu option can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    UserEditor,
}

impl ModuleKind {
    pub fn build(self) -> Box<dyn Module> {
        match self {
            ModuleKind::UserEditor => Box::new(UserEditorModule::new()),
        }
    }
}
