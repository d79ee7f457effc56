//! Menu definitions. Menus are plain data: the engine decides what an option does,
//! the option only names the command and the access string guarding it.

use crate::modules::ModuleKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "arg", rename_all = "snake_case")]
pub enum MenuCommand {
    /// Replace the current menu
    Goto(String),
    /// Enter a menu, remembering the current one for `Return`
    Gosub(String),
    /// Back to the menu we came from
    Return,
    /// Push an interactive module onto the session's stack
    Module(ModuleKind),
    /// Switch input to the menu editor
    MenuEditor,
    /// Show who is online
    Who,
    /// Send a line to every connected node
    Broadcast(String),
    /// Show a block of text
    Display(String),
    /// Hang up
    Logoff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    /// Command key typed by the user, matched case-insensitively
    pub key: String,
    pub description: String,
    /// Access condition string; empty means everyone
    #[serde(default)]
    pub acs: String,
    #[serde(flatten)]
    pub command: MenuCommand,
}

impl MenuOption {
    pub fn new(key: &str, description: &str, acs: &str, command: MenuCommand) -> Self {
        Self {
            key: key.to_string(),
            description: description.to_string(),
            acs: acs.to_string(),
            command,
        }
    }

    pub fn matches(&self, input: &str) -> bool {
        self.key.eq_ignore_ascii_case(input.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    pub title: String,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Access needed to enter the menu at all
    #[serde(default)]
    pub acs: String,
    #[serde(default)]
    pub options: Vec<MenuOption>,
}

fn default_prompt() -> String {
    "|CR|15Command |07: ".to_string()
}

/// All menus known to the board, keyed by lowercase id.
#[derive(Debug, Clone, Default)]
pub struct MenuLibrary {
    menus: BTreeMap<String, Arc<Menu>>,
}

impl MenuLibrary {
    pub fn new(menus: Vec<Menu>) -> Self {
        let mut lib = Self::default();
        for m in menus {
            lib.insert(m);
        }
        lib
    }

    pub fn insert(&mut self, menu: Menu) {
        self.menus.insert(menu.id.to_ascii_lowercase(), Arc::new(menu));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Menu>> {
        self.menus.get(&id.to_ascii_lowercase()).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Menu>> {
        self.menus.values()
    }

    pub fn len(&self) -> usize {
        self.menus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }

    /// Parses a YAML list of menus.
    pub fn from_yaml(src: &str) -> Result<Self, serde_yaml::Error> {
        let menus: Vec<Menu> = serde_yaml::from_str(src)?;
        Ok(Self::new(menus))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let menus: Vec<&Menu> = self.menus.values().map(|m| m.as_ref()).collect();
        serde_yaml::to_string(&menus)
    }

    /// The stock menu set used when no `menus.yaml` is present.
    pub fn builtin() -> Self {
        Self::new(vec![
            Menu {
                id: "main".into(),
                title: "|CS|CR|03--- |15[|11Main Menu|15] |03---|CR".into(),
                prompt: default_prompt(),
                acs: String::new(),
                options: vec![
                    MenuOption::new("W", "Who's online", "", MenuCommand::Who),
                    MenuOption::new("M", "Message to all nodes", "LEVEL:20", MenuCommand::Gosub("chat".into())),
                    MenuOption::new("S", "Sysop menu", "LEVEL:200", MenuCommand::Gosub("sysop".into())),
                    MenuOption::new("G", "Goodbye", "", MenuCommand::Logoff),
                ],
            },
            Menu {
                id: "chat".into(),
                title: "|CR|03--- |15[|11Node Messages|15] |03---|CR".into(),
                prompt: default_prompt(),
                acs: "LEVEL:20".into(),
                options: vec![
                    MenuOption::new("H", "Say hello to all nodes", "", MenuCommand::Broadcast("|CR|11Hello from a fellow caller!|CR".into())),
                    MenuOption::new("Q", "Back", "", MenuCommand::Return),
                ],
            },
            Menu {
                id: "sysop".into(),
                title: "|CS|CR|03--- |15[|11Sysop Menu|15] |03---|CR".into(),
                prompt: default_prompt(),
                acs: "LEVEL:200".into(),
                options: vec![
                    MenuOption::new("U", "User editor", "LEVEL:255", MenuCommand::Module(ModuleKind::UserEditor)),
                    MenuOption::new("E", "Menu editor", "LEVEL:255", MenuCommand::MenuEditor),
                    MenuOption::new("Q", "Back", "", MenuCommand::Return),
                ],
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_key_matching_ignores_case_and_whitespace() {
        let opt = MenuOption::new("G", "Goodbye", "", MenuCommand::Logoff);
        assert!(opt.matches("g"));
        assert!(opt.matches(" G "));
        assert!(!opt.matches("GG"));
    }

    #[test]
    fn builtin_menus_survive_yaml() {
        let lib = MenuLibrary::builtin();
        let yaml = lib.to_yaml().unwrap();
        let back = MenuLibrary::from_yaml(&yaml).unwrap();
        assert_eq!(back.len(), lib.len());
        assert_eq!(back.get("MAIN"), lib.get("main"));
    }

    #[test]
    fn yaml_menu_without_acs_defaults_to_open() {
        let src = r#"
- id: tiny
  title: Tiny
  options:
    - key: Q
      description: Quit
      cmd: logoff
    - key: U
      description: Users
      acs: "LEVEL:255"
      cmd: module
      arg: user_editor
"#;
        let lib = MenuLibrary::from_yaml(src).unwrap();
        let menu = lib.get("tiny").unwrap();
        assert_eq!(menu.acs, "");
        assert_eq!(menu.options[0].command, MenuCommand::Logoff);
        assert_eq!(menu.options[1].command, MenuCommand::Module(ModuleKind::UserEditor));
        assert_eq!(menu.options[1].acs, "LEVEL:255");
    }
}
