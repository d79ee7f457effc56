//! Sysop menu editor. Runs on its own input route instead of the module stack so it
//! can work on the menu library the engine is reading from.

use crate::access::lexer;
use crate::error::AppResult;
use crate::input::{FieldEditor, FieldEvent};
use crate::menu::module::ModuleCtx;
use crate::models::menu::{Menu, MenuLibrary};
use crate::prompts::{PromptDefault, PromptSet};
use crate::render::{escape_pipes, right_pad};
use std::sync::Arc;

const MODULE_NAME: &str = "menu_editor";
const FIELD_LENGTH: usize = 60;

const PROMPTS: &[PromptDefault] = &[
    (
        "header",
        "Menu Editor Header",
        "|CS|CR|03--- |15[|11Menu Editor|15] |03---|CR",
    ),
    (
        "command",
        "Menu Editor Command",
        "|CR|03L|15/ist |03V|15/iew |03A|15/ccess |03D|15/elete Option |03S|15/ave |03Q|15/uit : ",
    ),
    ("menu_id", "Menu Id", "|CR|15Menu id : "),
    ("option_key", "Option Key", "|CR|15Option key : "),
    ("acs", "New Access String", "|CR|15New ACS (empty for everyone) : "),
    ("no_menu", "Menu Doesn't Exist", "|CR|04Invalid, menu doesn't exist.|CR"),
    ("no_option", "Option Doesn't Exist", "|CR|04Invalid, option doesn't exist.|CR"),
    ("unknown_codes", "ACS Has Unknown Codes", "|CR|14Warning: unknown codes deny access: |15|OT|CR"),
    ("saved", "Menus Saved", "|CR|11Menus saved to |15|OT|CR"),
    ("no_data_dir", "No Data Directory", "|CR|04No data directory configured, changes stay in memory.|CR"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum EditorInput {
    Command,
    ViewMenu,
    AccessMenu,
    AccessKey { menu: String },
    AccessValue { menu: String, key: String },
    DeleteMenu,
    DeleteKey { menu: String },
}

pub struct MenuEditor {
    input: EditorInput,
    field: FieldEditor,
    prompts: Arc<PromptSet>,
}

impl Default for MenuEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuEditor {
    pub fn new() -> Self {
        Self {
            input: EditorInput::Command,
            field: FieldEditor::new(1),
            prompts: Arc::new(PromptSet::from_defaults(PROMPTS)),
        }
    }

    pub async fn enter(&mut self, ctx: &mut ModuleCtx) {
        self.prompts = ctx.prompts(MODULE_NAME, PROMPTS);
        ctx.print(self.prompts.get("header")).await;
        self.list_menus(ctx).await;
        self.change_input(ctx, EditorInput::Command).await;
    }

    /// False once the sysop quits.
    pub async fn update(&mut self, ctx: &mut ModuleCtx, input: &str) -> bool {
        let value = match self.field.feed(input) {
            FieldEvent::Echo(s) => {
                ctx.echo(&s).await;
                return true;
            }
            FieldEvent::None => return true,
            FieldEvent::Aborted => {
                self.change_input(ctx, EditorInput::Command).await;
                return true;
            }
            FieldEvent::Submitted(value) => value,
        };
        let value = value.trim().to_string();

        match std::mem::replace(&mut self.input, EditorInput::Command) {
            EditorInput::Command => return self.command(ctx, &value).await,
            EditorInput::ViewMenu => {
                self.view_menu(ctx, &value).await;
                self.change_input(ctx, EditorInput::Command).await;
            }
            EditorInput::AccessMenu => self.pick_menu(ctx, &value, |menu| EditorInput::AccessKey { menu }).await,
            EditorInput::AccessKey { menu } => {
                if self.has_option(ctx, &menu, &value) {
                    self.change_input(ctx, EditorInput::AccessValue { menu, key: value }).await;
                } else {
                    ctx.print(self.prompts.get("no_option")).await;
                    self.change_input(ctx, EditorInput::Command).await;
                }
            }
            EditorInput::AccessValue { menu, key } => {
                self.set_access(ctx, &menu, &key, &value).await;
                self.change_input(ctx, EditorInput::Command).await;
            }
            EditorInput::DeleteMenu => self.pick_menu(ctx, &value, |menu| EditorInput::DeleteKey { menu }).await,
            EditorInput::DeleteKey { menu } => {
                self.delete_option(ctx, &menu, &value).await;
                self.change_input(ctx, EditorInput::Command).await;
            }
        }
        true
    }

    async fn command(&mut self, ctx: &mut ModuleCtx, key: &str) -> bool {
        let Some(c) = key.chars().next() else {
            self.change_input(ctx, EditorInput::Command).await;
            return true;
        };

        match c.to_ascii_uppercase() {
            'L' => {
                self.list_menus(ctx).await;
                self.change_input(ctx, EditorInput::Command).await;
            }
            'V' => self.change_input(ctx, EditorInput::ViewMenu).await,
            'A' => self.change_input(ctx, EditorInput::AccessMenu).await,
            'D' => self.change_input(ctx, EditorInput::DeleteMenu).await,
            'S' => {
                if let Err(e) = self.save(ctx).await {
                    tracing::warn!(node = %ctx.node, error = %e, "saving menus failed");
                    ctx.print(&format!("|CR|04Save failed: {}|CR", escape_pipes(&e.to_string()))).await;
                }
                self.change_input(ctx, EditorInput::Command).await;
            }
            'Q' => return false,
            _ => self.change_input(ctx, EditorInput::Command).await,
        }
        true
    }

    async fn change_input(&mut self, ctx: &ModuleCtx, input: EditorInput) {
        let (prompt, len) = match &input {
            EditorInput::Command => ("command", 1),
            EditorInput::ViewMenu | EditorInput::AccessMenu | EditorInput::DeleteMenu => ("menu_id", FIELD_LENGTH),
            EditorInput::AccessKey { .. } | EditorInput::DeleteKey { .. } => ("option_key", FIELD_LENGTH),
            EditorInput::AccessValue { .. } => ("acs", FIELD_LENGTH),
        };
        self.field = FieldEditor::new(len);
        self.input = input;
        ctx.print(self.prompts.get(prompt)).await;
    }

    async fn pick_menu(&mut self, ctx: &ModuleCtx, id: &str, next: impl FnOnce(String) -> EditorInput) {
        let exists = ctx.services.menus.read().get(id).is_some();
        if exists {
            self.change_input(ctx, next(id.to_string())).await;
        } else {
            ctx.print(self.prompts.get("no_menu")).await;
            self.change_input(ctx, EditorInput::Command).await;
        }
    }

    fn has_option(&self, ctx: &ModuleCtx, menu: &str, key: &str) -> bool {
        ctx.services
            .menus
            .read()
            .get(menu)
            .is_some_and(|m| m.options.iter().any(|o| o.matches(key)))
    }

    async fn list_menus(&self, ctx: &ModuleCtx) {
        let listing = menu_listing(&ctx.services.menus.read());
        ctx.print(&listing).await;
    }

    async fn view_menu(&self, ctx: &ModuleCtx, id: &str) {
        let menu = ctx.services.menus.read().get(id);
        let Some(menu) = menu else {
            ctx.print(self.prompts.get("no_menu")).await;
            return;
        };

        ctx.print(&menu_view(&menu)).await;
    }

    async fn set_access(&self, ctx: &ModuleCtx, menu_id: &str, key: &str, acs: &str) {
        let unknown: Vec<String> = lexer::parse(acs)
            .alternatives()
            .iter()
            .flat_map(|alt| alt.0.iter())
            .filter(|c| c.is_unknown())
            .map(|c| c.to_string())
            .collect();
        if !unknown.is_empty() {
            ctx.print(&self.prompts.with_value("unknown_codes", &unknown.join(" "))).await;
        }

        let updated = {
            let mut menus = ctx.services.menus.write();
            match menus.get(menu_id) {
                Some(menu) => {
                    let mut menu = (*menu).clone();
                    for o in menu.options.iter_mut().filter(|o| o.matches(key)) {
                        o.acs = acs.to_string();
                    }
                    menus.insert(menu);
                    true
                }
                None => false,
            }
        };
        if updated {
            tracing::info!(node = %ctx.node, menu = %menu_id, %key, %acs, "menu option access changed");
        } else {
            ctx.print(self.prompts.get("no_menu")).await;
        }
    }

    async fn delete_option(&self, ctx: &ModuleCtx, menu_id: &str, key: &str) {
        let removed = {
            let mut menus = ctx.services.menus.write();
            match menus.get(menu_id) {
                Some(menu) => {
                    let mut menu = (*menu).clone();
                    let before = menu.options.len();
                    menu.options.retain(|o| !o.matches(key));
                    let removed = menu.options.len() != before;
                    menus.insert(menu);
                    removed
                }
                None => false,
            }
        };
        if removed {
            tracing::info!(node = %ctx.node, menu = %menu_id, %key, "menu option deleted");
        } else {
            ctx.print(self.prompts.get("no_option")).await;
        }
    }

    async fn save(&self, ctx: &ModuleCtx) -> AppResult<()> {
        let Some(dir) = ctx.services.config.data_dir.clone() else {
            ctx.print(self.prompts.get("no_data_dir")).await;
            return Ok(());
        };
        let yaml = ctx.services.menus.read().to_yaml()?;
        let path = dir.join("menus.yaml");
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&path, yaml).await?;
        tracing::info!(path = %path.display(), "menus saved");
        ctx.print(&self.prompts.with_value("saved", &path.display().to_string())).await;
        Ok(())
    }
}

fn menu_listing(menus: &MenuLibrary) -> String {
    let mut out = String::from("|CR|03Id              Options|CR|08--------------  -------|CR");
    for menu in menus.iter() {
        out.push_str(&format!("|15{}|07{}|CR", right_pad(&escape_pipes(&menu.id), 16), menu.options.len()));
    }
    out
}

/// One menu with its options. ACS strings use `|` for "or", so everything taken
/// from the menu is escaped.
fn menu_view(menu: &Menu) -> String {
    let mut out = format!("|CR|11{}|CR", escape_pipes(&menu.id));
    if !menu.acs.is_empty() {
        out.push_str(&format!("|03Menu ACS |15{}|CR", escape_pipes(&menu.acs)));
    }
    for o in &menu.options {
        out.push_str(&format!(
            "|15{}|07{}|03{}|08{}|CR",
            right_pad(&escape_pipes(&o.key), 4),
            right_pad(&escape_pipes(&o.description), 28),
            right_pad(&escape_pipes(&o.acs), 16),
            escape_pipes(&format!("{:?}", o.command))
        ));
    }
    out
}
