use crate::error::{DomainError, LoginError};
use crate::input::{FieldEditor, FieldEvent};
use crate::menu::module::{Module, ModuleCtx};
use crate::models::user::{SecurityRecord, UserRecord};
use crate::prompts::{PromptDefault, PromptSet};
use async_trait::async_trait;
use std::sync::Arc;

const MODULE_NAME: &str = "signup";
const FIELD_LENGTH: usize = 40;
const MIN_PASSWORD_LENGTH: usize = 4;

const PROMPTS: &[PromptDefault] = &[
    ("header", "New User Header", "|CR|03--- |15[|11New User Application|15] |03---|CR"),
    ("handle", "Choose Handle", "|CR|15Handle you would like to use |07: |15"),
    ("handle_taken", "Handle Taken", "|CR|04That handle is already in use.|CR"),
    ("handle_invalid", "Handle Invalid", "|CR|04Invalid handle: |OT|CR"),
    ("password", "Choose Password", "|CR|15Password |07: |15"),
    ("password_short", "Password Too Short", "|CR|04Password is too short.|CR"),
    ("verify", "Verify Password", "|CR|15Password again |07: |15"),
    ("mismatch", "Passwords Differ", "|CR|04Passwords do not match.|CR"),
    ("email", "Email Address", "|CR|15Email address |07: |15"),
    ("welcome", "New User Welcome", "|CR|CR|11Welcome aboard, |15|OT|11!|CR"),
    ("abandoned", "Application Abandoned", "|CR|07Application abandoned. Press |15ENTER|07 to log on.|CR"),
    ("error", "Signup Error", "|CR|04Signup failed: |OT|CR"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Handle,
    Password,
    Verify,
    Email,
}

/// New user application. Creates the account and logs it on.
pub struct SignupModule {
    stage: Stage,
    field: FieldEditor,
    handle: String,
    password: String,
    prompts: Arc<PromptSet>,
}

impl Default for SignupModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SignupModule {
    pub fn new() -> Self {
        Self {
            stage: Stage::Handle,
            field: FieldEditor::new(FIELD_LENGTH),
            handle: String::new(),
            password: String::new(),
            prompts: Arc::new(PromptSet::from_defaults(PROMPTS)),
        }
    }

    async fn ask(&mut self, ctx: &ModuleCtx, stage: Stage) {
        let (prompt, field) = match stage {
            Stage::Handle => ("handle", FieldEditor::new(FIELD_LENGTH)),
            Stage::Password => ("password", FieldEditor::masked(FIELD_LENGTH, '*')),
            Stage::Verify => ("verify", FieldEditor::masked(FIELD_LENGTH, '*')),
            Stage::Email => ("email", FieldEditor::new(FIELD_LENGTH)),
        };
        self.stage = stage;
        self.field = field;
        ctx.print(self.prompts.get(prompt)).await;
    }

    async fn handle_entered(&mut self, ctx: &ModuleCtx, handle: &str) {
        if let Err(e) = UserRecord::validate_handle(handle) {
            ctx.print(&self.prompts.with_value("handle_invalid", &e.to_string())).await;
            self.ask(ctx, Stage::Handle).await;
            return;
        }
        match ctx.services.users.get_by_handle(handle).await {
            Ok(None) => {
                self.handle = handle.to_string();
                self.ask(ctx, Stage::Password).await;
            }
            Ok(Some(_)) => {
                ctx.print(self.prompts.get("handle_taken")).await;
                self.ask(ctx, Stage::Handle).await;
            }
            Err(e) => {
                tracing::error!(node = %ctx.node, error = %e, "handle lookup failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                self.ask(ctx, Stage::Handle).await;
            }
        }
    }

    /// False once the account exists and was handed to the engine.
    async fn register(&mut self, ctx: &mut ModuleCtx, email: &str) -> bool {
        let security = SecurityRecord::with_level(ctx.services.config.new_user_level);
        let password = std::mem::take(&mut self.password);
        match ctx.services.auth.register(&self.handle, email, &password, security).await {
            Ok(user) => {
                ctx.print(&self.prompts.with_value("welcome", &user.handle)).await;
                ctx.authenticated(user);
                false
            }
            Err(DomainError::LoginError(LoginError::HandleTaken)) => {
                ctx.print(self.prompts.get("handle_taken")).await;
                self.ask(ctx, Stage::Handle).await;
                true
            }
            Err(e) => {
                tracing::error!(node = %ctx.node, error = %e, "signup failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                self.ask(ctx, Stage::Handle).await;
                true
            }
        }
    }
}

#[async_trait]
impl Module for SignupModule {
    async fn update(&mut self, ctx: &mut ModuleCtx, input: &str, _is_multi_byte: bool) -> bool {
        let value = match self.field.feed(input) {
            FieldEvent::Echo(s) => {
                ctx.echo(&s).await;
                return true;
            }
            FieldEvent::None => return true,
            FieldEvent::Aborted => {
                ctx.print(self.prompts.get("abandoned")).await;
                return false;
            }
            FieldEvent::Submitted(value) => value,
        };

        match self.stage {
            Stage::Handle => self.handle_entered(ctx, value.trim()).await,
            Stage::Password => {
                if value.chars().count() < MIN_PASSWORD_LENGTH {
                    ctx.print(self.prompts.get("password_short")).await;
                    self.ask(ctx, Stage::Password).await;
                } else {
                    self.password = value;
                    self.ask(ctx, Stage::Verify).await;
                }
            }
            Stage::Verify => {
                if value != self.password {
                    ctx.print(self.prompts.get("mismatch")).await;
                    self.password.clear();
                    self.ask(ctx, Stage::Password).await;
                } else {
                    self.ask(ctx, Stage::Email).await;
                }
            }
            Stage::Email => return self.register(ctx, value.trim()).await,
        }
        true
    }

    async fn on_enter(&mut self, ctx: &mut ModuleCtx) -> bool {
        self.prompts = ctx.prompts(MODULE_NAME, PROMPTS);
        ctx.print(self.prompts.get("header")).await;
        self.ask(ctx, Stage::Handle).await;
        true
    }

    async fn on_exit(&mut self, _ctx: &mut ModuleCtx) -> bool {
        self.password.clear();
        true
    }

    fn state_id(&self) -> &str {
        MODULE_NAME
    }
}
