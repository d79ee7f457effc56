use crate::error::{DomainError, LoginError};
use crate::input::{FieldEditor, FieldEvent};
use crate::menu::module::{Module, ModuleCtx};
use crate::prompts::{PromptDefault, PromptSet};
use async_trait::async_trait;
use std::sync::Arc;

const MODULE_NAME: &str = "logon";
const HANDLE_LENGTH: usize = 30;
const PASSWORD_LENGTH: usize = 40;
/// Wrong passwords allowed per call before we hang up.
const MAX_LOGON_ATTEMPTS: u32 = 3;

const PROMPTS: &[PromptDefault] = &[
    ("handle", "Handle Prompt", "|CR|15Handle |08(|07or |15NEW|08) |07: |15"),
    ("password", "Password Prompt", "|CR|15Password |07: |15"),
    ("unknown_user", "Unknown Handle", "|CR|04No such user. Type |15NEW|04 to sign up.|CR"),
    ("bad_password", "Wrong Password", "|CR|04Invalid password.|CR"),
    ("locked", "Account Locked", "|CR|04Too many failed logons on this account. Contact the sysop.|CR"),
    ("too_many", "Too Many Attempts", "|CR|04Too many attempts.|CR"),
    ("abandoned", "Logon Abandoned", "|CR|07Press |15ENTER|07 to log on again.|CR"),
    ("error", "Logon Error", "|CR|04Logon failed: |OT|CR"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stage {
    Handle,
    Password { handle: String },
}

/// Asks for handle and password and hands the user to the engine on success.
pub struct LogonModule {
    stage: Stage,
    field: FieldEditor,
    attempts: u32,
    prompts: Arc<PromptSet>,
}

impl Default for LogonModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LogonModule {
    pub fn new() -> Self {
        Self {
            stage: Stage::Handle,
            field: FieldEditor::new(HANDLE_LENGTH),
            attempts: 0,
            prompts: Arc::new(PromptSet::from_defaults(PROMPTS)),
        }
    }

    async fn ask_handle(&mut self, ctx: &ModuleCtx) {
        self.stage = Stage::Handle;
        self.field = FieldEditor::new(HANDLE_LENGTH);
        ctx.print(self.prompts.get("handle")).await;
    }

    async fn ask_password(&mut self, ctx: &ModuleCtx, handle: String) {
        self.stage = Stage::Password { handle };
        self.field = FieldEditor::masked(PASSWORD_LENGTH, '*');
        ctx.print(self.prompts.get("password")).await;
    }

    /// False when the module is done (the engine pops it).
    async fn handle_entered(&mut self, ctx: &mut ModuleCtx, handle: &str) -> bool {
        if handle.is_empty() {
            self.ask_handle(ctx).await;
            return true;
        }
        if handle.eq_ignore_ascii_case("new") {
            ctx.start_signup();
            return false;
        }

        match ctx.services.users.get_by_handle(handle).await {
            Ok(Some(user)) => self.ask_password(ctx, user.handle).await,
            Ok(None) => {
                ctx.print(self.prompts.get("unknown_user")).await;
                self.ask_handle(ctx).await;
            }
            Err(e) => {
                tracing::error!(node = %ctx.node, error = %e, "user lookup failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                self.ask_handle(ctx).await;
            }
        }
        true
    }

    async fn password_entered(&mut self, ctx: &mut ModuleCtx, handle: String, password: &str) -> bool {
        match ctx.services.auth.login(&handle, password).await {
            Ok(user) => {
                ctx.authenticated(user);
                false
            }
            Err(DomainError::LoginError(LoginError::InvalidPassword)) => {
                self.attempts += 1;
                ctx.print(self.prompts.get("bad_password")).await;
                if self.attempts >= MAX_LOGON_ATTEMPTS {
                    tracing::warn!(node = %ctx.node, user = %handle, "too many logon attempts, hanging up");
                    ctx.print(self.prompts.get("too_many")).await;
                    ctx.logoff();
                    return true;
                }
                self.ask_password(ctx, handle).await;
                true
            }
            Err(DomainError::LoginError(LoginError::TooManyAttempts)) => {
                tracing::warn!(node = %ctx.node, user = %handle, "logon to locked account");
                ctx.print(self.prompts.get("locked")).await;
                ctx.logoff();
                true
            }
            Err(DomainError::LoginError(LoginError::UserNotFound)) => {
                ctx.print(self.prompts.get("unknown_user")).await;
                self.ask_handle(ctx).await;
                true
            }
            Err(e) => {
                tracing::error!(node = %ctx.node, error = %e, "logon failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                self.ask_handle(ctx).await;
                true
            }
        }
    }
}

#[async_trait]
impl Module for LogonModule {
    async fn update(&mut self, ctx: &mut ModuleCtx, input: &str, _is_multi_byte: bool) -> bool {
        let value = match self.field.feed(input) {
            FieldEvent::Echo(s) => {
                ctx.echo(&s).await;
                return true;
            }
            FieldEvent::None => return true,
            FieldEvent::Aborted => {
                if self.stage == Stage::Handle {
                    ctx.print(self.prompts.get("abandoned")).await;
                    return false;
                }
                self.ask_handle(ctx).await;
                return true;
            }
            FieldEvent::Submitted(value) => value,
        };

        match std::mem::replace(&mut self.stage, Stage::Handle) {
            Stage::Handle => self.handle_entered(ctx, value.trim()).await,
            Stage::Password { handle } => self.password_entered(ctx, handle, &value).await,
        }
    }

    async fn on_enter(&mut self, ctx: &mut ModuleCtx) -> bool {
        self.prompts = ctx.prompts(MODULE_NAME, PROMPTS);
        self.ask_handle(ctx).await;
        true
    }

    async fn on_exit(&mut self, _ctx: &mut ModuleCtx) -> bool {
        true
    }

    fn state_id(&self) -> &str {
        MODULE_NAME
    }
}
