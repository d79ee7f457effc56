use crate::banner;
use crate::input::{FieldEditor, FieldEvent};
use crate::menu::module::{Module, ModuleCtx};
use crate::prompts::{PromptDefault, PromptSet};
use async_trait::async_trait;
use std::sync::Arc;

const MODULE_NAME: &str = "prelogon";

const PROMPTS: &[PromptDefault] = &[
    ("ansi", "Ask For ANSI Colour", "|CR|07Display |15ANSI|07 colour? |08(|15Y|08/|15n|08) : "),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    AskAnsi,
    Waiting,
}

/// First thing a caller sees: the banner and the colour question. Stays at the
/// bottom of the stack while logon runs and restarts it if logon is abandoned.
pub struct PreLogonModule {
    stage: Stage,
    field: FieldEditor,
    prompts: Arc<PromptSet>,
}

impl Default for PreLogonModule {
    fn default() -> Self {
        Self::new()
    }
}

impl PreLogonModule {
    pub fn new() -> Self {
        Self {
            stage: Stage::AskAnsi,
            field: FieldEditor::new(1),
            prompts: Arc::new(PromptSet::from_defaults(PROMPTS)),
        }
    }
}

#[async_trait]
impl Module for PreLogonModule {
    async fn update(&mut self, ctx: &mut ModuleCtx, input: &str, _is_multi_byte: bool) -> bool {
        match self.stage {
            Stage::AskAnsi => match self.field.feed(input) {
                FieldEvent::Echo(s) => ctx.echo(&s).await,
                FieldEvent::Submitted(answer) => {
                    let ansi = !answer.trim().eq_ignore_ascii_case("n");
                    tracing::debug!(node = %ctx.node, ansi, "terminal colour chosen");
                    ctx.set_ansi(ansi);
                    self.stage = Stage::Waiting;
                    ctx.start_logon();
                }
                FieldEvent::Aborted | FieldEvent::None => {}
            },
            Stage::Waiting => {
                if matches!(self.field.feed(input), FieldEvent::Submitted(_)) {
                    ctx.start_logon();
                }
            }
        }
        true
    }

    async fn on_enter(&mut self, ctx: &mut ModuleCtx) -> bool {
        self.prompts = ctx.prompts(MODULE_NAME, PROMPTS);
        let welcome = banner::welcome(&ctx.services.config.bbs_name);
        ctx.print(&welcome).await;
        ctx.print(self.prompts.get("ansi")).await;
        true
    }

    async fn on_exit(&mut self, _ctx: &mut ModuleCtx) -> bool {
        true
    }

    fn state_id(&self) -> &str {
        MODULE_NAME
    }
}
