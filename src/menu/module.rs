use crate::menu::route::InputRoute;
use crate::models::types::NodeNumber;
use crate::models::user::UserRecord;
use crate::prompts::{PromptDefault, PromptSet};
use crate::render::{PipePresenter, Presenter};
use crate::services::Services;
use crate::state::transport::SessionTransport;
use async_trait::async_trait;
use std::sync::Arc;

/// An interactive program running on a session's module stack.
///
/// Only the top module of the stack receives input. `on_enter` runs once when the
/// module is pushed; returning false aborts the push and `on_exit` is then never
/// called. Otherwise `on_exit` runs exactly once when the module is popped.
#[async_trait]
pub trait Module: Send + Sync {
    /// Handles one chunk of input. Returning false asks the engine to pop the module.
    async fn update(&mut self, ctx: &mut ModuleCtx, input: &str, is_multi_byte: bool) -> bool;

    async fn on_enter(&mut self, ctx: &mut ModuleCtx) -> bool;

    async fn on_exit(&mut self, ctx: &mut ModuleCtx) -> bool;

    /// Short name for logs.
    fn state_id(&self) -> &str;
}

/// Things a module asks of the engine. They are applied after the module call
/// returns, in order.
pub enum EngineRequest {
    Push(Box<dyn Module>),
    StartLogon,
    StartSignup,
    Authenticated(UserRecord),
    Broadcast(String),
    Logoff,
}

impl std::fmt::Debug for EngineRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineRequest::Push(m) => write!(f, "Push({})", m.state_id()),
            EngineRequest::StartLogon => f.write_str("StartLogon"),
            EngineRequest::StartSignup => f.write_str("StartSignup"),
            EngineRequest::Authenticated(u) => write!(f, "Authenticated({})", u.handle),
            EngineRequest::Broadcast(_) => f.write_str("Broadcast"),
            EngineRequest::Logoff => f.write_str("Logoff"),
        }
    }
}

pub struct ModuleFrame {
    pub module: Box<dyn Module>,
    /// Route to restore when this frame is popped
    pub prev_route: InputRoute,
}

/// What a module sees of its session.
pub struct ModuleCtx {
    pub services: Arc<Services>,
    pub node: NodeNumber,
    transport: Arc<SessionTransport>,
    presenter: PipePresenter,
    user: Option<UserRecord>,
    requests: Vec<EngineRequest>,
}

impl ModuleCtx {
    pub fn new(services: Arc<Services>, node: NodeNumber, transport: Arc<SessionTransport>) -> Self {
        Self {
            services,
            node,
            transport,
            presenter: PipePresenter::default(),
            user: None,
            requests: Vec::new(),
        }
    }

    /// Renders pipe-code markup and sends it. A dead transport is not an error here;
    /// the read loop notices it on its own.
    pub async fn print(&self, markup: &str) {
        let text = self.presenter.render(markup);
        if let Err(e) = self.transport.send_text(&text).await {
            tracing::debug!(node = %self.node, error = %e, "dropping output");
        }
    }

    /// Sends text exactly as given (key echo).
    pub async fn echo(&self, raw: &str) {
        if let Err(e) = self.transport.send_text(raw).await {
            tracing::debug!(node = %self.node, error = %e, "dropping echo");
        }
    }

    pub fn render(&self, markup: &str) -> String {
        self.presenter.render(markup)
    }

    pub fn set_ansi(&mut self, ansi: bool) {
        self.presenter.ansi = ansi;
    }

    pub fn prompts(&self, module: &str, defaults: &[PromptDefault]) -> Arc<PromptSet> {
        self.services.prompts.module(module, defaults)
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub(crate) fn set_user(&mut self, user: Option<UserRecord>) {
        self.user = user;
    }

    pub fn transport(&self) -> &Arc<SessionTransport> {
        &self.transport
    }

    pub fn push_module(&mut self, module: Box<dyn Module>) {
        self.requests.push(EngineRequest::Push(module));
    }

    pub fn start_logon(&mut self) {
        self.requests.push(EngineRequest::StartLogon);
    }

    pub fn start_signup(&mut self) {
        self.requests.push(EngineRequest::StartSignup);
    }

    pub fn authenticated(&mut self, user: UserRecord) {
        self.requests.push(EngineRequest::Authenticated(user));
    }

    pub fn broadcast(&mut self, markup: impl Into<String>) {
        self.requests.push(EngineRequest::Broadcast(markup.into()));
    }

    pub fn logoff(&mut self) {
        self.requests.push(EngineRequest::Logoff);
    }

    pub(crate) fn take_requests(&mut self) -> Vec<EngineRequest> {
        std::mem::take(&mut self.requests)
    }

    pub(crate) fn has_requests(&self) -> bool {
        !self.requests.is_empty()
    }
}
