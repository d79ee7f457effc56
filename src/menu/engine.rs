use crate::input::{FieldEditor, FieldEvent};
use crate::menu::editor::MenuEditor;
use crate::menu::module::{EngineRequest, Module, ModuleCtx, ModuleFrame};
use crate::menu::route::InputRoute;
use crate::models::menu::{Menu, MenuCommand, MenuOption};
use crate::models::types::NodeNumber;
use crate::models::user::UserRecord;
use crate::modules::{LogonModule, PreLogonModule, SignupModule};
use crate::render::right_pad;
use crate::services::Services;
use crate::state::registry::SessionRegistry;
use crate::state::session::{SessionHandle, SessionState};
use std::sync::Arc;

const MENU_KEY_LENGTH: usize = 8;

/// Drives one session: owns its module stack, picks the input route and applies
/// everything modules ask for.
///
/// The engine is owned by the connection task, so input for a session is handled
/// one chunk at a time, in arrival order.
pub struct MenuEngine {
    ctx: ModuleCtx,
    registry: Arc<SessionRegistry>,
    session: Arc<SessionHandle>,
    state: SessionState,
    route: InputRoute,
    stack: Vec<ModuleFrame>,
    current_menu: Option<Arc<Menu>>,
    // gosub return stack, menu ids
    menu_stack: Vec<String>,
    menu_input: FieldEditor,
    menu_editor: Option<MenuEditor>,
}

impl MenuEngine {
    pub fn new(services: Arc<Services>, registry: Arc<SessionRegistry>, session: Arc<SessionHandle>) -> Self {
        let ctx = ModuleCtx::new(services, session.node, session.transport().clone());
        Self {
            ctx,
            registry,
            session,
            state: SessionState::PreLogon,
            route: InputRoute::PreLogon,
            stack: Vec::new(),
            current_menu: None,
            menu_stack: Vec::new(),
            menu_input: FieldEditor::new(MENU_KEY_LENGTH),
            menu_editor: None,
        }
    }

    pub fn node(&self) -> NodeNumber {
        self.session.node
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn route(&self) -> InputRoute {
        self.route
    }

    /// Number of modules on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// `state_id` of the module receiving input, if any.
    pub fn active_module(&self) -> Option<&str> {
        self.stack.last().map(|f| f.module.state_id())
    }

    pub fn current_menu(&self) -> Option<&str> {
        self.current_menu.as_deref().map(|m| m.id.as_str())
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.ctx.user()
    }

    /// Routes one chunk of input to the active target.
    pub async fn dispatch(&mut self, input: &str, is_multi_byte: bool) {
        if self.state == SessionState::ShuttingDown {
            return;
        }

        match self.route {
            InputRoute::Menu => self.menu_input(input).await,
            InputRoute::MenuEditor => self.menu_editor_input(input).await,
            InputRoute::PreLogon | InputRoute::Logon | InputRoute::Module => {
                self.update_module(input, is_multi_byte).await
            }
        }

        self.apply_requests().await;
    }

    async fn update_module(&mut self, input: &str, is_multi_byte: bool) {
        let Some(frame) = self.stack.last_mut() else {
            tracing::warn!(node = %self.node(), route = ?self.route, "module route without a module");
            return;
        };

        let keep = frame.module.update(&mut self.ctx, input, is_multi_byte).await;
        if !keep {
            self.shutdown_module().await;
        }
    }

    /// Pushes `module` and enters it. A module that refuses to start is popped again
    /// right away, without `on_exit`, and the previous route comes back.
    pub async fn startup_module(&mut self, module: Box<dyn Module>) -> bool {
        self.install(module, InputRoute::Module).await
    }

    async fn install(&mut self, module: Box<dyn Module>, route: InputRoute) -> bool {
        tracing::debug!(node = %self.node(), module = module.state_id(), "starting module");
        self.stack.push(ModuleFrame {
            module,
            prev_route: self.route,
        });

        let Some(frame) = self.stack.last_mut() else {
            return false;
        };
        if !frame.module.on_enter(&mut self.ctx).await {
            if let Some(frame) = self.stack.pop() {
                tracing::debug!(node = %self.node(), module = frame.module.state_id(), "module refused to start");
                self.route = frame.prev_route;
            }
            return false;
        }

        self.route = route;
        if self.state.is_logged_in() {
            self.state = SessionState::InModule;
        }
        true
    }

    /// Exits and pops the top module. Does nothing on an empty stack.
    pub async fn shutdown_module(&mut self) {
        let Some(frame) = self.stack.last_mut() else {
            tracing::debug!(node = %self.node(), "no module to shut down");
            return;
        };
        frame.module.on_exit(&mut self.ctx).await;

        let Some(frame) = self.stack.pop() else {
            return;
        };
        tracing::debug!(node = %self.node(), module = frame.module.state_id(), "module exited");
        self.route = frame.prev_route;

        if self.stack.is_empty() && self.state == SessionState::InModule {
            self.state = SessionState::InMenu;
        }
        if self.route == InputRoute::Menu && self.state == SessionState::InMenu {
            self.display_menu_prompt().await;
        }
    }

    /// Exits and pops every module, top first.
    pub async fn clear_all_modules(&mut self) {
        while let Some(frame) = self.stack.last_mut() {
            frame.module.on_exit(&mut self.ctx).await;
            if let Some(frame) = self.stack.pop() {
                self.route = frame.prev_route;
            }
        }
        if self.state == SessionState::InModule {
            self.state = SessionState::InMenu;
        }
    }

    pub async fn startup_module_pre_logon(&mut self) -> bool {
        self.state = SessionState::LoggingOn;
        self.install(Box::new(PreLogonModule::new()), InputRoute::PreLogon).await
    }

    pub async fn startup_module_logon(&mut self) -> bool {
        self.state = SessionState::LoggingOn;
        self.install(Box::new(LogonModule::new()), InputRoute::Logon).await
    }

    pub async fn startup_module_signup(&mut self) -> bool {
        self.state = SessionState::LoggingOn;
        self.install(Box::new(SignupModule::new()), InputRoute::Logon).await
    }

    /// Switches input to `route` with a clean key buffer.
    pub fn reset_menu_input_index(&mut self, route: InputRoute) {
        self.menu_input.clear();
        if route != InputRoute::MenuEditor {
            self.menu_editor = None;
        }
        self.route = route;
    }

    /// Runs a menu option for the current user. Options the user may not use are
    /// refused quietly and nothing runs.
    pub async fn menu_options_callback(&mut self, option: &MenuOption) -> bool {
        let allowed = self
            .ctx
            .services
            .access
            .check(&option.acs, self.ctx.user().map(|u| &u.security));
        if !allowed {
            tracing::debug!(node = %self.node(), key = %option.key, acs = %option.acs, "menu option denied");
            return false;
        }

        tracing::debug!(node = %self.node(), key = %option.key, command = ?option.command, "menu option");
        match &option.command {
            MenuCommand::Goto(id) => {
                if self.goto_menu(id).await {
                    self.menu_stack.clear();
                }
            }
            MenuCommand::Gosub(id) => {
                let from = self.current_menu.as_ref().map(|m| m.id.clone());
                if self.goto_menu(id).await
                    && let Some(from) = from
                {
                    self.menu_stack.push(from);
                }
            }
            MenuCommand::Return => match self.menu_stack.pop() {
                Some(id) => {
                    self.goto_menu(&id).await;
                }
                None => self.display_menu_prompt().await,
            },
            MenuCommand::Module(kind) => {
                let module = kind.build();
                if !self.startup_module(module).await {
                    self.display_menu_prompt().await;
                }
            }
            MenuCommand::MenuEditor => {
                self.reset_menu_input_index(InputRoute::MenuEditor);
                let mut editor = MenuEditor::new();
                editor.enter(&mut self.ctx).await;
                self.menu_editor = Some(editor);
            }
            MenuCommand::Who => {
                self.show_who().await;
                self.display_menu_prompt().await;
            }
            MenuCommand::Broadcast(text) => {
                self.broadcast(text).await;
                self.display_menu_prompt().await;
            }
            MenuCommand::Display(text) => {
                self.ctx.print(text).await;
                self.display_menu_prompt().await;
            }
            MenuCommand::Logoff => self.logoff().await,
        }
        true
    }

    /// Clears the module stack and marks the session as going away. Every module
    /// that entered successfully gets its `on_exit` here if it has not had it yet.
    pub async fn terminate(&mut self) {
        if self.state == SessionState::ShuttingDown && self.stack.is_empty() {
            return;
        }
        self.clear_all_modules().await;
        let dropped = self.ctx.take_requests();
        if !dropped.is_empty() {
            tracing::debug!(node = %self.node(), ?dropped, "dropping requests on terminate");
        }
        self.menu_editor = None;
        self.state = SessionState::ShuttingDown;
    }

    async fn apply_requests(&mut self) {
        while self.ctx.has_requests() {
            for request in self.ctx.take_requests() {
                if self.state == SessionState::ShuttingDown {
                    tracing::debug!(node = %self.node(), ?request, "session closing, request dropped");
                    continue;
                }
                match request {
                    EngineRequest::Push(module) => {
                        self.startup_module(module).await;
                    }
                    EngineRequest::StartLogon => {
                        self.startup_module_logon().await;
                    }
                    EngineRequest::StartSignup => {
                        self.startup_module_signup().await;
                    }
                    EngineRequest::Authenticated(user) => self.login(user).await,
                    EngineRequest::Broadcast(text) => self.broadcast(&text).await,
                    EngineRequest::Logoff => self.logoff().await,
                }
            }
        }
    }

    async fn login(&mut self, user: UserRecord) {
        tracing::info!(node = %self.node(), user = %user.handle, "user logged on");
        self.clear_all_modules().await;

        self.session.set_user(Some(user.handle.clone()));
        self.ctx.set_ansi(user.security.ansi);
        self.ctx.set_user(Some(user));
        self.state = SessionState::InMenu;
        self.menu_stack.clear();
        self.reset_menu_input_index(InputRoute::Menu);

        let start = self.ctx.services.config.start_menu.clone();
        if !self.goto_menu(&start).await {
            tracing::error!(node = %self.node(), menu = %start, "start menu unusable, hanging up");
            self.logoff().await;
        }
    }

    async fn logoff(&mut self) {
        tracing::info!(node = %self.node(), "logging off");
        self.ctx.print("|CR|CR|15Goodbye!|CR").await;
        self.terminate().await;
        self.session.transport().shutdown().await;
    }

    async fn broadcast(&self, markup: &str) {
        let text = self.ctx.render(markup);
        let delivered = self.registry.deliver(text.as_bytes()).await;
        tracing::debug!(node = %self.node(), delivered, "broadcast");
    }

    async fn show_who(&self) {
        let mut out = String::from("|CR|03Node  |03User|CR|08----  ----------------|CR");
        for (node, handle) in self.registry.who().await {
            out.push_str(&format!("|15{}|11{}|CR", right_pad(&node.to_string(), 6), handle));
        }
        self.ctx.print(&out).await;
    }

    /// Enters the menu `id` if it exists and its own ACS lets the user in.
    async fn goto_menu(&mut self, id: &str) -> bool {
        let menu = self.ctx.services.menus.read().get(id);
        let Some(menu) = menu else {
            tracing::warn!(node = %self.node(), menu = %id, "menu not found");
            self.ctx.print("|CR|04Menu not available.|CR").await;
            return false;
        };

        let allowed = self
            .ctx
            .services
            .access
            .check(&menu.acs, self.ctx.user().map(|u| &u.security));
        if !allowed {
            tracing::debug!(node = %self.node(), menu = %id, "menu entry denied");
            self.display_menu_prompt().await;
            return false;
        }

        self.current_menu = Some(menu);
        self.display_menu().await;
        true
    }

    /// Options of `menu` the current user can see.
    fn visible_options<'m>(&self, menu: &'m Menu) -> Vec<&'m MenuOption> {
        let record = self.ctx.user().map(|u| &u.security);
        menu.options
            .iter()
            .filter(|o| self.ctx.services.access.check(&o.acs, record))
            .collect()
    }

    async fn display_menu(&self) {
        let Some(menu) = self.current_menu.clone() else {
            return;
        };
        let mut out = menu.title.clone();
        for option in self.visible_options(&menu) {
            out.push_str(&format!("|03[|15{}|03] |07{}|CR", option.key, option.description));
        }
        out.push_str(&menu.prompt);
        self.ctx.print(&out).await;
    }

    async fn display_menu_prompt(&self) {
        if let Some(menu) = &self.current_menu {
            self.ctx.print(&menu.prompt).await;
        }
    }

    async fn menu_input(&mut self, input: &str) {
        let key = match self.menu_input.feed(input) {
            FieldEvent::Echo(s) => {
                self.ctx.echo(&s).await;
                return;
            }
            FieldEvent::None => return,
            FieldEvent::Aborted => {
                self.display_menu_prompt().await;
                return;
            }
            FieldEvent::Submitted(key) => key,
        };

        let key = key.trim();
        if key.is_empty() {
            self.display_menu_prompt().await;
            return;
        }
        if key == "?" {
            self.ctx.print("|CR").await;
            self.display_menu().await;
            return;
        }

        let Some(menu) = self.current_menu.clone() else {
            tracing::warn!(node = %self.node(), "menu input without a current menu");
            return;
        };
        let option = self.visible_options(&menu).into_iter().find(|o| o.matches(key)).cloned();

        self.ctx.print("|CR").await;
        match option {
            Some(option) => {
                self.menu_options_callback(&option).await;
            }
            None => {
                self.ctx.print("|04Unknown command.|CR").await;
                self.display_menu_prompt().await;
            }
        }
    }

    async fn menu_editor_input(&mut self, input: &str) {
        let Some(editor) = self.menu_editor.as_mut() else {
            self.reset_menu_input_index(InputRoute::Menu);
            return;
        };
        if !editor.update(&mut self.ctx, input).await {
            self.reset_menu_input_index(InputRoute::Menu);
            self.display_menu().await;
        }
    }
}
