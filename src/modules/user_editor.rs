//! Sysop user editor: list users (optionally through a wildcard filter), edit
//! fields of one user, delete users and copy a user into a fresh `New User<n>`
//! record with the board's default password.

use crate::access::flag_letters;
use crate::error::AppResult;
use crate::input::{FieldEditor, FieldEvent};
use crate::menu::module::{Module, ModuleCtx};
use crate::models::types::UserId;
use crate::models::user::{FlagBank, UserRecord};
use crate::prompts::{PromptDefault, PromptSet};
use crate::render::{escape_pipes, right_pad};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

const MODULE_NAME: &str = "user_editor";
const NAME_LENGTH: usize = 30;
const VALUE_LENGTH: usize = 60;
const ROWS_PER_PAGE: usize = 18;
const COPY_NAME: &str = "New User";

const PROMPTS: &[PromptDefault] = &[
    (
        "header",
        "User Editor Header",
        "|CS|CR|03--- |15[|11User Editor|15] |03--- |11Filtering View : |15|OT |CR",
    ),
    (
        "command",
        "User Editor Prompt",
        "|CR|03E|15/dit User |03D|15/elete User |03C|15/opy User |03F|15/ilter Users |03Q|15/uit : ",
    ),
    (
        "pause",
        "Pause Prompt",
        "|CR |03- |15Hit any key to continue or (|03a|15)bort listing |03-|15 |CR",
    ),
    ("user_change", "User Number To Change", "|CR|15Enter user number to |11EDIT|15 : "),
    ("user_delete", "User Number To Delete", "|CR|15Enter user number to |11DELETE|15 : "),
    ("user_copy", "User Number To Copy", "|CR|15Enter user number to |11COPY|15 : "),
    (
        "user_filter",
        "Wildcard (Example 'me*' lists names starting with 'me')",
        "|CR|15Enter wildcard to |11FILTER|15 by, Leave empty for |11ALL|15 : ",
    ),
    ("not_exists", "Invalid User Doesn't Exist", "|CR|04Invalid, User doesn't exist.|CR"),
    ("delete_self", "Cannot Delete Own Account", "|CR|04You cannot delete the account you are using.|CR"),
    (
        "edit_header",
        "User Fields Editor Header |OT User ID",
        "|CS|CR|03--- |15[|11User Editor|15] |03--- |11User ID : |15|OT |CR",
    ),
    ("field_command", "User Editor Command", "|CR|15User Editor C|07om|08mand |15: |07"),
    ("field_value", "New Field Value", "|CR|15New value |07: |15"),
    ("invalid_number", "Invalid Number", "|CR|04Invalid, enter a number.|CR"),
    ("invalid_date", "Invalid Date", "|CR|04Invalid, enter a date as YYYY-MM-DD.|CR"),
    ("no_more_users", "No More Users", "|CR|04No more users in that direction.|CR"),
    ("invalid_handle", "Invalid Handle", "|CR|04Invalid handle.|CR"),
    ("copied", "User Copied", "|CR|11Copied to |15|OT|CR"),
    ("error", "User Editor Error", "|CR|04Error: |OT|CR"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserAction {
    Change,
    Delete,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserField {
    Handle,
    RealName,
    Email,
    Address,
    Location,
    Country,
    Note,
    Birthday,
    Flags,
    ExtraFlags,
    Level,
    FileLevel,
    MessageLevel,
    HackAttempts,
    NoTimeLimit,
    Ansi,
    BackspaceVt100,
    Wanted,
    ClearOrScroll,
    Pause,
}

impl UserField {
    fn from_key(c: char) -> Option<Self> {
        Some(match c {
            'A' => Self::Handle,
            'B' => Self::RealName,
            'C' => Self::Email,
            'D' => Self::Address,
            'E' => Self::Location,
            'F' => Self::Country,
            'G' => Self::Note,
            'H' => Self::Birthday,
            'I' => Self::Flags,
            'J' => Self::ExtraFlags,
            'M' => Self::Level,
            'N' => Self::FileLevel,
            'O' => Self::MessageLevel,
            'P' => Self::HackAttempts,
            'R' => Self::NoTimeLimit,
            'S' => Self::Ansi,
            'T' => Self::BackspaceVt100,
            'U' => Self::Wanted,
            'V' => Self::ClearOrScroll,
            'W' => Self::Pause,
            _ => return None,
        })
    }

    /// Yes/no fields flip on the keypress without asking for a value.
    fn toggle(self, user: &mut UserRecord) -> bool {
        let s = &mut user.security;
        let bit = match self {
            Self::NoTimeLimit => &mut s.ignore_time_limit,
            Self::Ansi => &mut s.ansi,
            Self::BackspaceVt100 => &mut s.backspace_vt100,
            Self::Wanted => &mut s.wanted,
            Self::ClearOrScroll => &mut s.clear_or_scroll,
            Self::Pause => &mut s.do_pause,
            _ => return false,
        };
        *bit = !*bit;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorInput {
    Command,
    UserNumber(UserAction),
    Filter,
    Paused,
    FieldCommand,
    FieldValue(UserField),
}

pub struct UserEditorModule {
    input: EditorInput,
    field: FieldEditor,
    prompts: Arc<PromptSet>,
    filter: String,
    listing: Vec<String>,
    page: usize,
    editing: Option<UserRecord>,
}

impl Default for UserEditorModule {
    fn default() -> Self {
        Self::new()
    }
}

impl UserEditorModule {
    pub fn new() -> Self {
        Self {
            input: EditorInput::Command,
            field: FieldEditor::new(1),
            prompts: Arc::new(PromptSet::from_defaults(PROMPTS)),
            filter: String::new(),
            listing: Vec::new(),
            page: 0,
            editing: None,
        }
    }

    fn change_input(&mut self, input: EditorInput) {
        let len = match input {
            EditorInput::Command | EditorInput::FieldCommand | EditorInput::Paused => 1,
            EditorInput::UserNumber(_) | EditorInput::Filter => NAME_LENGTH,
            EditorInput::FieldValue(_) => VALUE_LENGTH,
        };
        self.field = FieldEditor::new(len);
        self.input = input;
    }

    async fn prompt(&mut self, ctx: &ModuleCtx, input: EditorInput, key: &str) {
        self.change_input(input);
        ctx.print(self.prompts.get(key)).await;
    }

    async fn back_to_list_prompt(&mut self, ctx: &ModuleCtx) {
        self.prompt(ctx, EditorInput::Command, "command").await;
    }

    // --- user list -------------------------------------------------------------

    async fn setup_user_list(&mut self, ctx: &ModuleCtx) {
        let filter = if self.filter.is_empty() { "ALL" } else { self.filter.as_str() };
        ctx.print(&self.prompts.with_value("header", filter)).await;

        let users = if self.filter.is_empty() {
            ctx.services.users.all().await
        } else {
            ctx.services.users.by_wildcard(&self.filter).await
        };
        self.listing = match users {
            Ok(users) => user_list_lines(&users),
            Err(e) => {
                tracing::warn!(node = %ctx.node, filter = %self.filter, error = %e, "user listing failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                Vec::new()
            }
        };
        self.page = 0;
        self.display_current_page(ctx).await;
    }

    /// One page of the listing, then either the pause prompt or the command prompt.
    async fn display_current_page(&mut self, ctx: &ModuleCtx) {
        let start = self.page * ROWS_PER_PAGE;
        let end = (start + ROWS_PER_PAGE).min(self.listing.len());
        let mut out = String::new();
        for line in self.listing.get(start..end).unwrap_or_default() {
            out.push_str(line);
            out.push_str("|CR");
        }
        ctx.print(&out).await;

        if end < self.listing.len() {
            self.prompt(ctx, EditorInput::Paused, "pause").await;
        } else {
            self.page = 0;
            self.back_to_list_prompt(ctx).await;
        }
    }

    async fn paused_input(&mut self, ctx: &ModuleCtx, input: &str) {
        if input.trim().eq_ignore_ascii_case("a") {
            self.page = 0;
            self.back_to_list_prompt(ctx).await;
            return;
        }
        self.page += 1;
        self.display_current_page(ctx).await;
    }

    /// False when the sysop quits the editor.
    async fn user_list_input(&mut self, ctx: &ModuleCtx, key: &str) -> bool {
        let Some(c) = key.chars().next() else {
            self.back_to_list_prompt(ctx).await;
            return true;
        };

        match c.to_ascii_uppercase() {
            'E' => self.prompt(ctx, EditorInput::UserNumber(UserAction::Change), "user_change").await,
            'D' => self.prompt(ctx, EditorInput::UserNumber(UserAction::Delete), "user_delete").await,
            'C' => self.prompt(ctx, EditorInput::UserNumber(UserAction::Copy), "user_copy").await,
            'F' => self.prompt(ctx, EditorInput::Filter, "user_filter").await,
            'Q' => return false,
            _ => self.back_to_list_prompt(ctx).await,
        }
        true
    }

    async fn filter_input(&mut self, ctx: &ModuleCtx, value: &str) {
        self.filter = value.trim().to_string();
        self.setup_user_list(ctx).await;
    }

    async fn user_number_input(&mut self, ctx: &ModuleCtx, action: UserAction, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.back_to_list_prompt(ctx).await;
            return;
        }

        let user = match value.parse::<UserId>() {
            Ok(id) if id.0 > 0 => ctx.services.users.get_by_id(id).await,
            _ => Ok(None),
        };
        let user = match user {
            Ok(Some(user)) => user,
            Ok(None) => {
                ctx.print(self.prompts.get("not_exists")).await;
                self.back_to_list_prompt(ctx).await;
                return;
            }
            Err(e) => {
                tracing::warn!(node = %ctx.node, error = %e, "user lookup failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                self.back_to_list_prompt(ctx).await;
                return;
            }
        };

        match action {
            UserAction::Change => {
                self.editing = Some(user);
                self.setup_user_edit_fields(ctx).await;
            }
            UserAction::Delete => {
                if ctx.user().is_some_and(|me| me.id == user.id) {
                    ctx.print(self.prompts.get("delete_self")).await;
                    self.back_to_list_prompt(ctx).await;
                    return;
                }
                match ctx.services.users.delete(user.id).await {
                    Ok(_) => {
                        tracing::info!(node = %ctx.node, user = %user.handle, id = %user.id, "user deleted");
                        self.setup_user_list(ctx).await;
                    }
                    Err(e) => {
                        ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                        self.back_to_list_prompt(ctx).await;
                    }
                }
            }
            UserAction::Copy => match copy_user(ctx, &user).await {
                Ok(copy) => {
                    tracing::info!(node = %ctx.node, from = %user.handle, to = %copy.handle, "user copied");
                    ctx.print(&self.prompts.with_value("copied", &copy.handle)).await;
                    self.setup_user_list(ctx).await;
                }
                Err(e) => {
                    tracing::warn!(node = %ctx.node, error = %e, "user copy failed");
                    ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                    self.back_to_list_prompt(ctx).await;
                }
            },
        }
    }

    // --- field editor ----------------------------------------------------------

    async fn setup_user_edit_fields(&mut self, ctx: &ModuleCtx) {
        let Some(user) = &self.editing else {
            self.setup_user_list(ctx).await;
            return;
        };
        let mut out = self.prompts.with_value("edit_header", &user.id.to_string());
        out.push_str(&user_edit_screen(user));
        ctx.print(&out).await;
        self.prompt(ctx, EditorInput::FieldCommand, "field_command").await;
    }

    async fn field_command_input(&mut self, ctx: &ModuleCtx, key: &str) {
        let Some(c) = key.chars().next().map(|c| c.to_ascii_uppercase()) else {
            self.prompt(ctx, EditorInput::FieldCommand, "field_command").await;
            return;
        };

        match c {
            // Save and back to the list
            'Q' => {
                if let Err(e) = self.save_editing(ctx).await {
                    ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                    self.prompt(ctx, EditorInput::FieldCommand, "field_command").await;
                    return;
                }
                self.editing = None;
                self.setup_user_list(ctx).await;
            }
            // Back without saving
            'X' => {
                self.editing = None;
                self.setup_user_list(ctx).await;
            }
            '[' => self.step_user(ctx, false).await,
            ']' => self.step_user(ctx, true).await,
            c => match UserField::from_key(c) {
                Some(field) => {
                    if let Some(user) = self.editing.as_mut()
                        && field.toggle(user)
                    {
                        self.setup_user_edit_fields(ctx).await;
                        return;
                    }
                    self.prompt(ctx, EditorInput::FieldValue(field), "field_value").await
                }
                None => self.prompt(ctx, EditorInput::FieldCommand, "field_command").await,
            },
        }
    }

    /// Moves to the neighbouring user by id. Unsaved changes are dropped.
    async fn step_user(&mut self, ctx: &ModuleCtx, forward: bool) {
        let Some(current) = self.editing.as_ref().map(|u| u.id) else {
            self.setup_user_list(ctx).await;
            return;
        };

        let neighbour = match ctx.services.users.all().await {
            Ok(users) => neighbour_of(&users, current, forward).cloned(),
            Err(e) => {
                tracing::warn!(node = %ctx.node, error = %e, "user lookup failed");
                ctx.print(&self.prompts.with_value("error", &e.to_string())).await;
                self.prompt(ctx, EditorInput::FieldCommand, "field_command").await;
                return;
            }
        };
        match neighbour {
            Some(user) => {
                self.editing = Some(user);
                self.setup_user_edit_fields(ctx).await;
            }
            None => {
                ctx.print(self.prompts.get("no_more_users")).await;
                self.prompt(ctx, EditorInput::FieldCommand, "field_command").await;
            }
        }
    }

    async fn field_value_input(&mut self, ctx: &ModuleCtx, field: UserField, value: &str) {
        let Some(user) = self.editing.as_mut() else {
            self.setup_user_list(ctx).await;
            return;
        };

        if let Err(message) = apply_field(user, field, value.trim()) {
            ctx.print(self.prompts.get(message)).await;
            self.prompt(ctx, EditorInput::FieldCommand, "field_command").await;
            return;
        }
        self.setup_user_edit_fields(ctx).await;
    }

    async fn save_editing(&self, ctx: &ModuleCtx) -> AppResult<()> {
        let Some(user) = &self.editing else {
            return Ok(());
        };
        UserRecord::validate_handle(&user.handle)?;
        if ctx.services.users.update(user).await? {
            tracing::info!(node = %ctx.node, user = %user.handle, id = %user.id, "user saved");
        } else {
            tracing::warn!(node = %ctx.node, id = %user.id, "edited user vanished before save");
        }
        Ok(())
    }
}

#[async_trait]
impl Module for UserEditorModule {
    async fn update(&mut self, ctx: &mut ModuleCtx, input: &str, _is_multi_byte: bool) -> bool {
        if input.is_empty() {
            return true;
        }
        if self.input == EditorInput::Paused {
            self.paused_input(ctx, input).await;
            return true;
        }

        let value = match self.field.feed(input) {
            FieldEvent::Echo(s) => {
                ctx.echo(&s).await;
                return true;
            }
            FieldEvent::None => return true,
            FieldEvent::Aborted => {
                match self.input {
                    EditorInput::Command => {}
                    EditorInput::FieldCommand | EditorInput::FieldValue(_) => {
                        self.prompt(ctx, EditorInput::FieldCommand, "field_command").await
                    }
                    _ => self.back_to_list_prompt(ctx).await,
                }
                return true;
            }
            FieldEvent::Submitted(value) => value,
        };

        match self.input {
            EditorInput::Command => return self.user_list_input(ctx, value.trim()).await,
            EditorInput::UserNumber(action) => self.user_number_input(ctx, action, &value).await,
            EditorInput::Filter => self.filter_input(ctx, &value).await,
            EditorInput::FieldCommand => self.field_command_input(ctx, value.trim()).await,
            EditorInput::FieldValue(field) => self.field_value_input(ctx, field, &value).await,
            EditorInput::Paused => {}
        }
        true
    }

    async fn on_enter(&mut self, ctx: &mut ModuleCtx) -> bool {
        self.prompts = ctx.prompts(MODULE_NAME, PROMPTS);
        // Cursor on
        ctx.echo("\x1b[?25h").await;
        self.setup_user_list(ctx).await;
        true
    }

    async fn on_exit(&mut self, _ctx: &mut ModuleCtx) -> bool {
        self.editing = None;
        self.listing.clear();
        true
    }

    fn state_id(&self) -> &str {
        MODULE_NAME
    }
}

/// Inserts a copy of `source` under the first free `New User<n>` name, with the
/// board's default password.
async fn copy_user(ctx: &ModuleCtx, source: &UserRecord) -> AppResult<UserRecord> {
    let users = &ctx.services.users;
    let mut n = 1u32;
    let name = loop {
        let candidate = format!("{COPY_NAME}{n}");
        if users.get_by_real_name(&candidate).await?.is_none() && users.get_by_handle(&candidate).await?.is_none() {
            break candidate;
        }
        n += 1;
    };

    let mut copy = source.clone();
    copy.handle = name.clone();
    copy.real_name = name;
    copy.email = String::new();
    copy.password_hash = ctx.services.auth.hash_password(&ctx.services.config.default_user_password)?;
    copy.hack_attempts = 0;
    copy.created_at = Utc::now();
    copy.last_login = None;

    copy.id = users.insert(copy.clone()).await?;
    Ok(copy)
}

/// Writes `value` into `field`. On bad input returns the prompt key to show.
fn apply_field(user: &mut UserRecord, field: UserField, value: &str) -> Result<(), &'static str> {
    match field {
        UserField::Handle => {
            if UserRecord::validate_handle(value).is_err() {
                return Err("invalid_handle");
            }
            user.handle = value.to_string();
        }
        UserField::RealName => user.real_name = value.to_string(),
        UserField::Email => user.email = value.to_string(),
        UserField::Address => user.address = value.to_string(),
        UserField::Location => user.location = value.to_string(),
        UserField::Country => user.country = value.to_string(),
        UserField::Note => user.note = value.to_string(),
        UserField::Birthday => user.birthday = parse_date(value)?,
        UserField::Flags => toggle_flags(user, FlagBank::Primary, value),
        UserField::ExtraFlags => toggle_flags(user, FlagBank::Secondary, value),
        UserField::Level => user.security.level = parse_number(value)?,
        UserField::FileLevel => user.security.file_level = parse_number(value)?,
        UserField::MessageLevel => user.security.message_level = parse_number(value)?,
        UserField::HackAttempts => user.hack_attempts = parse_number(value)?,
        UserField::NoTimeLimit
        | UserField::Ansi
        | UserField::BackspaceVt100
        | UserField::Wanted
        | UserField::ClearOrScroll
        | UserField::Pause => {
            field.toggle(user);
        }
    }
    Ok(())
}

/// Empty clears the date.
fn parse_date(value: &str) -> Result<Option<NaiveDate>, &'static str> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| "invalid_date")
}

/// Next user by id after (or before) `current`, if any.
fn neighbour_of(users: &[UserRecord], current: UserId, forward: bool) -> Option<&UserRecord> {
    if forward {
        users.iter().filter(|u| u.id > current).min_by_key(|u| u.id)
    } else {
        users.iter().filter(|u| u.id < current).max_by_key(|u| u.id)
    }
}

fn parse_number(value: &str) -> Result<u32, &'static str> {
    value.parse::<u32>().map_err(|_| "invalid_number")
}

/// Each letter `A`..`Z` in `value` flips the matching bit of the bank.
fn toggle_flags(user: &mut UserRecord, bank: FlagBank, value: &str) {
    for c in value.chars().filter(char::is_ascii_alphabetic) {
        let bit = (c.to_ascii_uppercase() as u8) - b'A';
        let on = user.security.flag(bank, bit);
        user.security.set_flag(bank, bit, !on);
    }
}

fn user_list_lines(users: &[UserRecord]) -> Vec<String> {
    let mut lines = vec![
        "|03Id     Handle                   Level  Location".to_string(),
        "|08-----  -----------------------  -----  ----------------".to_string(),
    ];
    lines.extend(users.iter().map(|u| {
        format!(
            "|15{}|11{}|03{}|07{}",
            right_pad(&u.id.to_string(), 7),
            right_pad(u.display_name(), 25),
            right_pad(&u.security.level.to_string(), 7),
            u.location
        )
    }));
    lines
}

fn user_edit_screen(user: &UserRecord) -> String {
    let s = &user.security;
    let birthday = user.birthday.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
    let left = [
        ("A", "User Name", user.handle.clone()),
        ("B", "Real Name", user.real_name.clone()),
        ("C", "Email", user.email.clone()),
        ("D", "Address", user.address.clone()),
        ("E", "Location", user.location.clone()),
        ("F", "Country", user.country.clone()),
        ("G", "User Note", user.note.clone()),
        ("H", "Birth Date", birthday),
        ("I", "User Flags1", flag_letters(s.control_flags1)),
        ("J", "User Flags2", flag_letters(s.control_flags2)),
    ];
    let right = [
        ("M", "User Level", s.level.to_string()),
        ("N", "File Level", s.file_level.to_string()),
        ("O", "Mesg Level", s.message_level.to_string()),
        ("P", "Hack Attempts", user.hack_attempts.to_string()),
        ("R", "No Time Limit", yes_no(s.ignore_time_limit)),
        ("S", "Use ANSI", yes_no(s.ansi)),
        ("T", "VT100 BackSpace", yes_no(s.backspace_vt100)),
        ("U", "User Wanted", yes_no(s.wanted)),
        ("V", "Clear or Scroll", yes_no(s.clear_or_scroll)),
        ("W", "Screen Pause", yes_no(s.do_pause)),
    ];

    let mut out = String::from("|CR");
    for ((lk, ll, lv), (rk, rl, rv)) in left.into_iter().zip(right) {
        let cell = right_pad(&format!("{}: |03{}", right_pad(ll, 12), escape_pipes(&lv)), 44);
        out.push_str(&format!("|03({lk}) |15{cell}|03({rk}) |15{}: |03{rv}|CR", right_pad(rl, 16)));
    }
    out.push_str(&format!(
        "|CR|08Created |07{}  |08Last logon |07{}|CR",
        user.created_at.format("%Y-%m-%d"),
        user.last_login
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into()),
    ));
    out.push_str("|CR|03([) |15Previous User  |03(]) |15Next User|CR");
    out.push_str("|03(Q) |15Quit & Save    |03(X) |15Exit without Saving|CR");
    out
}

fn yes_no(on: bool) -> String {
    if on { "Yes" } else { "No" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::SecurityRecord;
    use crate::render::{PipePresenter, Presenter};

    fn user() -> UserRecord {
        UserRecord::new("merlin", "x", SecurityRecord::with_level(10))
    }

    #[test]
    fn numeric_fields_reject_garbage() {
        let mut u = user();
        assert_eq!(apply_field(&mut u, UserField::Level, "abc"), Err("invalid_number"));
        assert_eq!(u.security.level, 10);
        apply_field(&mut u, UserField::Level, "50").unwrap();
        assert_eq!(u.security.level, 50);
    }

    #[test]
    fn flag_letters_toggle_bits() {
        let mut u = user();
        apply_field(&mut u, UserField::Flags, "ac").unwrap();
        assert!(u.security.flag(FlagBank::Primary, 0));
        assert!(u.security.flag(FlagBank::Primary, 2));
        apply_field(&mut u, UserField::Flags, "A").unwrap();
        assert!(!u.security.flag(FlagBank::Primary, 0));
        assert!(!u.security.flag(FlagBank::Secondary, 2));
    }

    #[test]
    fn handle_must_stay_valid() {
        let mut u = user();
        assert!(apply_field(&mut u, UserField::Handle, "").is_err());
        assert_eq!(u.handle, "merlin");
    }

    #[test]
    fn listing_has_header_and_one_line_per_user() {
        let lines = user_list_lines(&[user(), user()]);
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("merlin"));
    }

    #[test]
    fn yes_no_fields_flip_without_a_value() {
        let mut u = user();
        u.hack_attempts = 5;
        assert!(UserField::from_key('U').unwrap().toggle(&mut u));
        assert!(UserField::from_key('R').unwrap().toggle(&mut u));
        assert!(u.security.wanted && u.security.ignore_time_limit);
        assert!(!UserField::from_key('A').unwrap().toggle(&mut u));

        // unlocking a locked account
        apply_field(&mut u, UserField::HackAttempts, "0").unwrap();
        assert_eq!(u.hack_attempts, 0);
    }

    #[test]
    fn birth_date_parses_or_clears() {
        let mut u = user();
        apply_field(&mut u, UserField::Birthday, "1984-02-29").unwrap();
        assert_eq!(u.birthday, NaiveDate::from_ymd_opt(1984, 2, 29));
        assert_eq!(apply_field(&mut u, UserField::Birthday, "29/02/84"), Err("invalid_date"));
        apply_field(&mut u, UserField::Birthday, "").unwrap();
        assert_eq!(u.birthday, None);

        apply_field(&mut u, UserField::Country, "NL").unwrap();
        apply_field(&mut u, UserField::Address, "1 Main St").unwrap();
        assert_eq!((u.country.as_str(), u.address.as_str()), ("NL", "1 Main St"));
    }

    #[test]
    fn neighbours_skip_gaps_in_ids() {
        let users: Vec<UserRecord> = [1, 4, 9]
            .into_iter()
            .map(|id| {
                let mut u = user();
                u.id = UserId(id);
                u
            })
            .collect();
        assert_eq!(neighbour_of(&users, UserId(4), true).map(|u| u.id), Some(UserId(9)));
        assert_eq!(neighbour_of(&users, UserId(4), false).map(|u| u.id), Some(UserId(1)));
        assert!(neighbour_of(&users, UserId(9), true).is_none());
    }

    #[test]
    fn edit_screen_shows_data_verbatim() {
        let mut u = user();
        u.email = "a|CLb@example.org".into();
        let shown = PipePresenter::default().render(&user_edit_screen(&u));
        assert!(shown.contains("a|CLb@example.org"));
        assert!(shown.contains("Hack Attempts"));
    }
}
