use crate::error::{AppResult, DomainError};
use crate::models::types::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Width of a control flag bank in bits.
pub const FLAG_BITS: u8 = 32;

/// Security attributes consulted by the access evaluator. Read-only from the
/// evaluator's point of view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRecord {
    pub level: u32,
    pub file_level: u32,
    pub message_level: u32,
    pub control_flags1: u32,
    pub control_flags2: u32,

    pub ansi: bool,
    pub wanted: bool,
    pub ignore_time_limit: bool,
    pub backspace_vt100: bool,
    pub clear_or_scroll: bool,
    pub do_pause: bool,
}

impl SecurityRecord {
    pub fn with_level(level: u32) -> Self {
        Self {
            level,
            ansi: true,
            ..Default::default()
        }
    }

    /// Returns the state of `bit` in bank 1 or 2. Out of range bits read as cleared.
    pub fn flag(&self, bank: FlagBank, bit: u8) -> bool {
        if bit >= FLAG_BITS {
            return false;
        }
        let bits = match bank {
            FlagBank::Primary => self.control_flags1,
            FlagBank::Secondary => self.control_flags2,
        };
        bits & (1 << bit) != 0
    }

    pub fn set_flag(&mut self, bank: FlagBank, bit: u8, on: bool) {
        if bit >= FLAG_BITS {
            return;
        }
        let bits = match bank {
            FlagBank::Primary => &mut self.control_flags1,
            FlagBank::Secondary => &mut self.control_flags2,
        };
        if on {
            *bits |= 1 << bit;
        } else {
            *bits &= !(1 << bit);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagBank {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub handle: String,
    pub real_name: String,
    pub email: String,
    pub address: String,
    pub location: String,
    pub country: String,
    pub note: String,
    pub birthday: Option<NaiveDate>,
    pub password_hash: String,
    pub hack_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub security: SecurityRecord,
}

impl UserRecord {
    /// A fresh record, not yet stored. The id is assigned on insert.
    pub fn new(handle: impl Into<String>, password_hash: impl Into<String>, security: SecurityRecord) -> Self {
        let handle = handle.into();
        Self {
            id: UserId(0),
            real_name: handle.clone(),
            handle,
            email: String::new(),
            address: String::new(),
            location: String::new(),
            country: String::new(),
            note: String::new(),
            birthday: None,
            password_hash: password_hash.into(),
            hack_attempts: 0,
            created_at: Utc::now(),
            last_login: None,
            security,
        }
    }

    /// Name to show in listings: the handle, or the real name when no handle is set.
    pub fn display_name(&self) -> &str {
        if self.handle.is_empty() { &self.real_name } else { &self.handle }
    }

    pub fn validate_handle(s: &str) -> AppResult<()> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::Validation {
                field: "handle",
                message: "cannot be empty".into(),
            });
        }
        if s.len() > 30 {
            return Err(DomainError::Validation {
                field: "handle",
                message: "at most 30 characters".into(),
            });
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' ')) {
            return Err(DomainError::Validation {
                field: "handle",
                message: "only alphanumeric, space, hyphen, underscore allowed".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_round_trip_per_bank() {
        let mut sec = SecurityRecord::default();
        sec.set_flag(FlagBank::Primary, 3, true);
        assert!(sec.flag(FlagBank::Primary, 3));
        assert!(!sec.flag(FlagBank::Secondary, 3));
        assert_eq!(sec.control_flags1, 0b1000);

        sec.set_flag(FlagBank::Primary, 3, false);
        assert!(!sec.flag(FlagBank::Primary, 3));
    }

    #[test]
    fn out_of_range_bits_are_ignored() {
        let mut sec = SecurityRecord::default();
        sec.set_flag(FlagBank::Primary, 40, true);
        assert_eq!(sec.control_flags1, 0);
        assert!(!sec.flag(FlagBank::Primary, 40));
    }

    #[test]
    fn fresh_record_has_no_history() {
        let u = UserRecord::new("merlin", "hash", SecurityRecord::with_level(20));
        assert_eq!(u.hack_attempts, 0);
        assert!(u.last_login.is_none() && u.birthday.is_none());
        assert_eq!(u.clone().security.level, 20);
    }

    #[test]
    fn handle_validation() {
        assert!(UserRecord::validate_handle("Night Owl").is_ok());
        assert!(UserRecord::validate_handle("   ").is_err());
        assert!(UserRecord::validate_handle("bad;name").is_err());
    }
}
