pub mod field;

pub use field::{FieldEditor, FieldEvent};

/// True when a read carried anything outside 7-bit ASCII.
pub fn is_multi_byte(input: &str) -> bool {
    !input.is_ascii()
}
