//! Single-field line editor for character-at-a-time terminals.
//!
//! The engine hands each module the raw text of one read. Modules that prompt for a
//! value feed that text into a [`FieldEditor`] and act on the returned [`FieldEvent`]:
//!
//!   let mut field = FieldEditor::new(20);
//!   match field.feed(input) {
//!       FieldEvent::Submitted(value) => { /* use value */ }
//!       FieldEvent::Aborted          => { /* back out */ }
//!       FieldEvent::Echo(s)          => { /* write s back to the caller */ }
//!       FieldEvent::None             => {}
//!   }
//!
//! Bytes are treated as single columns; telnet negotiation is stripped before text
//! reaches the editor.

const ESC: char = '\x1b';
const BACKSPACE_ECHO: &str = "\x08 \x08";

/// Result of feeding input to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    /// ESC on its own; the buffer is cleared.
    Aborted,
    /// Enter; carries the buffer (possibly empty) and resets the editor.
    Submitted(String),
    /// The buffer changed; the text is what the caller should see.
    Echo(String),
    /// Nothing visible happened.
    None,
}

#[derive(Debug, Clone)]
pub struct FieldEditor {
    buf: String,
    max_len: usize,
    mask: Option<char>,
}

impl FieldEditor {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: String::new(),
            max_len,
            mask: None,
        }
    }

    /// Echo `mask` instead of the typed characters (passwords).
    pub fn masked(max_len: usize, mask: char) -> Self {
        Self {
            mask: Some(mask),
            ..Self::new(max_len)
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Feeds one read worth of input.
    ///
    /// Characters after a submit or abort in the same chunk are dropped. A chunk that
    /// starts with ESC and carries more bytes is a cursor/function key and is ignored.
    pub fn feed(&mut self, input: &str) -> FieldEvent {
        if input.starts_with(ESC) {
            if input.len() == 1 {
                self.buf.clear();
                return FieldEvent::Aborted;
            }
            return FieldEvent::None;
        }

        let mut echo = String::new();
        for c in input.chars() {
            match c {
                '\r' | '\n' => {
                    return FieldEvent::Submitted(std::mem::take(&mut self.buf));
                }
                '\x7f' | '\x08' => {
                    if self.buf.pop().is_some() {
                        echo.push_str(BACKSPACE_ECHO);
                    }
                }
                // Ctrl-U
                '\x15' => {
                    for _ in 0..self.buf.chars().count() {
                        echo.push_str(BACKSPACE_ECHO);
                    }
                    self.buf.clear();
                }
                c if c.is_control() => {}
                c => {
                    if self.buf.chars().count() >= self.max_len {
                        continue;
                    }
                    self.buf.push(c);
                    echo.push(self.mask.unwrap_or(c));
                }
            }
        }

        if echo.is_empty() { FieldEvent::None } else { FieldEvent::Echo(echo) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_then_enter_submits() {
        let mut f = FieldEditor::new(10);
        assert_eq!(f.feed("a"), FieldEvent::Echo("a".into()));
        assert_eq!(f.feed("bc"), FieldEvent::Echo("bc".into()));
        assert_eq!(f.feed("\r"), FieldEvent::Submitted("abc".into()));
        assert_eq!(f.buffer(), "");
    }

    #[test]
    fn whole_line_in_one_chunk() {
        let mut f = FieldEditor::new(10);
        assert_eq!(f.feed("42\r\n"), FieldEvent::Submitted("42".into()));
    }

    #[test]
    fn escape_aborts_and_clears() {
        let mut f = FieldEditor::new(10);
        f.feed("abc");
        assert_eq!(f.feed("\x1b"), FieldEvent::Aborted);
        assert_eq!(f.buffer(), "");
    }

    #[test]
    fn arrow_keys_are_ignored() {
        let mut f = FieldEditor::new(10);
        f.feed("ab");
        assert_eq!(f.feed("\x1b[A"), FieldEvent::None);
        assert_eq!(f.buffer(), "ab");
    }

    #[test]
    fn backspace_edits() {
        let mut f = FieldEditor::new(10);
        f.feed("abc");
        assert_eq!(f.feed("\x7f"), FieldEvent::Echo(BACKSPACE_ECHO.into()));
        assert_eq!(f.feed("\x08"), FieldEvent::Echo(BACKSPACE_ECHO.into()));
        assert_eq!(f.buffer(), "a");
        f.feed("\x08\x08");
        assert_eq!(f.feed("\x08"), FieldEvent::None);
    }

    #[test]
    fn length_is_capped() {
        let mut f = FieldEditor::new(3);
        f.feed("abcdef");
        assert_eq!(f.buffer(), "abc");
        assert_eq!(f.feed("x"), FieldEvent::None);
    }

    #[test]
    fn mask_hides_input() {
        let mut f = FieldEditor::masked(10, '*');
        assert_eq!(f.feed("pw"), FieldEvent::Echo("**".into()));
        assert_eq!(f.feed("\r"), FieldEvent::Submitted("pw".into()));
    }

    #[test]
    fn empty_enter_submits_empty() {
        let mut f = FieldEditor::new(3);
        assert_eq!(f.feed("\r"), FieldEvent::Submitted(String::new()));
    }
}
