//! Pipe-code presentation.
//!
//! The engine and modules build prompts with inline pipe codes and hand them to a
//! [`Presenter`]; nothing else looks inside the markup.
//!
//! | code          | effect                                 |
//! |---------------|----------------------------------------|
//! | `|00`..`|15`  | foreground colour (DOS palette order)  |
//! | `|16`..`|23`  | background colour                      |
//! | `|CR`         | new line                               |
//! | `|CS`         | clear screen, cursor home              |
//! | `|CL`         | clear to end of line                   |
//! | `||`          | a literal `|`                          |
//!
//! Unknown codes are left in the text untouched. Text that did not come from a
//! prompt (user data, ACS strings) goes through [`escape_pipes`] first.

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const CLEAR_LINE: &str = "\x1b[K";

/// Renders markup to bytes for the wire.
pub trait Presenter: Send + Sync {
    fn render(&self, markup: &str) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct PipePresenter {
    /// Emit colour sequences. Without it colour codes are dropped.
    pub ansi: bool,
}

impl Default for PipePresenter {
    fn default() -> Self {
        Self { ansi: true }
    }
}

impl Presenter for PipePresenter {
    fn render(&self, markup: &str) -> String {
        let mut out = String::with_capacity(markup.len() + 16);
        let mut rest = markup;

        while let Some(pos) = rest.find('|') {
            push_text(&mut out, &rest[..pos]);
            if rest[pos + 1..].starts_with('|') {
                out.push('|');
                rest = &rest[pos + 2..];
                continue;
            }
            let code = rest.get(pos + 1..pos + 3);
            match code.and_then(|c| self.expand(c)) {
                Some(seq) => {
                    out.push_str(seq);
                    rest = &rest[pos + 3..];
                }
                None => {
                    out.push('|');
                    rest = &rest[pos + 1..];
                }
            }
        }
        push_text(&mut out, rest);
        out
    }
}

impl PipePresenter {
    fn expand(&self, code: &str) -> Option<&'static str> {
        match code {
            "CR" => Some("\r\n"),
            "CS" => Some(CLEAR_SCREEN),
            "CL" => Some(CLEAR_LINE),
            _ => {
                let n: u8 = code.parse().ok()?;
                if !code.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let seq = pipe_color(n)?;
                Some(if self.ansi { seq } else { "" })
            }
        }
    }
}

/// Bare `\n` becomes `\r\n` on the way out.
fn push_text(out: &mut String, text: &str) {
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
}

fn pipe_color(n: u8) -> Option<&'static str> {
    Some(match n {
        0 => "\x1b[0;30m",
        1 => "\x1b[0;34m",
        2 => "\x1b[0;32m",
        3 => "\x1b[0;36m",
        4 => "\x1b[0;31m",
        5 => "\x1b[0;35m",
        6 => "\x1b[0;33m",
        7 => "\x1b[0;37m",
        8 => "\x1b[1;30m",
        9 => "\x1b[1;34m",
        10 => "\x1b[1;32m",
        11 => "\x1b[1;36m",
        12 => "\x1b[1;31m",
        13 => "\x1b[1;35m",
        14 => "\x1b[1;33m",
        15 => "\x1b[1;37m",
        16 => "\x1b[40m",
        17 => "\x1b[44m",
        18 => "\x1b[42m",
        19 => "\x1b[46m",
        20 => "\x1b[41m",
        21 => "\x1b[45m",
        22 => "\x1b[43m",
        23 => "\x1b[47m",
        _ => return None,
    })
}

/// Makes arbitrary text safe to embed in markup: every `|` is doubled so the
/// presenter shows it instead of reading a code.
pub fn escape_pipes(text: &str) -> String {
    text.replace('|', "||")
}

/// Pads `s` with spaces to `width` visible columns, ignoring pipe colour codes.
pub fn right_pad(s: &str, width: usize) -> String {
    let visible = visible_len(s);
    if visible >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - visible))
}

fn visible_len(s: &str) -> usize {
    let chars: Vec<char> = s.chars().collect();
    let mut n = 0;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '|' && chars.get(i + 1) == Some(&'|') {
            n += 1;
            i += 2;
            continue;
        }
        let is_code = chars[i] == '|'
            && chars.get(i + 1).is_some_and(char::is_ascii_digit)
            && chars.get(i + 2).is_some_and(char::is_ascii_digit);
        if is_code {
            i += 3;
        } else {
            n += 1;
            i += 1;
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_and_layout_codes() {
        let p = PipePresenter::default();
        assert_eq!(p.render("|15Hi|CR"), "\x1b[1;37mHi\r\n");
        assert_eq!(p.render("|CS"), CLEAR_SCREEN);
        assert_eq!(p.render("|20x"), "\x1b[41mx");
    }

    #[test]
    fn unknown_codes_pass_through() {
        let p = PipePresenter::default();
        assert_eq!(p.render("a|ZZb"), "a|ZZb");
        assert_eq!(p.render("|99"), "|99");
        assert_eq!(p.render("end|"), "end|");
        assert_eq!(p.render("x | y"), "x | y");
    }

    #[test]
    fn escaped_data_is_shown_verbatim() {
        let p = PipePresenter::default();
        let acs = escape_pipes("LEVEL:50|CL|FLAG3");
        assert_eq!(p.render(&format!("|07{acs}")), "\x1b[0;37mLEVEL:50|CL|FLAG3");
        assert_eq!(p.render("a||b"), "a|b");
        assert_eq!(right_pad(&escape_pipes("a|b"), 5), "a||b  ");
    }

    #[test]
    fn plain_mode_drops_colour_keeps_layout() {
        let p = PipePresenter { ansi: false };
        assert_eq!(p.render("|03Hi|CR"), "Hi\r\n");
    }

    #[test]
    fn newlines_become_crlf() {
        let p = PipePresenter::default();
        assert_eq!(p.render("a\nb\r\nc"), "a\r\nb\r\nc");
    }

    #[test]
    fn padding_ignores_colour_codes() {
        assert_eq!(right_pad("|03ab", 4), "|03ab  ");
        assert_eq!(right_pad("abcdef", 4), "abcdef");
    }
}
