use crate::models::user::FlagBank;
use std::fmt;

/// Named boolean attributes of a security record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Ansi,
    Wanted,
    NoTimeLimit,
    Vt100,
    ClearScroll,
    Pause,
}

impl Attribute {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ANSI" => Some(Self::Ansi),
            "WANTED" => Some(Self::Wanted),
            "NOTIMELIMIT" => Some(Self::NoTimeLimit),
            "VT100" => Some(Self::Vt100),
            "CLEARSCROLL" => Some(Self::ClearScroll),
            "PAUSE" => Some(Self::Pause),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Ansi => "ANSI",
            Self::Wanted => "WANTED",
            Self::NoTimeLimit => "NOTIMELIMIT",
            Self::Vt100 => "VT100",
            Self::ClearScroll => "CLEARSCROLL",
            Self::Pause => "PAUSE",
        }
    }
}

/// One condition code, classified by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `level >= n`
    Level(u32),
    /// `file_level >= n`
    FileLevel(u32),
    /// `message_level >= n`
    MessageLevel(u32),
    /// A bit in one of the control flag banks is set
    Flag { bank: FlagBank, bit: u8 },
    Attribute(Attribute),
    Not(Box<Condition>),
    /// Anything the lexer did not recognise. Never satisfied.
    Unknown(String),
}

impl Condition {
    /// True when this code, or the code it negates, is unknown.
    pub fn is_unknown(&self) -> bool {
        match self {
            Self::Unknown(_) => true,
            Self::Not(inner) => inner.is_unknown(),
            _ => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(n) => write!(f, "LEVEL:{n}"),
            Self::FileLevel(n) => write!(f, "FLEVEL:{n}"),
            Self::MessageLevel(n) => write!(f, "MLEVEL:{n}"),
            Self::Flag { bank: FlagBank::Primary, bit } => write!(f, "FLAG{bit}"),
            Self::Flag { bank: FlagBank::Secondary, bit } => write!(f, "XFLAG{bit}"),
            Self::Attribute(a) => f.write_str(a.as_code()),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Codes that must all hold.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alternative(pub Vec<Condition>);

/// Alternatives of which one must hold. No alternatives at all means the expression
/// does not restrict anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessExpression {
    alternatives: Vec<Alternative>,
}

impl AccessExpression {
    pub fn new(alternatives: Vec<Alternative>) -> Self {
        Self { alternatives }
    }

    /// The expression that gates nothing.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

impl fmt::Display for AccessExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alt) in self.alternatives.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            for (j, code) in alt.0.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{code}")?;
            }
        }
        Ok(())
    }
}

/// Renders a flag bank as letters: bit 0 is `A`, cleared bits show as `-`.
/// Only the 26 lettered bits are shown.
pub fn flag_letters(bits: u32) -> String {
    (0u8..26)
        .map(|bit| if bits & (1 << bit) != 0 { (b'A' + bit) as char } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_letters_marks_set_bits() {
        assert_eq!(flag_letters(0), "-".repeat(26));
        let s = flag_letters(0b101);
        assert!(s.starts_with("A-C-"));
        assert_eq!(s.len(), 26);
    }

    #[test]
    fn display_is_canonical() {
        let expr = AccessExpression::new(vec![
            Alternative(vec![Condition::Level(50), Condition::Attribute(Attribute::Ansi)]),
            Alternative(vec![Condition::Not(Box::new(Condition::Flag { bank: FlagBank::Secondary, bit: 2 }))]),
        ]);
        assert_eq!(expr.to_string(), "LEVEL:50 ANSI|!XFLAG2");
    }
}
