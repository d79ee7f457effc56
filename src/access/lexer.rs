//! Turns a human written access string into an [`AccessExpression`].
//!
//! ```text
//!   "LEVEL:50"             level 50 or better
//!   "S50 ANSI"             level 50 and an ANSI terminal
//!   "FLAG3 & !WANTED"      flag bit 3 set and not flagged as wanted
//!   "FLAG:C|LEVEL:255"     flag C (bit 2) set, or sysop level
//! ```
//!
//! Codes are case-insensitive. Anything not in the table lexes to
//! [`Condition::Unknown`] so the evaluator can refuse it.

use crate::access::expr::{AccessExpression, Alternative, Attribute, Condition};
use crate::models::user::{FLAG_BITS, FlagBank};
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<kw>LEVEL|FLEVEL|MLEVEL):(?P<n>\d+)|S(?P<s>\d+)|(?P<bank>X?FLAG)(?::(?P<letter>[A-Z])|(?P<bit>\d+)))$",
    )
    .expect("valid ACS code regex")
});

/// Separator between OR-ed alternatives.
pub const OR_DELIMITER: char = '|';

pub fn parse(src: &str) -> AccessExpression {
    let alternatives = src
        .split(OR_DELIMITER)
        .map(parse_alternative)
        .filter(|alt| !alt.0.is_empty())
        .collect();

    AccessExpression::new(alternatives)
}

fn parse_alternative(src: &str) -> Alternative {
    Alternative(
        src.split(|c: char| c.is_whitespace() || c == '&')
            .filter(|t| !t.is_empty())
            .map(parse_code)
            .collect(),
    )
}

pub fn parse_code(raw: &str) -> Condition {
    let upper = raw.trim().to_ascii_uppercase();

    if let Some(rest) = upper.strip_prefix('!') {
        return match parse_code(rest) {
            // A negated unknown must not turn into a grant
            Condition::Unknown(_) => Condition::Unknown(upper),
            inner => Condition::Not(Box::new(inner)),
        };
    }

    if let Some(attr) = Attribute::from_code(&upper) {
        return Condition::Attribute(attr);
    }

    let Some(caps) = CODE_RE.captures(&upper) else {
        return Condition::Unknown(upper);
    };

    if let Some(kw) = caps.name("kw") {
        let Ok(n) = caps["n"].parse::<u32>() else {
            return Condition::Unknown(upper);
        };
        return match kw.as_str() {
            "LEVEL" => Condition::Level(n),
            "FLEVEL" => Condition::FileLevel(n),
            _ => Condition::MessageLevel(n),
        };
    }

    if let Some(s) = caps.name("s") {
        return match s.as_str().parse::<u32>() {
            Ok(n) => Condition::Level(n),
            Err(_) => Condition::Unknown(upper),
        };
    }

    let bank = match caps.name("bank").map(|m| m.as_str()) {
        Some("XFLAG") => FlagBank::Secondary,
        _ => FlagBank::Primary,
    };

    let bit = if let Some(letter) = caps.name("letter") {
        Some(letter.as_str().as_bytes()[0] - b'A')
    } else {
        caps.name("bit").and_then(|m| m.as_str().parse::<u8>().ok())
    };

    match bit {
        Some(bit) if bit < FLAG_BITS => Condition::Flag { bank, bit },
        _ => Condition::Unknown(upper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_codes() {
        assert_eq!(parse_code("LEVEL:50"), Condition::Level(50));
        assert_eq!(parse_code("level:50"), Condition::Level(50));
        assert_eq!(parse_code("S20"), Condition::Level(20));
        assert_eq!(parse_code("FLEVEL:5"), Condition::FileLevel(5));
        assert_eq!(parse_code("MLEVEL:7"), Condition::MessageLevel(7));
    }

    #[test]
    fn flag_codes() {
        assert_eq!(parse_code("FLAG3"), Condition::Flag { bank: FlagBank::Primary, bit: 3 });
        assert_eq!(parse_code("FLAG:C"), Condition::Flag { bank: FlagBank::Primary, bit: 2 });
        assert_eq!(parse_code("xflag:a"), Condition::Flag { bank: FlagBank::Secondary, bit: 0 });
        assert_eq!(parse_code("FLAG31"), Condition::Flag { bank: FlagBank::Primary, bit: 31 });
    }

    #[test]
    fn out_of_range_and_garbage_are_unknown() {
        assert!(parse_code("FLAG32").is_unknown());
        assert!(parse_code("FLAG999").is_unknown());
        assert!(parse_code("LEVEL:99999999999999").is_unknown());
        assert!(parse_code("ZZZ").is_unknown());
        assert!(parse_code("LEVEL:").is_unknown());
    }

    #[test]
    fn negation() {
        assert_eq!(
            parse_code("!ANSI"),
            Condition::Not(Box::new(Condition::Attribute(Attribute::Ansi)))
        );
        assert_eq!(parse_code("!ZZZ"), Condition::Unknown("!ZZZ".into()));
    }

    #[test]
    fn alternatives_and_conjunctions() {
        let expr = parse("LEVEL:50 ANSI | FLAG3&WANTED");
        assert_eq!(expr.alternatives().len(), 2);
        assert_eq!(expr.alternatives()[0].0.len(), 2);
        assert_eq!(expr.alternatives()[1].0.len(), 2);
    }

    #[test]
    fn blank_input_is_open() {
        assert!(parse("").is_empty());
        assert!(parse("   ").is_empty());
        assert!(parse("|").is_empty());
    }

    #[test]
    fn empty_alternatives_are_dropped() {
        let expr = parse("LEVEL:10||");
        assert_eq!(expr.alternatives().len(), 1);
    }
}
