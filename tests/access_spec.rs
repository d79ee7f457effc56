use termgate::access::AccessEvaluator;
use termgate::models::user::{FlagBank, SecurityRecord};

fn caller(level: u32) -> SecurityRecord {
    SecurityRecord::with_level(level)
}

#[test]
fn level_gate() {
    let acs = AccessEvaluator::new();
    assert!(acs.check("LEVEL:50", Some(&caller(50))));
    assert!(acs.check("LEVEL:50", Some(&caller(255))));
    assert!(!acs.check("LEVEL:50", Some(&caller(49))));
}

#[test]
fn or_and_and() {
    let acs = AccessEvaluator::new();
    let mut sec = caller(10);

    assert!(!acs.check("LEVEL:50|FLAG3", Some(&sec)));
    sec.set_flag(FlagBank::Primary, 3, true);
    assert!(acs.check("LEVEL:50|FLAG3", Some(&sec)));

    // both halves of one alternative must hold
    assert!(!acs.check("LEVEL:50 FLAG3", Some(&sec)));
    assert!(acs.check("LEVEL:10 & FLAG3", Some(&sec)));
}

#[test]
fn letter_flags_match_numbered_bits() {
    let acs = AccessEvaluator::new();
    let mut sec = caller(10);
    sec.set_flag(FlagBank::Primary, 2, true);

    assert!(acs.check("FLAG:C", Some(&sec)));
    assert!(acs.check("FLAG2", Some(&sec)));
    assert!(!acs.check("XFLAG:C", Some(&sec)));
}

#[test]
fn negated_attribute() {
    let acs = AccessEvaluator::new();
    let mut sec = caller(10);
    sec.ansi = false;
    assert!(acs.check("!ANSI", Some(&sec)));
    sec.ansi = true;
    assert!(!acs.check("!ANSI", Some(&sec)));
}

#[test]
fn unknown_codes_deny() {
    let acs = AccessEvaluator::new();
    let sec = caller(255);
    assert!(!acs.check("BOGUS", Some(&sec)));
    assert!(!acs.check("!BOGUS", Some(&sec)));
    // another alternative can still grant
    assert!(acs.check("BOGUS|LEVEL:1", Some(&sec)));
}

#[test]
fn empty_string_allows_everyone() {
    let acs = AccessEvaluator::new();
    assert!(acs.check("", Some(&caller(0))));
    assert!(acs.check("   ", None));
    assert!(!acs.check("LEVEL:1", None));
}
