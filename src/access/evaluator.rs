use crate::access::expr::{AccessExpression, Alternative, Attribute, Condition};
use crate::access::lexer;
use crate::models::user::SecurityRecord;
use dashmap::DashMap;
use std::sync::Arc;

/// Distinct access strings kept parsed. Menus carry a few dozen; anything past
/// this is churn from editing, so the cache just starts over.
const MAX_CACHED: usize = 1024;

/// Decides allow/deny for access expressions.
///
/// Evaluation never mutates the record. Parsed expressions are cached by their
/// source text, so the evaluator is meant to be shared between sessions.
#[derive(Debug, Default)]
pub struct AccessEvaluator {
    cache: DashMap<String, Arc<AccessExpression>>,
}

impl AccessEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `acs`, or returns the cached parse of it.
    pub fn expression(&self, acs: &str) -> Arc<AccessExpression> {
        let key = acs.trim();
        if let Some(expr) = self.cache.get(key) {
            return expr.clone();
        }
        let expr = Arc::new(lexer::parse(key));
        if self.cache.len() >= MAX_CACHED {
            tracing::debug!(entries = self.cache.len(), "access cache full, clearing");
            self.cache.clear();
        }
        self.cache.insert(key.to_string(), expr.clone());
        expr
    }

    /// Checks an access string for a (possibly anonymous) user.
    ///
    /// An empty access string allows everyone, including callers that have not
    /// logged on. Anything else requires a record.
    pub fn check(&self, acs: &str, record: Option<&SecurityRecord>) -> bool {
        let expr = self.expression(acs);
        if expr.is_empty() {
            return true;
        }
        match record {
            Some(record) => self.evaluate(&expr, record),
            None => false,
        }
    }

    /// True as soon as one alternative is fully satisfied. An expression without
    /// alternatives allows.
    pub fn evaluate(&self, expr: &AccessExpression, record: &SecurityRecord) -> bool {
        if expr.is_empty() {
            return true;
        }
        expr.alternatives().iter().any(|alt| alternative_holds(alt, record))
    }
}

fn alternative_holds(alt: &Alternative, record: &SecurityRecord) -> bool {
    // Walk every code so each unknown one gets reported, not just the first.
    let mut holds = !alt.0.is_empty();
    for code in &alt.0 {
        if !condition_holds(code, record) {
            holds = false;
        }
    }
    holds
}

fn condition_holds(code: &Condition, record: &SecurityRecord) -> bool {
    match code {
        Condition::Level(n) => record.level >= *n,
        Condition::FileLevel(n) => record.file_level >= *n,
        Condition::MessageLevel(n) => record.message_level >= *n,
        Condition::Flag { bank, bit } => record.flag(*bank, *bit),
        Condition::Attribute(attr) => attribute_holds(*attr, record),
        Condition::Not(inner) => {
            if inner.is_unknown() {
                tracing::warn!(code = %inner, "unknown ACS code under negation, denying");
                return false;
            }
            !condition_holds(inner, record)
        }
        Condition::Unknown(raw) => {
            tracing::warn!(code = %raw, "unknown ACS code, denying");
            false
        }
    }
}

fn attribute_holds(attr: Attribute, record: &SecurityRecord) -> bool {
    match attr {
        Attribute::Ansi => record.ansi,
        Attribute::Wanted => record.wanted,
        Attribute::NoTimeLimit => record.ignore_time_limit,
        Attribute::Vt100 => record.backspace_vt100,
        Attribute::ClearScroll => record.clear_or_scroll,
        Attribute::Pause => record.do_pause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::FlagBank;

    fn rec(level: u32) -> SecurityRecord {
        SecurityRecord::with_level(level)
    }

    #[test]
    fn level_threshold() {
        let ev = AccessEvaluator::new();
        assert!(ev.check("LEVEL:50", Some(&rec(50))));
        assert!(ev.check("LEVEL:50", Some(&rec(51))));
        assert!(!ev.check("LEVEL:50", Some(&rec(49))));
    }

    #[test]
    fn or_of_alternatives() {
        let ev = AccessEvaluator::new();
        let mut r = rec(10);
        assert!(!ev.check("LEVEL:50|WANTED", Some(&r)));
        r.wanted = true;
        assert!(ev.check("LEVEL:50|WANTED", Some(&r)));
        assert!(ev.check("LEVEL:5|WANTED", Some(&rec(10))));
    }

    #[test]
    fn and_within_alternative() {
        let ev = AccessEvaluator::new();
        let mut r = rec(60);
        r.ansi = false;
        assert!(!ev.check("LEVEL:50 ANSI", Some(&r)));
        r.ansi = true;
        assert!(ev.check("LEVEL:50 ANSI", Some(&r)));
    }

    #[test]
    fn flag_bit_three() {
        let ev = AccessEvaluator::new();
        let mut r = rec(0);
        r.set_flag(FlagBank::Primary, 3, true);
        assert!(ev.check("FLAG3", Some(&r)));
        r.set_flag(FlagBank::Primary, 3, false);
        assert!(!ev.check("FLAG3", Some(&r)));
    }

    #[test]
    fn letter_and_number_flags_agree() {
        let ev = AccessEvaluator::new();
        let mut r = rec(0);
        r.set_flag(FlagBank::Secondary, 2, true);
        assert!(ev.check("XFLAG:C", Some(&r)));
        assert!(ev.check("XFLAG2", Some(&r)));
        assert!(!ev.check("FLAG:C", Some(&r)));
    }

    #[test]
    fn unknown_code_fails_its_clause_only() {
        let ev = AccessEvaluator::new();
        let r = rec(255);
        assert!(!ev.check("ZZZ", Some(&r)));
        assert!(!ev.check("LEVEL:1 ZZZ", Some(&r)));
        assert!(!ev.check("!ZZZ", Some(&r)));
        assert!(ev.check("ZZZ|LEVEL:1", Some(&r)));
    }

    #[test]
    fn negation() {
        let ev = AccessEvaluator::new();
        let mut r = rec(10);
        assert!(ev.check("!WANTED", Some(&r)));
        r.wanted = true;
        assert!(!ev.check("!WANTED", Some(&r)));
    }

    #[test]
    fn empty_expression_allows() {
        let ev = AccessEvaluator::new();
        assert!(ev.check("", Some(&rec(0))));
        assert!(ev.check("", None));
        assert!(ev.evaluate(&AccessExpression::open(), &rec(0)));
    }

    #[test]
    fn gated_expression_without_user_denies() {
        let ev = AccessEvaluator::new();
        assert!(!ev.check("LEVEL:0", None));
    }

    #[test]
    fn evaluation_leaves_record_untouched() {
        let ev = AccessEvaluator::new();
        let r = rec(42);
        let before = r.clone();
        let _ = ev.check("LEVEL:50|FLAG3|!ANSI|ZZZ", Some(&r));
        assert_eq!(r, before);
    }

    #[test]
    fn parses_are_cached() {
        let ev = AccessEvaluator::new();
        let a = ev.expression("LEVEL:5");
        let b = ev.expression(" LEVEL:5 ");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn cache_stays_bounded() {
        let ev = AccessEvaluator::new();
        for n in 0..MAX_CACHED * 3 {
            ev.expression(&format!("LEVEL:{n}"));
        }
        assert!(ev.cache.len() <= MAX_CACHED);
        assert!(ev.check("LEVEL:5", Some(&rec(5))));
    }
}
