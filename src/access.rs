//! Access condition strings (ACS).
//!
//! An ACS is a boolean expression over a user's [`SecurityRecord`](crate::models::user::SecurityRecord):
//! alternatives separated by `|` are OR-ed, codes inside one alternative are AND-ed.
//! [`lexer::parse`] turns the text into an [`AccessExpression`], the [`AccessEvaluator`]
//! answers allow/deny for it.

pub mod evaluator;
pub mod expr;
pub mod lexer;

pub use evaluator::AccessEvaluator;
pub use expr::{AccessExpression, Alternative, Attribute, Condition, flag_letters};
