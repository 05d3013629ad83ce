//! `key OP literal` comparisons against stored variables.
//!
//! Grammar: `<key> <op> <literal>` with `<op>` one of `==`, `!=`, `>=`, `<=`,
//! `>`, `<`; whitespace around the operator is ignored. A missing key reads
//! as `"0"`. Equality operators compare strings, ordering operators compare
//! both sides as floating point (an unparsable side never satisfies them).
//!
//! Malformed expressions are permissive: they evaluate to `true` so that a
//! gated command still runs. [`check`] reports the parse failure alongside
//! the verdict so the caller can record it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorSeverity, GameError};
use crate::store::KeyValueStore;

/// Value substituted for a key that has never been written.
pub const MISSING_VALUE: &str = "0";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition '{expr}' has no comparison operator")]
    MissingOperator { expr: String },

    #[error("condition '{expr}' has {count} comparison operators, expected one")]
    TooManyOperators { expr: String, count: usize },

    #[error("condition '{expr}' is missing an operand")]
    MissingOperand { expr: String },
}

impl GameError for ConditionError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingOperator { .. } => "CONDITION_MISSING_OPERATOR",
            Self::TooManyOperators { .. } => "CONDITION_TOO_MANY_OPERATORS",
            Self::MissingOperand { .. } => "CONDITION_MISSING_OPERAND",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl ComparisonOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            _ => None,
        }
    }

    /// Applies the operator to two ordered values.
    pub fn compare<T: PartialOrd + PartialEq>(self, left: T, right: T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Ge => left >= right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Lt => left < right,
        }
    }

    /// Scans `expr` for an operator token starting at byte `at`.
    fn scan(expr: &[u8], at: usize) -> Option<(Self, usize)> {
        let pair = expr.get(at..at + 2);
        let op = match pair {
            Some(b"==") => Some((Self::Eq, 2)),
            Some(b"!=") => Some((Self::Ne, 2)),
            Some(b">=") => Some((Self::Ge, 2)),
            Some(b"<=") => Some((Self::Le, 2)),
            _ => None,
        };
        op.or_else(|| match expr.get(at) {
            Some(b'>') => Some((Self::Gt, 1)),
            Some(b'<') => Some((Self::Lt, 1)),
            _ => None,
        })
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed `key OP literal` expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub key: String,
    pub op: ComparisonOp,
    pub literal: String,
}

impl Condition {
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let bytes = expr.as_bytes();
        let mut found = Vec::new();
        let mut at = 0;
        while at < bytes.len() {
            match ComparisonOp::scan(bytes, at) {
                Some((op, width)) => {
                    found.push((op, at, width));
                    at += width;
                }
                None => at += 1,
            }
        }

        let (op, start, width) = match found.as_slice() {
            [] => {
                return Err(ConditionError::MissingOperator {
                    expr: expr.to_owned(),
                });
            }
            [single] => *single,
            many => {
                return Err(ConditionError::TooManyOperators {
                    expr: expr.to_owned(),
                    count: many.len(),
                });
            }
        };

        let key = expr[..start].trim();
        let literal = expr[start + width..].trim();
        if key.is_empty() || literal.is_empty() {
            return Err(ConditionError::MissingOperand {
                expr: expr.to_owned(),
            });
        }

        Ok(Self {
            key: key.to_owned(),
            op,
            literal: literal.to_owned(),
        })
    }

    /// Evaluates against the current store contents. Never writes.
    pub fn evaluate(&self, store: &dyn KeyValueStore) -> bool {
        let current = store
            .get(&self.key)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| MISSING_VALUE.to_owned());

        match self.op {
            ComparisonOp::Eq | ComparisonOp::Ne => {
                self.op.compare(current.as_str(), self.literal.as_str())
            }
            ordering => {
                // NaN on either side fails every ordering comparison.
                let left = parse_float(&current);
                let right = parse_float(&self.literal);
                ordering.compare(left, right)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.op, self.literal)
    }
}

/// Reads the longest leading decimal number, so `"3px"` is 3 and `"px3"`
/// is NaN.
fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if text[end..].starts_with("Infinity") {
        return text[..end + "Infinity".len()].parse().unwrap_or(f64::NAN);
    }

    let int_digits = digits(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_digits = digits(exponent);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
        }
    }

    text[..end].parse().unwrap_or(f64::NAN)
}

/// Outcome of checking an optional gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// The expression did not parse; treated as passing.
    Permissive(ConditionError),
}

impl Verdict {
    pub fn allows(&self) -> bool {
        !matches!(self, Self::Fail)
    }
}

/// Checks an optional condition. Absent or blank conditions always pass.
pub fn check(condition: Option<&str>, store: &dyn KeyValueStore) -> Verdict {
    let Some(expr) = condition.filter(|expr| !expr.trim().is_empty()) else {
        return Verdict::Pass;
    };

    match Condition::parse(expr) {
        Ok(parsed) if parsed.evaluate(store) => Verdict::Pass,
        Ok(_) => Verdict::Fail,
        Err(err) => Verdict::Permissive(err),
    }
}

/// Evaluates `expr`, defaulting to `true` when it is malformed.
pub fn evaluate(expr: &str, store: &dyn KeyValueStore) -> bool {
    check(Some(expr), store).allows()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn numeric_comparison_against_store() {
        let store = InMemoryStore::with_entries([("story.main", "3")]);
        assert!(evaluate("story.main >= 2", &store));

        let store = InMemoryStore::with_entries([("story.main", "1")]);
        assert!(!evaluate("story.main >= 2", &store));

        let store = InMemoryStore::new();
        assert!(!evaluate("story.main >= 2", &store));
    }

    #[test]
    fn equality_compares_strings() {
        let store = InMemoryStore::with_entries([("hero", "ann"), ("level", "2.0")]);
        assert!(evaluate("hero == ann", &store));
        assert!(evaluate("hero != bo", &store));
        assert!(!evaluate("level == 2", &store));
        assert!(evaluate("missing == 0", &store));
    }

    #[test]
    fn whitespace_is_optional() {
        let store = InMemoryStore::with_entries([("gold", "10")]);
        assert!(evaluate("gold>5", &store));
        assert!(evaluate("  gold   <=10 ", &store));
        assert!(!evaluate("gold<10", &store));
    }

    #[test]
    fn malformed_expressions_are_permissive() {
        let store = InMemoryStore::new();
        assert!(evaluate("just words", &store));
        assert!(evaluate("a == b == c", &store));
        assert!(evaluate("== 1", &store));

        assert!(matches!(
            check(Some("a = 1"), &store),
            Verdict::Permissive(ConditionError::MissingOperator { .. })
        ));
        assert!(matches!(
            check(Some("a < b > c"), &store),
            Verdict::Permissive(ConditionError::TooManyOperators { count: 2, .. })
        ));
    }

    #[test]
    fn absent_condition_passes() {
        let store = InMemoryStore::new();
        assert_eq!(check(None, &store), Verdict::Pass);
        assert_eq!(check(Some("   "), &store), Verdict::Pass);
    }

    #[test]
    fn non_numeric_ordering_fails() {
        let store = InMemoryStore::with_entries([("name", "ann")]);
        assert!(!evaluate("name > 1", &store));
        assert!(!evaluate("name <= 1", &store));
    }

    #[test]
    fn ordering_reads_leading_numeric_prefix() {
        let store = InMemoryStore::with_entries([("story.main", "3px")]);
        assert!(evaluate("story.main >= 2", &store));
        assert!(!evaluate("story.main > 3", &store));

        let store = InMemoryStore::with_entries([("story.main", "px3")]);
        assert!(!evaluate("story.main >= 2", &store));
    }

    #[test]
    fn float_prefixes() {
        assert_eq!(parse_float(" 2.5kg"), 2.5);
        assert_eq!(parse_float("-.5"), -0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("4e"), 4.0);
        assert_eq!(parse_float("7."), 7.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
        assert!(parse_float("").is_nan());
    }

    #[test]
    fn evaluation_does_not_write() {
        let store = InMemoryStore::new();
        let _ = evaluate("x >= 1", &store);
        assert!(store.is_empty());
    }

    #[test]
    fn parse_splits_two_char_operators_first() {
        let parsed = Condition::parse("story.main>=2").unwrap();
        assert_eq!(parsed.key, "story.main");
        assert_eq!(parsed.op, ComparisonOp::Ge);
        assert_eq!(parsed.literal, "2");
        assert_eq!(parsed.to_string(), "story.main >= 2");
    }
}
