//! The filter sub-language evaluated inside `[?(...)]` steps.
//!
//! Expressions are split on logical connectives outside parentheses, then
//! recognized by shape: regex match, comparison, existence. Operands that
//! fail to resolve (missing sub-path, unparseable literal) make their
//! enclosing predicate false rather than raising; only unparsable
//! expressions and broken regexes surface as `InvalidFilter`.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::engine::{Engine, QueryOptions};
use crate::errors::{Error, ErrorCode, Result};
use crate::tokenizer::{tokenize, unquote};

/// Recursive-descent cap for `@`-relative sub-queries, so a filter cannot
/// nest pathological descents inside operand resolution.
const OPERAND_MAX_DEPTH: usize = 10;

/// Shape of `operand =~ /pattern/flags`. Flags are validated separately so
/// that unknown letters can be reported instead of silently accepted.
static REGEX_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*=~\s*/(.+)/([A-Za-z]*)$").expect("regex form pattern"));

/// Shape of `lhs op rhs` with a non-greedy left capture, so the split lands
/// on the first comparison operator.
static COMPARE_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*(==|!=|<=|>=|<|>)\s*(.+)$").expect("compare form pattern"));

/// Decide whether `expr` holds for the candidate `node`.
pub(crate) fn matches(node: &Value, expr: &str) -> Result<bool> {
    let expr = expr.trim();

    // `||` binds loosest; both scans skip parenthesized regions
    if let Some(idx) = find_logical_op(expr, "||") {
        if matches(node, &expr[..idx])? {
            return Ok(true);
        }
        return matches(node, &expr[idx + 2..]);
    }
    if let Some(idx) = find_logical_op(expr, "&&") {
        if !matches(node, &expr[..idx])? {
            return Ok(false);
        }
        return matches(node, &expr[idx + 2..]);
    }

    if expr.starts_with('(') && expr.ends_with(')') {
        return matches(node, &expr[1..expr.len() - 1]);
    }

    if let Some(caps) = REGEX_FORM.captures(expr) {
        return eval_regex(node, &caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = COMPARE_FORM.captures(expr) {
        return Ok(
            match (resolve_operand(node, &caps[1]), resolve_operand(node, &caps[3])) {
                (Some(lhs), Some(rhs)) => compare(&lhs, &caps[2], &rhs),
                _ => false,
            },
        );
    }

    // existence: a lone @-path resolving to a non-null value
    if expr.starts_with('@') {
        return Ok(matches!(resolve_operand(node, expr), Some(v) if !v.is_null()));
    }

    Err(Error::new(
        ErrorCode::InvalidFilter,
        format!("cannot parse filter expression: {expr}"),
    ))
}

fn eval_regex(node: &Value, operand: &str, pattern: &str, flags: &str) -> Result<bool> {
    if let Some(bad) = flags.chars().find(|c| !"gimsuy".contains(*c)) {
        return Err(Error::new(
            ErrorCode::InvalidFilter,
            format!("unsupported regex flag '{bad}'"),
        ));
    }
    // the gimsuy letters are surface-compatible but not interpreted
    let value = match resolve_operand(node, operand) {
        Some(value) => value,
        None => return Ok(false),
    };
    let subject = match value.as_str() {
        Some(subject) => subject,
        None => return Ok(false),
    };
    let re = Regex::new(pattern).map_err(|e| {
        Error::with_cause(
            ErrorCode::InvalidFilter,
            format!("invalid regex: /{pattern}/"),
            e,
        )
    })?;
    Ok(re.is_match(subject))
}

/// Position of `op` outside any parenthesized region, or `None`.
fn find_logical_op(expr: &str, op: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && expr[i..].starts_with(op) {
            return Some(i);
        }
    }
    None
}

/// Resolve an operand to a concrete value. `None` is a soft miss: the
/// caller treats the enclosing predicate as false.
fn resolve_operand(node: &Value, operand: &str) -> Option<Value> {
    let operand = operand.trim();

    if let Some(suffix) = operand.strip_prefix('@') {
        return resolve_current(node, suffix);
    }
    if let Some(inner) = unquote(operand) {
        return Some(Value::String(inner.to_string()));
    }
    match operand {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    operand.parse::<f64>().ok().map(Value::from)
}

/// Run a `@`-relative sub-path through the step evaluator with the current
/// candidate as root. First match wins; every failure is a miss.
fn resolve_current(node: &Value, suffix: &str) -> Option<Value> {
    let tokens = tokenize(&format!("${suffix}")).ok()?;
    let opts = QueryOptions::default().with_max_depth(OPERAND_MAX_DEPTH);
    let results = Engine::new(&opts, None).evaluate(node, &tokens, "$").ok()?;
    results.into_iter().next().map(|m| m.value.clone())
}

fn compare(lhs: &Value, op: &str, rhs: &Value) -> bool {
    let ord = match (numeric(lhs, rhs), numeric(rhs, lhs)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(render(lhs).cmp(&render(rhs))),
    };
    let ord = match ord {
        Some(ord) => ord,
        // NaN compares unequal to everything
        None => return op == "!=",
    };
    match op {
        "==" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        "<" => ord == Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        ">=" => ord != Ordering::Less,
        _ => false,
    }
}

/// A value's numeric reading. Strings participate only when the other side
/// is a number, so two strings still compare lexicographically.
fn numeric(value: &Value, other: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if other.is_number() => s.parse().ok(),
        _ => None,
    }
}

/// Canonical text of a value for lexicographic comparison: strings bare,
/// everything else as its JSON rendering.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn comparisons_on_current_path() {
        let item = json!({"price": 8.95, "category": "reference"});
        assert!(matches(&item, "@.price < 10").unwrap());
        assert!(!matches(&item, "@.price > 10").unwrap());
        assert!(matches(&item, "@.price != 9").unwrap());
        assert!(matches(&item, "@.category == 'reference'").unwrap());
        assert!(matches(&item, "@.category == \"reference\"").unwrap());
    }

    #[test]
    fn numeric_strings_promote_against_numbers() {
        let item = json!({"count": "10"});
        assert!(matches(&item, "@.count == 10").unwrap());
        assert!(matches(&item, "@.count > 9").unwrap());
    }

    #[test]
    fn two_strings_compare_lexicographically() {
        let item = json!({"a": "10", "b": "9"});
        assert!(matches(&item, "@.a < @.b").unwrap());
    }

    #[test]
    fn logical_connectives_and_parentheses() {
        let item = json!({"price": 8.99, "isbn": "0-553-21311-3"});
        assert!(matches(&item, "@.price > 8 && @.price < 10").unwrap());
        assert!(matches(&item, "@.price < 5 || @.isbn").unwrap());
        assert!(matches(&item, "(@.price < 5 || @.price > 8) && @.isbn").unwrap());
        assert!(!matches(&item, "(@.price < 5 || @.price > 9) && @.isbn").unwrap());
    }

    #[test]
    fn existence_requires_a_non_null_value() {
        assert!(matches(&json!({"isbn": "x"}), "@.isbn").unwrap());
        assert!(!matches(&json!({"isbn": null}), "@.isbn").unwrap());
        assert!(!matches(&json!({}), "@.isbn").unwrap());
    }

    #[test]
    fn null_literal_comparison() {
        assert!(matches(&json!({"a": null}), "@.a == null").unwrap());
        assert!(!matches(&json!({"a": 1}), "@.a == null").unwrap());
    }

    #[test]
    fn unresolved_operands_are_soft_misses() {
        let item = json!({"a": 1});
        assert!(!matches(&item, "@.missing == 1").unwrap());
        assert!(!matches(&item, "@.a == nonsense").unwrap());
    }

    #[test]
    fn regex_match() {
        let item = json!({"author": "J. R. R. Tolkien"});
        assert!(matches(&item, "@.author =~ /Tolkien$/").unwrap());
        assert!(!matches(&item, "@.author =~ /^Tolkien/").unwrap());
        // flag letters are accepted but not interpreted
        assert!(!matches(&item, "@.author =~ /tolkien/i").unwrap());
        assert!(matches(&item, "@.author =~ /Tolkien/g").unwrap());
    }

    #[test]
    fn regex_on_non_string_is_false_without_error() {
        assert!(!matches(&json!({"n": 5}), "@.n =~ /5/").unwrap());
    }

    #[test]
    fn broken_regex_is_a_filter_error() {
        let err = matches(&json!({"a": "x"}), "@.a =~ /(/").unwrap_err();
        assert!(err.is_filter_error());
    }

    #[test]
    fn unknown_flag_letter_is_a_filter_error() {
        let err = matches(&json!({"a": "x"}), "@.a =~ /x/z").unwrap_err();
        assert!(err.is_filter_error());
    }

    #[test]
    fn unparsable_expression_is_a_filter_error() {
        let err = matches(&json!({}), "nonsense").unwrap_err();
        assert!(err.is_filter_error());
        assert_eq!(
            err.message(),
            "cannot parse filter expression: nonsense"
        );
    }

    #[test]
    fn sub_path_resolution_takes_the_first_match() {
        let item = json!({"tags": ["alpha", "beta"]});
        assert!(matches(&item, "@.tags[0] == 'alpha'").unwrap());
        assert!(matches(&item, "@.tags[*] == 'alpha'").unwrap());
    }

    #[test]
    fn bare_at_resolves_to_the_candidate_itself() {
        assert!(matches(&json!("x"), "@ == 'x'").unwrap());
        assert!(matches(&json!(3), "@ > 2").unwrap());
    }

    #[test]
    fn logical_op_scan_skips_parenthesized_regions() {
        assert_eq!(find_logical_op("(a||b)&&c", "||"), None);
        assert_eq!(find_logical_op("(a||b)&&c", "&&"), Some(6));
    }
}
