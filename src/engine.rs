use itertools::Itertools;
use serde_json::{json, Map, Value};

use crate::cancel::CancelSignal;
use crate::errors::{Error, ErrorCode, Result};
use crate::filter;
use crate::tokenizer::{Token, Union};

/// Knobs controlling evaluation behavior.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Depth bound for recursive descent traversal. Zero disables the check.
    pub max_depth: usize,
    /// When true, absent keys, out-of-range indices and shape mismatches
    /// surface as typed errors instead of empty results.
    pub allow_missing_keys: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_depth: 100,
            allow_missing_keys: false,
        }
    }
}

impl QueryOptions {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_allow_missing_keys(mut self, strict: bool) -> Self {
        self.allow_missing_keys = strict;
        self
    }
}

/// A single query hit: the normalized location plus a reference into the
/// document. Values alias the document's subtrees; nothing is copied.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    /// Normalized path, built from `$` by appending `.name` and `[i]`
    /// fragments. The dotted form is emitted even for names that would not
    /// re-parse; treat it as advisory.
    pub path: String,
    /// The matched subtree.
    pub value: &'a Value,
}

impl Match<'_> {
    /// Render as `{"path": <string>, "value": <subtree>}`.
    pub fn to_json(&self) -> Value {
        json!({ "path": self.path, "value": self.value })
    }

    /// Detach from the document by cloning the matched subtree.
    pub fn into_owned(self) -> OwnedMatch {
        OwnedMatch {
            path: self.path,
            value: self.value.clone(),
        }
    }
}

/// An owning variant of [`Match`], returned by the byte-level entry points
/// where the parsed document does not outlive the call.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedMatch {
    pub path: String,
    pub value: Value,
}

impl OwnedMatch {
    /// Render as `{"path": <string>, "value": <subtree>}`.
    pub fn to_json(&self) -> Value {
        json!({ "path": self.path, "value": self.value })
    }
}

/// The step evaluator. Holds the resolved options and the optional
/// cancellation signal for one query; all per-call state travels through
/// the recursion.
pub(crate) struct Engine<'e> {
    max_depth: usize,
    strict: bool,
    cancel: Option<&'e CancelSignal>,
}

impl<'e> Engine<'e> {
    pub(crate) fn new(opts: &QueryOptions, cancel: Option<&'e CancelSignal>) -> Self {
        Self {
            max_depth: opts.max_depth,
            strict: opts.allow_missing_keys,
            cancel,
        }
    }

    /// Apply `tokens` to `node`, collecting matches in document-and-token
    /// order. An empty token sequence matches the node itself.
    pub(crate) fn evaluate<'a>(
        &self,
        node: &'a Value,
        tokens: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        if tokens.is_empty() {
            return Ok(vec![Match {
                path: current_path.to_string(),
                value: node,
            }]);
        }

        self.check_cancelled()?;

        let rest = &tokens[1..];
        match &tokens[0] {
            Token::Root => self.evaluate(node, rest, "$"),
            Token::Child(key) => self.eval_child(node, key, rest, current_path),
            Token::Wildcard => self.eval_wildcard(node, rest, current_path),
            Token::Index(index) => self.eval_index(node, *index, rest, current_path),
            Token::Slice { start, end, step } => {
                self.eval_slice(node, *start, *end, *step, rest, current_path)
            }
            Token::Union(union) => self.eval_union(node, union, rest, current_path),
            Token::Recursive => self.eval_recursive(node, rest, current_path, 0),
            Token::Filter(expr) => self.eval_filter(node, expr, rest, current_path),
        }
    }

    fn eval_child<'a>(
        &self,
        node: &'a Value,
        key: &str,
        rest: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        let map = match node.as_object() {
            Some(map) => map,
            None if self.strict => {
                return Err(Error::new(
                    ErrorCode::TypeMismatch,
                    format!(
                        "expected object at {current_path}, got {}",
                        type_name(node)
                    ),
                ));
            }
            None => return Ok(Vec::new()),
        };
        match map.get(key) {
            Some(value) => self.evaluate(value, rest, &format!("{current_path}.{key}")),
            None if self.strict => Err(Error::new(
                ErrorCode::KeyNotFound,
                format!("key '{key}' not found at {current_path}"),
            )),
            None => Ok(Vec::new()),
        }
    }

    fn eval_wildcard<'a>(
        &self,
        node: &'a Value,
        rest: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        let mut results = Vec::new();
        match node {
            Value::Object(map) => {
                for (key, child) in sorted_members(map) {
                    results.extend(self.evaluate(child, rest, &format!("{current_path}.{key}"))?);
                }
            }
            Value::Array(arr) => {
                for (i, child) in arr.iter().enumerate() {
                    results.extend(self.evaluate(child, rest, &format!("{current_path}[{i}]"))?);
                }
            }
            _ => {}
        }
        Ok(results)
    }

    fn eval_index<'a>(
        &self,
        node: &'a Value,
        index: i64,
        rest: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        let arr = match node.as_array() {
            Some(arr) => arr,
            None if self.strict => {
                return Err(Error::new(
                    ErrorCode::TypeMismatch,
                    format!("expected array at {current_path}, got {}", type_name(node)),
                ));
            }
            None => return Ok(Vec::new()),
        };
        let idx = normalize_index(index, arr.len());
        if idx < 0 || idx >= arr.len() as i64 {
            if self.strict {
                return Err(Error::new(
                    ErrorCode::IndexOutOfBounds,
                    format!(
                        "index {index} out of bounds at {current_path} (length {})",
                        arr.len()
                    ),
                ));
            }
            return Ok(Vec::new());
        }
        self.evaluate(
            &arr[idx as usize],
            rest,
            &format!("{current_path}[{idx}]"),
        )
    }

    fn eval_slice<'a>(
        &self,
        node: &'a Value,
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
        rest: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        let arr = match node.as_array() {
            Some(arr) => arr,
            None => return Ok(Vec::new()),
        };
        let n = arr.len() as i64;

        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(Error::new(
                ErrorCode::InvalidPath,
                "slice step cannot be zero",
            ));
        }

        // defaults cover the whole array in the direction of travel
        let (mut lo, mut hi) = if step > 0 { (0, n) } else { (n - 1, -n - 1) };
        if let Some(start) = start {
            lo = normalize_index(start, arr.len());
        }
        if let Some(end) = end {
            hi = normalize_index(end, arr.len());
        }

        let mut results = Vec::new();
        let mut i = lo;
        if step > 0 {
            while i < hi && i < n {
                if i >= 0 {
                    results.extend(self.evaluate(
                        &arr[i as usize],
                        rest,
                        &format!("{current_path}[{i}]"),
                    )?);
                }
                i += step;
            }
        } else {
            while i > hi && i >= 0 {
                if i < n {
                    results.extend(self.evaluate(
                        &arr[i as usize],
                        rest,
                        &format!("{current_path}[{i}]"),
                    )?);
                }
                i += step;
            }
        }
        Ok(results)
    }

    fn eval_union<'a>(
        &self,
        node: &'a Value,
        union: &Union,
        rest: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        let mut results = Vec::new();
        match union {
            Union::Indices(indices) => {
                let arr = match node.as_array() {
                    Some(arr) => arr,
                    None => return Ok(results),
                };
                for &index in indices {
                    let idx = normalize_index(index, arr.len());
                    if idx < 0 || idx >= arr.len() as i64 {
                        continue; // out-of-range union entries are skipped, not errors
                    }
                    results.extend(self.evaluate(
                        &arr[idx as usize],
                        rest,
                        &format!("{current_path}[{idx}]"),
                    )?);
                }
            }
            Union::Names(names) => {
                let map = match node.as_object() {
                    Some(map) => map,
                    None => return Ok(results),
                };
                for name in names {
                    if let Some(value) = map.get(name) {
                        results.extend(self.evaluate(
                            value,
                            rest,
                            &format!("{current_path}.{name}"),
                        )?);
                    }
                }
            }
        }
        Ok(results)
    }

    /// Pre-order descent: the remaining tokens are attempted at every
    /// visited node (the candidate itself included) before its children.
    fn eval_recursive<'a>(
        &self,
        node: &'a Value,
        rest: &[Token],
        current_path: &str,
        depth: usize,
    ) -> Result<Vec<Match<'a>>> {
        if self.max_depth > 0 && depth > self.max_depth {
            return Err(Error::new(
                ErrorCode::MaxDepthExceeded,
                format!("max depth {} exceeded", self.max_depth),
            ));
        }
        self.check_cancelled()?;

        let mut results = Vec::new();
        if rest.is_empty() {
            results.push(Match {
                path: current_path.to_string(),
                value: node,
            });
        } else {
            results.extend(self.evaluate(node, rest, current_path)?);
        }

        match node {
            Value::Object(map) => {
                for (key, child) in sorted_members(map) {
                    results.extend(self.eval_recursive(
                        child,
                        rest,
                        &format!("{current_path}.{key}"),
                        depth + 1,
                    )?);
                }
            }
            Value::Array(arr) => {
                for (i, child) in arr.iter().enumerate() {
                    results.extend(self.eval_recursive(
                        child,
                        rest,
                        &format!("{current_path}[{i}]"),
                        depth + 1,
                    )?);
                }
            }
            _ => {}
        }

        Ok(results)
    }

    fn eval_filter<'a>(
        &self,
        node: &'a Value,
        expr: &str,
        rest: &[Token],
        current_path: &str,
    ) -> Result<Vec<Match<'a>>> {
        let mut results = Vec::new();
        match node {
            Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    if filter::matches(item, expr)? {
                        results.extend(self.evaluate(
                            item,
                            rest,
                            &format!("{current_path}[{i}]"),
                        )?);
                    }
                }
            }
            Value::Object(map) => {
                for (key, item) in sorted_members(map) {
                    if filter::matches(item, expr)? {
                        results.extend(self.evaluate(
                            item,
                            rest,
                            &format!("{current_path}.{key}"),
                        )?);
                    }
                }
            }
            _ => {}
        }
        Ok(results)
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(signal) if signal.is_done() => match signal.reason() {
                Some(reason) => Err(Error::with_cause(
                    ErrorCode::Cancelled,
                    "query cancelled",
                    reason,
                )),
                None => Err(Error::new(ErrorCode::Cancelled, "query cancelled")),
            },
            _ => Ok(()),
        }
    }
}

/// Object members in ascending name order. The map representation
/// underneath makes no ordering promise, so every enumeration sorts.
fn sorted_members(map: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    map.iter().sorted_by(|a, b| a.0.cmp(b.0))
}

fn normalize_index(index: i64, len: usize) -> i64 {
    if index < 0 {
        len as i64 + index
    } else {
        index
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eval(doc: &Value, path: &str) -> Vec<(String, Value)> {
        let tokens = crate::tokenizer::tokenize(path).unwrap();
        Engine::new(&QueryOptions::default(), None)
            .evaluate(doc, &tokens, "$")
            .unwrap()
            .into_iter()
            .map(|m| (m.path, m.value.clone()))
            .collect()
    }

    #[test]
    fn empty_token_tail_matches_the_node_itself() {
        let doc = json!({"a": 1});
        assert_eq!(eval(&doc, "$"), vec![("$".to_string(), doc.clone())]);
    }

    #[test]
    fn wildcard_walks_object_members_in_ascending_name_order() {
        let doc = json!({"z": 1, "a": 2, "m": 3});
        let paths: Vec<String> = eval(&doc, "$.*").into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["$.a", "$.m", "$.z"]);
    }

    #[test]
    fn negative_index_counts_from_the_end() {
        let doc = json!([10, 20, 30]);
        assert_eq!(eval(&doc, "$[-1]"), vec![("$[2]".to_string(), json!(30))]);
        assert_eq!(eval(&doc, "$[-3]"), vec![("$[0]".to_string(), json!(10))]);
        assert!(eval(&doc, "$[-4]").is_empty());
    }

    #[test]
    fn slice_with_negative_step_walks_backwards() {
        let doc = json!([0, 1, 2, 3, 4]);
        let values: Vec<Value> = eval(&doc, "$[::-1]").into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![json!(4), json!(3), json!(2), json!(1), json!(0)]);
    }

    #[test]
    fn slice_never_visits_out_of_range_indices() {
        let doc = json!([0, 1, 2]);
        let values: Vec<Value> = eval(&doc, "$[1:100]").into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn duplicate_union_entries_produce_duplicate_matches() {
        let doc = json!([10, 20]);
        let values: Vec<Value> = eval(&doc, "$[0,0]").into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![json!(10), json!(10)]);
    }

    #[test]
    fn recursive_terminal_emits_every_node_in_preorder() {
        let doc = json!({"a": [1, 2], "b": {"c": 3}});
        let paths: Vec<String> = eval(&doc, "$..").into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["$", "$.a", "$.a[0]", "$.a[1]", "$.b", "$.b.c"]);
    }

    #[test]
    fn strict_mode_surfaces_the_miss() {
        let doc = json!({"a": 1});
        let tokens = crate::tokenizer::tokenize("$.missing").unwrap();
        let opts = QueryOptions::default().with_allow_missing_keys(true);
        let err = Engine::new(&opts, None)
            .evaluate(&doc, &tokens, "$")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::KeyNotFound);
    }
}
