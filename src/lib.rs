//! A JSONPath query engine.
//!
//! Compiles a JSONPath expression into a token sequence and evaluates it
//! against a JSON document, returning every matching subtree together with
//! its normalized path. Evaluation is deterministic (object members are
//! always visited in ascending name order) and never mutates the document,
//! which makes the engine safe to drive from agents, pipelines and test
//! harnesses that need reproducible extraction.
//!
//! ```
//! use jsonpath_query::{query, QueryOptions};
//!
//! let data = br#"{"store":{"book":[
//!     {"title":"Sayings of the Century","price":8.95},
//!     {"title":"Moby Dick","price":8.99}
//! ]}}"#;
//!
//! let matches = query(data, "$.store.book[?(@.price < 9)].title", &QueryOptions::default())?;
//! assert_eq!(matches.len(), 2);
//! assert_eq!(matches[0].path, "$.store.book[0].title");
//! assert_eq!(matches[0].value, serde_json::json!("Sayings of the Century"));
//! # Ok::<(), jsonpath_query::Error>(())
//! ```
//!
//! Paths that are applied to many documents can be compiled once with
//! [`compile`]; long-running queries can be aborted through a
//! [`CancelSignal`].

mod cancel;
mod compiled;
mod engine;
mod errors;
mod filter;
mod tokenizer;

pub use cancel::CancelSignal;
pub use compiled::{compile, must_compile, CompiledPath};
pub use engine::{Match, OwnedMatch, QueryOptions};
pub use errors::{Error, ErrorCode, Result};

use compiled::{into_owned, parse_document};
use serde_json::Value;

/// Parse `data` and return every match of `path`.
pub fn query(data: &[u8], path: &str, opts: &QueryOptions) -> Result<Vec<OwnedMatch>> {
    let root = parse_document(data)?;
    Ok(into_owned(query_value(&root, path, opts)?))
}

/// Like [`query`], polling `signal` during evaluation.
pub fn query_with_cancel(
    signal: &CancelSignal,
    data: &[u8],
    path: &str,
    opts: &QueryOptions,
) -> Result<Vec<OwnedMatch>> {
    let root = parse_document(data)?;
    Ok(into_owned(query_value_with_cancel(
        signal, &root, path, opts,
    )?))
}

/// Evaluate `path` against an already-parsed document; matches borrow from
/// `root`.
pub fn query_value<'a>(root: &'a Value, path: &str, opts: &QueryOptions) -> Result<Vec<Match<'a>>> {
    compile(path)?.query_value(root, opts)
}

/// Like [`query_value`], polling `signal` during evaluation.
pub fn query_value_with_cancel<'a>(
    signal: &CancelSignal,
    root: &'a Value,
    path: &str,
    opts: &QueryOptions,
) -> Result<Vec<Match<'a>>> {
    compile(path)?.query_value_with_cancel(signal, root, opts)
}

/// The first match of `path`, if any. No match is `Ok(None)`, not an error.
pub fn first(data: &[u8], path: &str, opts: &QueryOptions) -> Result<Option<OwnedMatch>> {
    Ok(query(data, path, opts)?.into_iter().next())
}

/// Value-level variant of [`first`].
pub fn first_value<'a>(
    root: &'a Value,
    path: &str,
    opts: &QueryOptions,
) -> Result<Option<Match<'a>>> {
    Ok(query_value(root, path, opts)?.into_iter().next())
}

/// The matched values only, in match order.
pub fn values(data: &[u8], path: &str, opts: &QueryOptions) -> Result<Vec<Value>> {
    Ok(query(data, path, opts)?.into_iter().map(|m| m.value).collect())
}

/// Value-level variant of [`values`]; the returned references alias `root`.
pub fn values_value<'a>(
    root: &'a Value,
    path: &str,
    opts: &QueryOptions,
) -> Result<Vec<&'a Value>> {
    Ok(query_value(root, path, opts)?
        .into_iter()
        .map(|m| m.value)
        .collect())
}

/// The normalized paths only, in match order.
pub fn paths(data: &[u8], path: &str, opts: &QueryOptions) -> Result<Vec<String>> {
    Ok(query(data, path, opts)?.into_iter().map(|m| m.path).collect())
}

/// Value-level variant of [`paths`].
pub fn paths_value(root: &Value, path: &str, opts: &QueryOptions) -> Result<Vec<String>> {
    Ok(query_value(root, path, opts)?
        .into_iter()
        .map(|m| m.path)
        .collect())
}

/// Whether `path` matches at least one value.
pub fn exists(data: &[u8], path: &str, opts: &QueryOptions) -> Result<bool> {
    Ok(!query(data, path, opts)?.is_empty())
}

/// Value-level variant of [`exists`].
pub fn exists_value(root: &Value, path: &str, opts: &QueryOptions) -> Result<bool> {
    Ok(!query_value(root, path, opts)?.is_empty())
}

/// Like [`query`], but panics on error. Test use only.
pub fn must_query(data: &[u8], path: &str, opts: &QueryOptions) -> Vec<OwnedMatch> {
    match query(data, path, opts) {
        Ok(results) => results,
        Err(e) => panic!("must_query({path:?}): {e}"),
    }
}
