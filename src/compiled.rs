use std::fmt;

use serde_json::Value;

use crate::cancel::CancelSignal;
use crate::engine::{Engine, Match, OwnedMatch, QueryOptions};
use crate::errors::{Error, ErrorCode, Result};
use crate::tokenizer::{tokenize, Token};

/// A parsed and validated path, reusable across documents and threads.
///
/// Compile once when the same path is applied to many documents; evaluation
/// never mutates the compiled form, so it can be shared freely.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    raw: String,
    tokens: Vec<Token>,
}

/// Parse and validate `path` for repeated use.
pub fn compile(path: &str) -> Result<CompiledPath> {
    let tokens = tokenize(path)?;
    Ok(CompiledPath {
        raw: path.trim().to_string(),
        tokens,
    })
}

/// Like [`compile`], but panics on an invalid path. Reserve for paths that
/// are program constants.
pub fn must_compile(path: &str) -> CompiledPath {
    match compile(path) {
        Ok(compiled) => compiled,
        Err(e) => panic!("must_compile({path:?}): {e}"),
    }
}

impl CompiledPath {
    /// The original path text, surrounding whitespace trimmed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parse `data` and return every match.
    pub fn query(&self, data: &[u8], opts: &QueryOptions) -> Result<Vec<OwnedMatch>> {
        let root = parse_document(data)?;
        Ok(into_owned(self.run(&root, opts, None)?))
    }

    /// Like [`CompiledPath::query`], polling `signal` during evaluation.
    pub fn query_with_cancel(
        &self,
        signal: &CancelSignal,
        data: &[u8],
        opts: &QueryOptions,
    ) -> Result<Vec<OwnedMatch>> {
        let root = parse_document(data)?;
        Ok(into_owned(self.run(&root, opts, Some(signal))?))
    }

    /// Evaluate against an already-parsed document. Matches borrow from it.
    pub fn query_value<'a>(&self, root: &'a Value, opts: &QueryOptions) -> Result<Vec<Match<'a>>> {
        self.run(root, opts, None)
    }

    /// Like [`CompiledPath::query_value`], polling `signal` during evaluation.
    pub fn query_value_with_cancel<'a>(
        &self,
        signal: &CancelSignal,
        root: &'a Value,
        opts: &QueryOptions,
    ) -> Result<Vec<Match<'a>>> {
        self.run(root, opts, Some(signal))
    }

    fn run<'a>(
        &self,
        root: &'a Value,
        opts: &QueryOptions,
        cancel: Option<&CancelSignal>,
    ) -> Result<Vec<Match<'a>>> {
        let results = Engine::new(opts, cancel).evaluate(root, &self.tokens, "$")?;
        tracing::debug!(path = %self.raw, matches = results.len(), "query evaluated");
        Ok(results)
    }
}

/// Equality is textual: `$['a']` and `$.a` compile to different values even
/// though they match alike on every document.
impl PartialEq for CompiledPath {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for CompiledPath {}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

pub(crate) fn parse_document(data: &[u8]) -> Result<Value> {
    serde_json::from_slice(data)
        .map_err(|e| Error::with_cause(ErrorCode::InvalidJson, "failed to parse JSON", e))
}

pub(crate) fn into_owned(results: Vec<Match<'_>>) -> Vec<OwnedMatch> {
    results.into_iter().map(Match::into_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_trimmed_text() {
        let compiled = compile("  $.store.book[*].title ").unwrap();
        assert_eq!(compiled.as_str(), "$.store.book[*].title");
        assert_eq!(compiled.to_string(), "$.store.book[*].title");
    }

    #[test]
    fn equality_is_textual() {
        assert_eq!(compile("$.a").unwrap(), compile(" $.a ").unwrap());
        assert_ne!(compile("$['a']").unwrap(), compile("$.a").unwrap());
    }

    #[test]
    #[should_panic(expected = "must_compile")]
    fn must_compile_panics_on_invalid_path() {
        must_compile("invalid");
    }
}
