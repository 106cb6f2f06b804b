use jsonpath_query as jsonpath;
use jsonpath_query::{ErrorCode, QueryOptions};

fn doc() -> &'static [u8] {
    br#"{"items": [1, 2, 3], "name": "x", "nested": {"deep": true}}"#
}

fn opts() -> QueryOptions {
    QueryOptions::default()
}

fn strict() -> QueryOptions {
    QueryOptions::default().with_allow_missing_keys(true)
}

#[test]
fn path_syntax_errors() {
    for path in [
        "",
        "   ",
        "items",
        "$.",
        "$.items!",
        "$[",
        "$[]",
        "$.items[1:2:3:4]",
        "$.items[1:x]",
        "$.items[?()]",
    ] {
        let err = jsonpath::query(doc(), path, &opts()).unwrap_err();
        assert!(err.is_path_error(), "{path}: {err}");
        assert_eq!(err.code(), ErrorCode::InvalidPath, "{path}");
    }
}

#[test]
fn zero_slice_step_is_a_path_error() {
    let err = jsonpath::query(doc(), "$.items[::0]", &opts()).unwrap_err();
    assert!(err.is_path_error());
}

#[test]
fn invalid_json_is_a_json_error() {
    let err = jsonpath::query(b"not json", "$", &opts()).unwrap_err();
    assert!(err.is_json_error());
    assert_eq!(err.code(), ErrorCode::InvalidJson);
}

#[test]
fn missing_key_is_silent_by_default() {
    let results = jsonpath::query(doc(), "$.nonexistent", &opts()).unwrap();
    assert!(results.is_empty());
}

#[test]
fn strict_mode_missing_key() {
    let err = jsonpath::query(doc(), "$.nonexistent", &strict()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::KeyNotFound);
    assert!(err.is_not_found());
}

#[test]
fn strict_mode_index_out_of_bounds() {
    let err = jsonpath::query(doc(), "$.items[10]", &strict()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IndexOutOfBounds);
    assert!(err.is_not_found());

    let err = jsonpath::query(doc(), "$.items[-4]", &strict()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IndexOutOfBounds);
}

#[test]
fn strict_mode_type_mismatch() {
    // child step on a string
    let err = jsonpath::query(doc(), "$.name.inner", &strict()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TypeMismatch);

    // index step on an object
    let err = jsonpath::query(doc(), "$.nested[0]", &strict()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TypeMismatch);
}

#[test]
fn out_of_bounds_is_silent_by_default() {
    assert!(jsonpath::query(doc(), "$.items[10]", &opts()).unwrap().is_empty());
    assert!(jsonpath::query(doc(), "$.items[-4]", &opts()).unwrap().is_empty());
    assert!(jsonpath::query(doc(), "$.name.inner", &opts()).unwrap().is_empty());
}

#[test]
fn error_messages_name_the_offending_position() {
    let err = jsonpath::compile("$.items!").unwrap_err();
    assert!(err.message().contains("position"), "{err}");
}

#[test]
#[should_panic(expected = "must_query")]
fn must_query_panics_on_error() {
    jsonpath::must_query(doc(), "invalid", &opts());
}
