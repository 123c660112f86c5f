//! Regression coverage for the shared error payload.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case(Error::unauthorized("no"), ErrorCode::Unauthorized)]
#[case(Error::forbidden("nope"), ErrorCode::Forbidden)]
#[case(Error::not_found("missing"), ErrorCode::NotFound)]
#[case(Error::conflict("taken"), ErrorCode::Conflict)]
#[case(Error::service_unavailable("down"), ErrorCode::ServiceUnavailable)]
#[case(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_code(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[tokio::test]
async fn new_captures_trace_id_in_scope() {
    let trace_id: TraceId = "00000000-0000-0000-0000-000000000000"
        .parse()
        .expect("valid UUID");
    let error = TraceId::scope(trace_id, async { Error::internal("boom") }).await;
    assert_eq!(error.trace_id(), Some(trace_id.to_string().as_str()));
}

#[test]
fn new_has_no_trace_id_out_of_scope() {
    assert!(Error::forbidden("nope").trace_id().is_none());
}

#[test]
fn serialises_with_camel_case_keys() {
    let error = Error::conflict("email already registered")
        .with_trace_id("abc")
        .with_details(json!({ "field": "email" }));
    let value = serde_json::to_value(&error).expect("serialise error");
    assert_eq!(
        value,
        json!({
            "code": "conflict",
            "message": "email already registered",
            "traceId": "abc",
            "details": { "field": "email" }
        })
    );
}

#[test]
fn redaction_keeps_code_and_trace_id() {
    let error = Error::internal("connection refused on 10.0.0.3")
        .with_trace_id("abc")
        .with_details(json!({ "secret": "x" }));
    let redacted = error.redacted();
    assert_eq!(redacted.code(), ErrorCode::InternalError);
    assert_eq!(redacted.message(), "Internal server error");
    assert_eq!(redacted.trace_id(), Some("abc"));
    assert!(redacted.details().is_none());
}
