//! Interprets script results and applies them to the live event

use hookscript_core::response::parse_status;
use hookscript_core::value::{self, is_set, is_truthy};
use hookscript_core::{ApiEvent, Error, EventResponse, ResponseFactory, Result};
use serde_json::{json, Value};

/// Merges script results into events
///
/// Probing follows a fixed order: `request`, then `response`, then the
/// result itself. "Empty" uses loose scripting semantics (see
/// [`hookscript_core::value::is_empty`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMerger;

impl ResultMerger {
    /// Apply a pre-process result: merge `request`, install `response`
    pub fn merge_pre_process(script: &str, event: &mut ApiEvent, result: &Value) -> Result<()> {
        match value::get(result, "request") {
            None | Some(Value::Null) => {}
            Some(Value::Object(fields)) => event.request.merge_from_map(fields),
            Some(other) => {
                return Err(Error::malformed(
                    script,
                    format!("request must be a mapping, got {other}"),
                ))
            }
        }

        if let Some(response) = value::get(result, "response").filter(|r| is_truthy(r)) {
            let built = match response {
                Value::Object(descriptor) if descriptor.contains_key("content") => {
                    ResponseFactory::from_descriptor(descriptor)
                        .map_err(|e| Error::malformed(script, e))?
                }
                raw => ResponseFactory::raw(raw.clone()),
            };
            event.response = Some(EventResponse::Structured(built));
        }

        Ok(())
    }

    /// The response payload a post-process or service result stands for
    pub fn response_payload(result: &Value) -> Value {
        if let Some(response) = value::get(result, "response").filter(|r| is_truthy(r)) {
            return response.clone();
        }

        if let Value::Object(fields) = result {
            if is_set(fields, "content") || is_set(fields, "status_code") {
                return result.clone();
            }
        }

        json!({ "content": result, "status_code": 200 })
    }

    /// Apply a post-process or service result to the event's response
    ///
    /// A structured response absorbs the payload's fields; anything else is
    /// replaced by the payload.
    pub fn merge_post_process(
        script: &str,
        response: &mut Option<EventResponse>,
        result: &Value,
    ) -> Result<()> {
        let payload = Self::response_payload(result);

        match response {
            Some(EventResponse::Structured(existing)) => match &payload {
                Value::Object(fields) => existing
                    .merge_from_map(fields)
                    .map_err(|e| Error::malformed(script, e))?,
                other => {
                    return Err(Error::malformed(
                        script,
                        format!("cannot merge {other} into a structured response"),
                    ))
                }
            },
            _ => {
                if let Some(status) = value::get(&payload, "status_code").filter(|s| !s.is_null()) {
                    parse_status(status).map_err(|e| Error::malformed(script, e))?;
                }
                *response = Some(EventResponse::Payload(payload));
            }
        }

        Ok(())
    }

    /// Whether the result asks to halt propagation
    pub fn stop_propagation(result: &Value) -> bool {
        value::get(result, "stop_propagation").map_or(false, is_truthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookscript_core::{ServiceRequest, ServiceResponse, StatusCode};

    fn pre_event() -> ApiEvent {
        ApiEvent::pre_process(
            "db._table.contact.get.pre_process",
            ServiceRequest::new("GET", "_table/contact").with_parameter("limit", json!(5)),
        )
    }

    #[test]
    fn test_pre_process_request_merge() {
        let mut event = pre_event();
        ResultMerger::merge_pre_process("s", &mut event, &json!({"request": {"foo": 1}})).unwrap();

        assert_eq!(event.request.get("foo"), Some(&json!(1)));
        assert_eq!(event.request.method(), Some("GET"));
        assert!(event.response.is_none());
    }

    #[test]
    fn test_pre_process_response_descriptor() {
        let mut event = pre_event();
        ResultMerger::merge_pre_process(
            "s",
            &mut event,
            &json!({"response": {"content": "hi", "status_code": 201}}),
        )
        .unwrap();

        let response = event.response.as_ref().and_then(EventResponse::as_structured).unwrap();
        assert_eq!(response.content, json!("hi"));
        assert_eq!(response.status_code, StatusCode::CREATED);
        assert_eq!(response.content_type, None);
        assert!(event.is_short_circuited());
    }

    #[test]
    fn test_pre_process_raw_response() {
        let mut event = pre_event();
        ResultMerger::merge_pre_process("s", &mut event, &json!({"response": [1, 2]})).unwrap();

        let response = event.response.as_ref().and_then(EventResponse::as_structured).unwrap();
        assert_eq!(response.content, json!([1, 2]));
        assert_eq!(response.status_code, StatusCode::OK);
    }

    #[test]
    fn test_pre_process_empty_response_ignored() {
        let mut event = pre_event();
        for empty in [json!(""), json!("0"), json!(0), json!({}), json!([]), json!(false)] {
            ResultMerger::merge_pre_process("s", &mut event, &json!({ "response": empty })).unwrap();
            assert!(event.response.is_none());
        }
    }

    #[test]
    fn test_pre_process_malformed() {
        let mut event = pre_event();
        let err = ResultMerger::merge_pre_process("s", &mut event, &json!({"request": "nope"}))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResult { .. }));

        let err = ResultMerger::merge_pre_process(
            "s",
            &mut event,
            &json!({"response": {"content": "x", "status_code": "abc"}}),
        )
        .unwrap_err();
        assert!(err.is_script_fault());
    }

    #[test]
    fn test_payload_probing_order() {
        assert_eq!(
            ResultMerger::response_payload(&json!({"response": {"a": 1}, "content": "ignored"})),
            json!({"a": 1})
        );
        assert_eq!(
            ResultMerger::response_payload(&json!({"status_code": 404})),
            json!({"status_code": 404})
        );
        assert_eq!(
            ResultMerger::response_payload(&json!("done")),
            json!({"content": "done", "status_code": 200})
        );
        assert_eq!(
            ResultMerger::response_payload(&json!({"content": null, "x": 1})),
            json!({"content": {"content": null, "x": 1}, "status_code": 200})
        );
    }

    #[test]
    fn test_post_process_replaces_missing_response() {
        let mut response = None;
        ResultMerger::merge_post_process("s", &mut response, &json!("done")).unwrap();
        assert_eq!(
            response.map(|r| r.to_value()),
            Some(json!({"content": "done", "status_code": 200}))
        );
    }

    #[test]
    fn test_post_process_merges_structured() {
        let existing = ServiceResponse::new(json!({"old": true}), StatusCode::ACCEPTED)
            .with_content_type("application/json");
        let mut response = Some(EventResponse::Structured(existing));

        ResultMerger::merge_post_process("s", &mut response, &json!({"content": "x"})).unwrap();

        let merged = response.as_ref().and_then(EventResponse::as_structured).unwrap();
        assert_eq!(merged.content, json!("x"));
        assert_eq!(merged.status_code, StatusCode::ACCEPTED);
        assert_eq!(merged.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_post_process_raw_into_structured_is_malformed() {
        let existing = ServiceResponse::new(json!(null), StatusCode::OK);
        let mut response = Some(EventResponse::Structured(existing));

        let err = ResultMerger::merge_post_process("s", &mut response, &json!({"response": "raw"}))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResult { .. }));
    }

    #[test]
    fn test_post_process_bad_status() {
        let mut response = None;
        let err = ResultMerger::merge_post_process(
            "s",
            &mut response,
            &json!({"content": "x", "status_code": 42}),
        )
        .unwrap_err();
        assert!(err.is_script_fault());
        assert!(response.is_none());
    }

    #[test]
    fn test_stop_propagation_truthiness() {
        assert!(ResultMerger::stop_propagation(&json!({"stop_propagation": true})));
        assert!(ResultMerger::stop_propagation(&json!({"stop_propagation": "yes"})));
        assert!(!ResultMerger::stop_propagation(&json!({"stop_propagation": "0"})));
        assert!(!ResultMerger::stop_propagation(&json!({"stop_propagation": 0})));
        assert!(!ResultMerger::stop_propagation(&json!("stop_propagation")));
    }
}
