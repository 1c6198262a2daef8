use serde_json::json;

use crate::*;

#[test]
fn call_frame_survives_the_wire() {
    let call = CallFrame::new(7, 3, "cachet_compute_sum", json!(["8f0c", 42, 51]));
    let bytes = encode(&Frame::Call(call.clone())).expect("encode");

    match decode(&bytes).expect("decode") {
        Frame::Call(decoded) => {
            assert_eq!(decoded, call);
            assert!(decoded.expects_reply);
        }
        other => panic!("expected a call frame, got {:?}", other),
    }
}

#[test]
fn one_way_call_keeps_its_flag() {
    let call = CallFrame::new(1, 0, "cachet_say_hello", json!(["id"])).one_way();
    let bytes = encode(&Frame::Call(call)).unwrap();
    let Frame::Call(decoded) = decode(&bytes).unwrap() else {
        panic!("expected a call frame");
    };
    assert!(!decoded.expects_reply);
}

#[test]
fn missing_expects_reply_defaults_to_true() {
    let raw = br#"{"frame":"Call","seq":9,"provider_id":0,"method":"m","args":[]}"#;
    let Frame::Call(call) = decode(raw).unwrap() else {
        panic!("expected a call frame");
    };
    assert_eq!(call.seq, 9);
    assert!(call.expects_reply);
}

#[test]
fn failure_reply_keeps_reason() {
    let reason = FailureReason::ProcedureNotFound { provider_id: 1, method: "nope".into() };
    let bytes = encode(&Frame::Reply(ReplyFrame::err(12, reason.clone()))).unwrap();

    let Frame::Reply(reply) = decode(&bytes).unwrap() else {
        panic!("expected a reply frame");
    };
    assert_eq!(reply.seq, 12);
    assert_eq!(reply.status, Err(reason));
}

#[test]
fn success_reply_carries_value() {
    let bytes = encode(&Frame::Reply(ReplyFrame::ok(4, json!({"Ok": 93})))).unwrap();
    let Frame::Reply(reply) = decode(&bytes).unwrap() else {
        panic!("expected a reply frame");
    };
    assert_eq!(reply.status, Ok(json!({"Ok": 93})));
}

#[test]
fn shutdown_frame_has_no_body() {
    let bytes = encode(&Frame::Shutdown).unwrap();
    assert_eq!(bytes, br#"{"frame":"Shutdown"}"#);
    assert_eq!(decode(&bytes).unwrap(), Frame::Shutdown);
}

#[test]
fn unknown_fields_are_ignored() {
    let raw = br#"{"frame":"Reply","seq":2,"status":{"Ok":null},"trace":"abc"}"#;
    let Frame::Reply(reply) = decode(raw).unwrap() else {
        panic!("expected a reply frame");
    };
    assert_eq!(reply.seq, 2);
}

#[test]
fn garbage_is_a_serialization_error() {
    assert!(matches!(decode(&[0xFF, 0xFF, 0xFF]), Err(RpcError::Serialization(_))));
    assert!(matches!(decode(br#"{"frame":"Gossip"}"#), Err(RpcError::Serialization(_))));
}

#[test]
fn empty_payload_is_a_protocol_violation() {
    assert!(matches!(decode(&[]), Err(RpcError::ProtocolViolation(_))));
}

#[test]
fn failure_reasons_render_for_humans() {
    let reason = FailureReason::ProcedureNotFound { provider_id: 5, method: "cachet_check_cache".into() };
    assert_eq!(reason.to_string(), "no procedure 'cachet_check_cache' registered for provider 5");
}
