use scanner_remote::packets::{ClientMessage, ServerMessage, StateSnapshot};
use scanner_remote::{Direction, OperationStatus, Position, ScannerError};
use serde_json::{json, Value};

fn as_value(message: &ClientMessage) -> Value {
    serde_json::from_str(&message.to_json()).unwrap()
}

#[test]
fn client_messages_match_wire_format() {
    assert_eq!(as_value(&ClientMessage::GetState), json!({"type": "get_state"}));
    assert_eq!(as_value(&ClientMessage::Ping), json!({"type": "ping"}));
    for direction in Direction::ALL {
        assert_eq!(
            as_value(&ClientMessage::Move { direction }),
            json!({"type": "move", "direction": direction.as_str()})
        );
    }
}

#[test]
fn state_update_with_every_field() {
    let text = json!({
        "type": "state_update",
        "data": {
            "current_position": {"x": -2, "y": 9},
            "operation_status": "completed",
            "horizontal_movement_pending": 1,
            "vertical_movement_pending": 0,
            "captured_positions": [[-2, 9]],
            "flag": true,
            "operation_start_time": 1700000000.0,
            "current_movement_duration": 2.5,
            "last_updated": 1700000002.5,
            "user_id": "ab12"
        }
    })
    .to_string();

    let ServerMessage::StateUpdate(snapshot) = ServerMessage::from_json(&text).unwrap() else {
        panic!("expected a state update");
    };
    assert_eq!(snapshot.current_position, Position::new(-2, 9));
    assert_eq!(snapshot.operation_status, OperationStatus::Completed);
    assert_eq!(snapshot.captured_positions, vec![[-2, 9]]);
    assert_eq!(snapshot.flag, Some(true));
    assert_eq!(snapshot.current_movement_duration, Some(2.5));
}

#[test]
fn state_update_without_flag_is_visualizable() {
    let snapshot = StateSnapshot::from_value(json!({
        "current_position": {"x": 0, "y": 0},
        "operation_status": "ready",
        "horizontal_movement_pending": 0,
        "vertical_movement_pending": 0,
        "captured_positions": []
    }))
    .unwrap();

    assert_eq!(snapshot.flag, None);
    assert!(snapshot.visualization_ready());
}

#[test]
fn state_update_with_wrong_types_is_rejected() {
    let text = json!({
        "type": "state_update",
        "data": {
            "current_position": {"x": "0", "y": 0},
            "operation_status": "ready",
            "horizontal_movement_pending": 0,
            "vertical_movement_pending": 0,
            "captured_positions": []
        }
    })
    .to_string();

    let err = ServerMessage::from_json(&text).unwrap_err();
    assert!(matches!(err, ScannerError::MalformedSnapshot(_)));
}

#[test]
fn pong_log_and_error_payloads() {
    let pong = ServerMessage::from_json(r#"{"type":"pong","data":{"timestamp":12.5}}"#).unwrap();
    assert_eq!(pong, ServerMessage::Pong { timestamp: Some(12.5) });

    let bare_pong = ServerMessage::from_json(r#"{"type":"pong"}"#).unwrap();
    assert_eq!(bare_pong, ServerMessage::Pong { timestamp: None });

    let log = ServerMessage::from_json(r#"{"type":"log","data":{"timestamp":"t","message":"hi"}}"#).unwrap();
    assert_eq!(log, ServerMessage::Log { timestamp: Some("t".into()), message: "hi".into() });

    let error = ServerMessage::from_json(r#"{"type":"error","data":{"message":"nope"}}"#).unwrap();
    assert_eq!(error, ServerMessage::Error { message: "nope".into() });
}

#[test]
fn unrecognized_type_decodes_as_unknown() {
    let message = ServerMessage::from_json(r#"{"type":"calibration_report","data":[1,2,3]}"#).unwrap();
    assert_eq!(message, ServerMessage::Unknown("calibration_report".into()));
    assert_eq!(message.name(), "calibration_report");
}

#[test]
fn frames_without_a_type_are_protocol_errors() {
    for text in ["", "[]", r#"{"data":{}}"#, r#"{"type":5}"#] {
        let err = ServerMessage::from_json(text).unwrap_err();
        assert!(matches!(err, ScannerError::Protocol(_)), "{text:?} gave {err:?}");
    }
}
