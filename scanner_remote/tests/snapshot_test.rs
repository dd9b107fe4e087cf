mod common;

use common::*;
use scanner_remote::jog::PressKey;
use scanner_remote::{ClientEvent, ClientNotice, Direction, OperationStatus, Position};
use serde_json::json;
use std::time::Instant;

#[test]
fn connect_press_and_apply_snapshot() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let key = PressKey::keyboard(Direction::Up);

    client.handle(ClientEvent::Press(key), t0 + ms(10));
    client.handle(ClientEvent::Release(key), t0 + ms(60));
    assert_eq!(client.connection().transport().moves(), vec!["up"]);

    deliver(&mut client, &state_update(5, 6, &[]), t0 + ms(100));

    assert_eq!(client.view().current_position, Position::new(5, 6));
    assert_eq!(client.telemetry().highlight.current_cell, Some(Position::new(5, 6)));
    assert!(client.telemetry().has_snapshot);
}

#[test]
fn snapshot_replaces_whole_view() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    let busy = json!({
        "type": "state_update",
        "data": {
            "current_position": {"x": 1, "y": 2},
            "operation_status": "moving",
            "horizontal_movement_pending": 3,
            "vertical_movement_pending": -1,
            "captured_positions": [[0, 0], [1, 1]],
            "operation_start_time": 1700000000.5,
            "current_movement_duration": 3.0,
            "last_updated": 1700000001.0
        }
    });
    deliver(&mut client, &busy.to_string(), t0);
    assert!(client.view().is_busy());
    assert_eq!(client.reconciler().pending_moves(), (3, -1));

    deliver(&mut client, &state_update(4, 4, &[]), t0 + ms(10));

    let view = client.view();
    assert_eq!(view.current_position, Position::new(4, 4));
    assert_eq!(view.operation_status, OperationStatus::Ready);
    assert_eq!(client.reconciler().pending_moves(), (0, 0));
    assert!(view.captured_positions.is_empty());
    assert_eq!(view.operation_start_time, None);
    assert_eq!(view.last_updated, None);
}

#[test]
fn malformed_snapshot_keeps_previous_view() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    deliver(&mut client, &state_update(2, 3, &[[2, 3]]), t0);
    let before = client.telemetry();

    let missing_position = json!({
        "type": "state_update",
        "data": {
            "operation_status": "ready",
            "horizontal_movement_pending": 0,
            "vertical_movement_pending": 0,
            "captured_positions": []
        }
    });
    deliver(&mut client, &missing_position.to_string(), t0 + ms(10));
    deliver(&mut client, "{not json", t0 + ms(20));
    deliver(&mut client, r#"{"data": {}}"#, t0 + ms(30));

    assert_eq!(client.telemetry(), before);
    assert_eq!(client.reconciler().snapshots_rejected(), 1);
    assert!(client.connection().is_open());
}

#[test]
fn duplicate_captures_collapse_but_raw_count_is_kept() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    deliver(&mut client, &state_update(0, 0, &[[3, 4], [3, 4]]), t0);

    assert_eq!(client.view().captured_count(), 2);
    assert_eq!(client.reconciler().captured_set().len(), 1);
    assert!(client.telemetry().highlight.is_captured(&Position::new(3, 4)));
}

#[test]
fn ineligible_snapshot_keeps_previous_highlight() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    deliver(&mut client, &state_update(1, 1, &[[1, 1]]), t0);
    let highlight = client.telemetry().highlight;

    let hidden = json!({
        "type": "state_update",
        "data": {
            "current_position": {"x": 7, "y": 7},
            "operation_status": "focusing",
            "horizontal_movement_pending": 0,
            "vertical_movement_pending": 0,
            "captured_positions": [[1, 1], [7, 7]],
            "flag": false
        }
    });
    deliver(&mut client, &hidden.to_string(), t0 + ms(10));

    let telemetry = client.telemetry();
    assert_eq!(telemetry.view.current_position, Position::new(7, 7));
    assert!(!telemetry.view.visualization_ready);
    assert_eq!(telemetry.highlight, highlight);
}

#[test]
fn unknown_status_string_is_kept() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let update = json!({
        "type": "state_update",
        "data": {
            "current_position": {"x": 0, "y": 0},
            "operation_status": "calibrating",
            "horizontal_movement_pending": 0,
            "vertical_movement_pending": 0,
            "captured_positions": []
        }
    });

    deliver(&mut client, &update.to_string(), t0);

    assert_eq!(client.view().operation_status, OperationStatus::Other("calibrating".into()));
}

#[test]
fn unknown_message_types_are_ignored() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    deliver(&mut client, &state_update(1, 2, &[]), t0);
    let before = client.telemetry();

    deliver(&mut client, r#"{"type":"firmware_banner","data":{"v":2}}"#, t0 + ms(10));
    deliver(&mut client, r#"{"type":"pong","data":{"timestamp":1700000000.25}}"#, t0 + ms(20));

    assert_eq!(client.telemetry(), before);
    assert!(client.connection().is_open());
}

#[test]
fn server_error_and_log_become_notices() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    client.drain_notices();

    deliver(&mut client, r#"{"type":"error","data":{"message":"Invalid direction"}}"#, t0);
    deliver(
        &mut client,
        r#"{"type":"log","data":{"timestamp":"2024-01-01T00:00:00","message":"Image captured at (3, 4)"}}"#,
        t0,
    );

    assert_eq!(
        client.drain_notices(),
        vec![
            ClientNotice::ServerError { message: "Invalid direction".into() },
            ClientNotice::ServerLog {
                timestamp: Some("2024-01-01T00:00:00".into()),
                message: "Image captured at (3, 4)".into(),
            },
        ]
    );
    assert_eq!(client.telemetry().last_server_error.as_deref(), Some("Invalid direction"));
}
