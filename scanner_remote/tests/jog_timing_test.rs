mod common;

use common::*;
use scanner_remote::jog::{InputSignal, PointerPhase, PressKey, RepeatPolicy, TouchPhase};
use scanner_remote::{ClientEvent, Direction, ScannerClient};
use std::time::Instant;

fn press(client: &mut ScannerClient<FakeTransport>, key: PressKey, at: Instant) {
    run_to(client, at);
    client.handle(ClientEvent::Press(key), at);
}

fn release(client: &mut ScannerClient<FakeTransport>, key: PressKey, at: Instant) {
    run_to(client, at);
    client.handle(ClientEvent::Release(key), at);
}

#[test]
fn tap_sends_one_move() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let key = PressKey::keyboard(Direction::Up);

    press(&mut client, key, t0);
    release(&mut client, key, t0 + ms(100));
    run_to(&mut client, t0 + ms(2_000));

    assert_eq!(client.connection().transport().moves(), vec!["up"]);
    assert_eq!(client.command_count(), 1);
}

#[test]
fn hold_for_500ms_sends_three_moves() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let key = PressKey::keyboard(Direction::Right);

    press(&mut client, key, t0);
    release(&mut client, key, t0 + ms(500));
    run_to(&mut client, t0 + ms(5_000));

    // t=0, arm at 300, first repeat at 450
    assert_eq!(client.connection().transport().moves(), vec!["right"; 3]);
    assert_eq!(client.command_count(), 3);
}

#[test]
fn long_hold_repeats_every_interval() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let key = PressKey::keyboard(Direction::Left);

    press(&mut client, key, t0);
    release(&mut client, key, t0 + ms(1_000));

    // 0, 300, 450, 600, 750, 900
    assert_eq!(client.command_count(), 6);
}

#[test]
fn redundant_release_is_a_noop() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let key = PressKey::pointer(Direction::Down);

    release(&mut client, key, t0);
    press(&mut client, key, t0 + ms(10));
    release(&mut client, key, t0 + ms(20));
    release(&mut client, key, t0 + ms(30));
    run_to(&mut client, t0 + ms(1_000));

    assert_eq!(client.command_count(), 1);
    assert!(client.next_deadline().unwrap() > t0 + ms(1_000), "only keepalive should remain");
}

#[test]
fn os_key_repeat_does_not_send_extra_moves() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    for i in 0..5 {
        client.handle(ClientEvent::Input(InputSignal::KeyDown("ArrowUp".into())), t0 + ms(i * 30));
    }
    client.handle(ClientEvent::Input(InputSignal::KeyUp("ArrowUp".into())), t0 + ms(150));
    run_to(&mut client, t0 + ms(1_000));

    assert_eq!(client.command_count(), 1);
}

#[test]
fn unbound_keys_are_ignored() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    client.handle(ClientEvent::Input(InputSignal::KeyDown("q".into())), t0);
    client.handle(ClientEvent::Input(InputSignal::KeyDown("Enter".into())), t0);

    assert_eq!(client.command_count(), 0);
    assert!(client.telemetry().pressed.is_empty());
}

#[test]
fn wasd_and_pointer_and_touch_resolve_to_directions() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    client.handle(ClientEvent::Input(InputSignal::KeyDown("w".into())), t0);
    client.handle(ClientEvent::Input(InputSignal::KeyUp("w".into())), t0);
    client.handle(ClientEvent::Input(InputSignal::Pointer(Direction::Left, PointerPhase::Down)), t0);
    client.handle(ClientEvent::Input(InputSignal::Pointer(Direction::Left, PointerPhase::Leave)), t0);
    client.handle(ClientEvent::Input(InputSignal::Touch(Direction::Down, TouchPhase::Start)), t0);
    client.handle(ClientEvent::Input(InputSignal::Touch(Direction::Down, TouchPhase::Cancel)), t0);
    run_to(&mut client, t0 + ms(1_000));

    assert_eq!(client.connection().transport().moves(), vec!["up", "left", "down"]);
}

#[test]
fn presses_while_disconnected_are_dropped_not_queued() {
    let t0 = Instant::now();
    let mut client = client("ab12");
    client.start();
    let key = PressKey::keyboard(Direction::Up);

    press(&mut client, key, t0);
    release(&mut client, key, t0 + ms(50));
    open_current(&mut client, t0 + ms(100));
    run_to(&mut client, t0 + ms(1_000));

    assert!(client.connection().transport().moves().is_empty());
    assert_eq!(client.command_count(), 0);
    assert_eq!(client.connection().stats().dropped, 1);
}

#[test]
fn failed_send_does_not_count() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    client.connection_mut().transport_mut().fail_sends = true;

    press(&mut client, PressKey::keyboard(Direction::Up), t0);

    assert_eq!(client.command_count(), 0);
}

#[test]
fn reset_counter_zeroes_command_count() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    let key = PressKey::keyboard(Direction::Up);
    press(&mut client, key, t0);
    release(&mut client, key, t0 + ms(10));
    assert_eq!(client.command_count(), 1);

    client.handle(ClientEvent::ResetCounter, t0 + ms(20));
    assert_eq!(client.command_count(), 0);
}

#[test]
fn release_all_stops_every_repeat() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    press(&mut client, PressKey::keyboard(Direction::Up), t0);
    press(&mut client, PressKey::pointer(Direction::Right), t0);
    run_to(&mut client, t0 + ms(310));
    assert_eq!(client.command_count(), 4);

    client.handle(ClientEvent::ReleaseAll, t0 + ms(320));
    run_to(&mut client, t0 + ms(2_000));

    assert_eq!(client.command_count(), 4);
    assert!(client.telemetry().pressed.is_empty());
}

#[test]
fn shared_direction_repeats_until_last_source_releases() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);
    assert_eq!(client.jog().policy(), RepeatPolicy::UntilLastRelease);
    let keyboard = PressKey::keyboard(Direction::Up);
    let touch = PressKey::touch(Direction::Up);

    press(&mut client, keyboard, t0);
    press(&mut client, touch, t0 + ms(50));
    // 0, 50, arm 300, repeat 450 (touch arm at 350 is absorbed)
    release(&mut client, keyboard, t0 + ms(500));
    assert!(client.jog().is_repeating(Direction::Up));
    // repeat keeps going at 600
    release(&mut client, touch, t0 + ms(650));
    run_to(&mut client, t0 + ms(2_000));

    assert_eq!(client.command_count(), 5);
}

#[test]
fn last_release_wins_stops_shared_repeat_early() {
    let t0 = Instant::now();
    let mut config = config();
    config.repeat_policy = RepeatPolicy::LastReleaseWins;
    let mut client = ScannerClient::new(&config, "ab12", FakeTransport::default());
    client.start();
    open_current(&mut client, t0);
    let keyboard = PressKey::keyboard(Direction::Up);
    let touch = PressKey::touch(Direction::Up);

    press(&mut client, keyboard, t0);
    press(&mut client, touch, t0 + ms(50));
    release(&mut client, keyboard, t0 + ms(500));
    assert!(!client.jog().is_repeating(Direction::Up));
    release(&mut client, touch, t0 + ms(650));
    run_to(&mut client, t0 + ms(2_000));

    // 0, 50, 300, 450
    assert_eq!(client.command_count(), 4);
}

#[test]
fn stalled_loop_skips_missed_repeats() {
    let t0 = Instant::now();
    let mut client = connected("ab12", t0);

    client.handle(ClientEvent::Press(PressKey::keyboard(Direction::Up)), t0);
    client.advance(t0 + ms(5));
    assert_eq!(client.command_count(), 1);

    // nothing ran for three seconds; one late tick, no burst
    client.advance(t0 + ms(3_000));
    assert_eq!(client.command_count(), 2);
    assert_eq!(client.jog().next_deadline(), Some(t0 + ms(3_150)));
}
