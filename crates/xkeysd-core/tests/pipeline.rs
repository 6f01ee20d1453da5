// End-to-end scenarios: raw reports through differ, mapping and replay

use xkeysd_core::catalog::{EV_KEY, EV_REL};
use xkeysd_core::report::{DIAL_INNER_OFFSET, MODE_OFFSET, REPORT_MODE_READY};
use xkeysd_core::{
    Config, DeviceState, EventId, RawReport, RecordingSink, SinkOp, SymbolTable, REPORT_LEN,
};

const CONFIG: &str = r#"
version = 1

[[device]]
name = "edit-panel"
path = "/dev/hidraw0"
inner_dial = "REL_WHEEL"
outer_dial = "REL_HWHEEL"

[device.keys]
0 = "KEY_LEFTCTRL+KEY_C"
1 = "KEY_LEFTALT+KEY_T;KEY_A"
"#;

const KEY_LEFTCTRL: u16 = 29;
const KEY_A: u16 = 30;
const KEY_T: u16 = 20;
const KEY_C: u16 = 46;
const KEY_LEFTALT: u16 = 56;
const REL_WHEEL: u16 = 8;

fn key(code: u16, value: i32) -> SinkOp {
    SinkOp::Event(EventId::new(EV_KEY, code), value)
}

fn report(f: impl FnOnce(&mut RawReport)) -> RawReport {
    let mut r = [0u8; REPORT_LEN];
    r[MODE_OFFSET] = REPORT_MODE_READY;
    f(&mut r);
    r
}

/// Drive a sequence of raw reports through the full pipeline.
fn run_reports(reports: &[RawReport]) -> RecordingSink {
    let table = SymbolTable::new();
    let config = Config::from_toml_str(CONFIG, &table).unwrap();
    let mapping = &config.devices[0];

    let mut state = DeviceState::new();
    let mut sink = RecordingSink::new();
    for raw in reports {
        for transition in state.advance(raw) {
            xkeysd_core::replay(mapping, &transition, &mut sink).unwrap();
        }
    }
    sink
}

#[test]
fn hold_and_release_of_a_chord() {
    let sink = run_reports(&[
        report(|_| {}),               // seeds the baseline
        report(|r| r[4] = 0b0001),    // button 0 down
        report(|r| r[4] = 0b0001),    // steady state, nothing new
        report(|_| {}),               // button 0 up
    ]);

    assert_eq!(
        sink.ops,
        vec![
            key(KEY_LEFTCTRL, 1),
            key(KEY_C, 1),
            SinkOp::Commit,
            key(KEY_LEFTCTRL, 0),
            key(KEY_C, 0),
            SinkOp::Commit,
        ]
    );
}

#[test]
fn compound_macro_fires_once_per_press() {
    let sink = run_reports(&[
        report(|_| {}),
        report(|r| r[4] = 0b0010), // button 1 down
        report(|_| {}),            // button 1 up: no further output
    ]);

    assert_eq!(
        sink.ops,
        vec![
            key(KEY_LEFTALT, 1),
            key(KEY_T, 1),
            SinkOp::Commit,
            key(KEY_LEFTALT, 0),
            key(KEY_T, 0),
            SinkOp::Commit,
            key(KEY_A, 1),
            key(KEY_A, 0),
            SinkOp::Commit,
        ]
    );
    assert_eq!(sink.commit_count(), 3);
}

#[test]
fn first_report_is_swallowed_even_with_buttons_down() {
    let sink = run_reports(&[
        report(|r| r[4] = 0b0011), // device came up mid-press
        report(|r| r[4] = 0b0011),
    ]);
    assert!(sink.ops.is_empty());
}

#[test]
fn dial_turns_become_wheel_events() {
    let sink = run_reports(&[
        report(|_| {}),
        report(|r| r[DIAL_INNER_OFFSET] = 0x02),
        report(|r| r[DIAL_INNER_OFFSET] = 0x01),
    ]);

    assert_eq!(
        sink.ops,
        vec![
            SinkOp::Event(EventId::new(EV_REL, REL_WHEEL), 2),
            SinkOp::Commit,
            SinkOp::Event(EventId::new(EV_REL, REL_WHEEL), -1),
            SinkOp::Commit,
        ]
    );
}

#[test]
fn dial_movement_masks_simultaneous_button_edges() {
    let sink = run_reports(&[
        report(|_| {}),
        report(|r| {
            r[DIAL_INNER_OFFSET] = 0x01;
            r[4] = 0b0001; // pressed in the same cycle as a dial turn
        }),
        report(|r| {
            r[DIAL_INNER_OFFSET] = 0x01;
            r[4] = 0b0000; // released later, with the dial at rest
        }),
    ]);

    // The press edge was absorbed into the advanced baseline; only the dial
    // event and the release edge surface.
    assert_eq!(
        sink.ops,
        vec![
            SinkOp::Event(EventId::new(EV_REL, REL_WHEEL), 1),
            SinkOp::Commit,
            key(KEY_LEFTCTRL, 0),
            key(KEY_C, 0),
            SinkOp::Commit,
        ]
    );
}

#[test]
fn unbound_buttons_stay_silent() {
    let sink = run_reports(&[
        report(|_| {}),
        report(|r| r[5] = 0b0100), // button 10, not configured
        report(|_| {}),
    ]);
    assert!(sink.ops.is_empty());
}
