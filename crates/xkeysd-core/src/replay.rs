// Xkeysd Macro Replay Engine
// Expands semantic transitions into ordered event batches on a sink

use log::debug;

use crate::catalog::{EV_KEY, EV_REL};
use crate::device::DeviceMapping;
use crate::mapping::{ChordBlock, KeyMacro};
use crate::report::Transition;
use crate::symbol::EventId;

/// Errors from event emission
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write event batch: {0}")]
    Write(#[from] std::io::Error),
}

/// Ordered consumer of synthesized events.
///
/// Emitted triples accumulate until `commit`, which marks the batch as one
/// atomic state change for downstream consumers.
pub trait EventSink {
    fn emit(&mut self, id: EventId, value: i32) -> Result<(), SinkError>;
    fn commit(&mut self) -> Result<(), SinkError>;
}

/// Replay one transition through a device's bindings.
///
/// Dial transitions become a single relative-axis event. Button edges replay
/// the slot's macro: a simple (single-block) macro mirrors the edge so keys
/// stay held between press and release, while a compound macro fires its
/// whole assert/release burst on the press edge and ignores the release
/// edge entirely. The asymmetry is deliberate; compound sequences have no
/// meaningful partial-hold state.
pub fn replay<S: EventSink>(
    mapping: &DeviceMapping,
    transition: &Transition,
    sink: &mut S,
) -> Result<(), SinkError> {
    match *transition {
        Transition::Dial { slot, delta } => match mapping.dial(slot) {
            Some(code) => {
                sink.emit(EventId::new(EV_REL, code), delta)?;
                sink.commit()
            }
            None => {
                debug!("{}: {:?} dial unbound, dropping delta {}", mapping.name(), slot, delta);
                Ok(())
            }
        },
        Transition::Button { slot, pressed } => match mapping.button(slot) {
            Some(key_macro) if key_macro.is_simple() => {
                replay_edge(&key_macro.blocks()[0], pressed, sink)
            }
            Some(key_macro) if pressed => replay_burst(key_macro, sink),
            Some(_) => Ok(()),
            None => {
                debug!("{}: button {} unbound, dropping edge", mapping.name(), slot);
                Ok(())
            }
        },
    }
}

/// Mirror a button edge onto a single chord block: assert every key on
/// press, release every key on release, one commit per edge.
fn replay_edge<S: EventSink>(
    block: &ChordBlock,
    pressed: bool,
    sink: &mut S,
) -> Result<(), SinkError> {
    let value = i32::from(pressed);
    for code in block.keys() {
        sink.emit(EventId::new(EV_KEY, *code), value)?;
    }
    sink.commit()
}

/// Fire a compound macro as one burst: per block, assert all keys and
/// commit, then release them and commit, before moving to the next block.
fn replay_burst<S: EventSink>(key_macro: &KeyMacro, sink: &mut S) -> Result<(), SinkError> {
    for block in key_macro.blocks() {
        for code in block.keys() {
            sink.emit(EventId::new(EV_KEY, *code), 1)?;
        }
        sink.commit()?;
        for code in block.keys() {
            sink.emit(EventId::new(EV_KEY, *code), 0)?;
        }
        sink.commit()?;
    }
    Ok(())
}

/// One operation observed by [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOp {
    Event(EventId, i32),
    Commit,
}

/// In-memory sink recording every operation in order. Test support.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub ops: Vec<SinkOp>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == SinkOp::Commit).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, id: EventId, value: i32) -> Result<(), SinkError> {
        self.ops.push(SinkOp::Event(id, value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        self.ops.push(SinkOp::Commit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::mapping::{compile_macro, MAX_CHORD_KEYS};
    use crate::report::DialSlot;
    use crate::symbol::SymbolTable;

    const KEY_LEFTCTRL: u16 = 29;
    const KEY_A: u16 = 30;
    const KEY_T: u16 = 20;
    const KEY_C: u16 = 46;
    const KEY_LEFTALT: u16 = 56;

    fn key(code: u16, value: i32) -> SinkOp {
        SinkOp::Event(EventId::new(EV_KEY, code), value)
    }

    fn mapping_with(slot: usize, spec: &str) -> DeviceMapping {
        let table = SymbolTable::new();
        let mut mapping = DeviceMapping::new("test", DeviceId::Path("/dev/hidraw9".into()));
        mapping.bind_button(slot, compile_macro(&table, spec).unwrap());
        mapping
    }

    #[test]
    fn test_simple_macro_holds_across_edges() {
        let mapping = mapping_with(3, "KEY_LEFTCTRL+KEY_C");
        let mut sink = RecordingSink::new();

        replay(
            &mapping,
            &Transition::Button {
                slot: 3,
                pressed: true,
            },
            &mut sink,
        )
        .unwrap();
        assert_eq!(
            sink.ops,
            vec![key(KEY_LEFTCTRL, 1), key(KEY_C, 1), SinkOp::Commit]
        );

        sink.ops.clear();
        replay(
            &mapping,
            &Transition::Button {
                slot: 3,
                pressed: false,
            },
            &mut sink,
        )
        .unwrap();
        assert_eq!(
            sink.ops,
            vec![key(KEY_LEFTCTRL, 0), key(KEY_C, 0), SinkOp::Commit]
        );
    }

    #[test]
    fn test_compound_macro_bursts_on_press() {
        let mapping = mapping_with(0, "KEY_LEFTALT+KEY_T;KEY_A");
        let mut sink = RecordingSink::new();

        replay(
            &mapping,
            &Transition::Button {
                slot: 0,
                pressed: true,
            },
            &mut sink,
        )
        .unwrap();
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
    fn test_compound_macro_release_is_a_no_op() {
        let mapping = mapping_with(0, "KEY_LEFTALT+KEY_T;KEY_A");
        let mut sink = RecordingSink::new();
        replay(
            &mapping,
            &Transition::Button {
                slot: 0,
                pressed: false,
            },
            &mut sink,
        )
        .unwrap();
        assert!(sink.ops.is_empty());
    }

    #[test]
    fn test_dial_transition() {
        let table = SymbolTable::new();
        let mut mapping = DeviceMapping::new("test", DeviceId::Path("/dev/hidraw9".into()));
        mapping.bind_dial(DialSlot::Inner, table.resolve("REL_WHEEL").unwrap().code);
        let mut sink = RecordingSink::new();

        replay(
            &mapping,
            &Transition::Dial {
                slot: DialSlot::Inner,
                delta: -2,
            },
            &mut sink,
        )
        .unwrap();
        assert_eq!(
            sink.ops,
            vec![SinkOp::Event(EventId::new(EV_REL, 8), -2), SinkOp::Commit]
        );
    }

    #[test]
    fn test_unbound_slots_replay_to_nothing() {
        let mapping = DeviceMapping::new("test", DeviceId::Path("/dev/hidraw9".into()));
        let mut sink = RecordingSink::new();
        replay(
            &mapping,
            &Transition::Button {
                slot: 7,
                pressed: true,
            },
            &mut sink,
        )
        .unwrap();
        replay(
            &mapping,
            &Transition::Dial {
                slot: DialSlot::Outer,
                delta: 1,
            },
            &mut sink,
        )
        .unwrap();
        assert!(sink.ops.is_empty());
    }

    #[test]
    fn test_full_width_chord_orders_keys_as_written() {
        let mapping = mapping_with(0, "KEY_T+KEY_A+KEY_C+KEY_LEFTALT");
        let mut sink = RecordingSink::new();
        replay(
            &mapping,
            &Transition::Button {
                slot: 0,
                pressed: true,
            },
            &mut sink,
        )
        .unwrap();
        assert_eq!(sink.ops.len(), MAX_CHORD_KEYS + 1);
        assert_eq!(
            sink.ops,
            vec![
                key(KEY_T, 1),
                key(KEY_A, 1),
                key(KEY_C, 1),
                key(KEY_LEFTALT, 1),
                SinkOp::Commit,
            ]
        );
    }
}
