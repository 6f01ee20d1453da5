// Xkeysd Core Library
// Report diffing, symbol translation and macro replay for X-keys panels

pub mod catalog;
pub mod config;
pub mod device;
pub mod discover;
pub mod mapping;
pub mod output;
pub mod poll;
pub mod replay;
pub mod report;
pub mod symbol;

pub use config::{Config, ConfigError};
pub use device::{DeviceId, DeviceMapping};
pub use discover::{enumerate, find_by_ids, DiscoverError, HidrawInfo};
pub use mapping::{
    compile_dial, compile_macro, ChordBlock, KeyMacro, MappingError, MAX_CHORD_KEYS,
};
pub use output::{OutputError, VirtualSink};
pub use poll::{DeviceLoop, OpenDevice, PollError, DEFAULT_POLL_TIMEOUT_MS};
pub use replay::{replay, EventSink, RecordingSink, SinkError, SinkOp};
pub use report::{
    DeviceState, DialSlot, RawReport, Transition, BUTTON_COUNT, REPORT_LEN,
};
pub use symbol::{EventId, SymbolError, SymbolTable};
