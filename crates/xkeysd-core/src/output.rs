// Xkeysd uinput Output Layer
// Virtual device creation and batched event emission

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};

use crate::catalog::{REL_X, REL_Y, SYN_REPORT};
use crate::device::DeviceMapping;
use crate::replay::{EventSink, SinkError};
use crate::symbol::EventId;

/// Name advertised by the virtual device node.
const VIRT_DEVICE_NAME: &str = "Xkeysd (virtual)";

/// Errors from virtual device setup
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to create virtual device: {0}")]
    Create(#[from] std::io::Error),
}

/// Virtual uinput sink.
///
/// Emitted events accumulate in a pending batch; `commit` appends the
/// SYN_REPORT marker and writes the whole batch in one call, so every batch
/// reaches consumers as a single synchronized state change.
pub struct VirtualSink {
    device: VirtualDevice,
    pending: Vec<InputEvent>,
}

impl VirtualSink {
    /// Build the virtual device, declaring up front every capability it will
    /// ever emit: each key code referenced by any configured macro, each
    /// bound dial axis, plus REL_X/REL_Y so downstream consumers classify
    /// the node as a pointing device.
    pub fn create(mappings: &[DeviceMapping]) -> Result<Self, OutputError> {
        let mut keys = AttributeSet::<Key>::new();
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType(REL_X));
        axes.insert(RelativeAxisType(REL_Y));

        for mapping in mappings {
            for code in mapping.key_codes() {
                keys.insert(Key::new(code));
            }
            for code in mapping.rel_codes() {
                axes.insert(RelativeAxisType(code));
            }
        }

        let device = VirtualDeviceBuilder::new()?
            .name(VIRT_DEVICE_NAME)
            .with_keys(&keys)?
            .with_relative_axes(&axes)?
            .build()?;

        Ok(Self {
            device,
            pending: Vec::new(),
        })
    }
}

impl EventSink for VirtualSink {
    fn emit(&mut self, id: EventId, value: i32) -> Result<(), SinkError> {
        self.pending
            .push(InputEvent::new(EventType(id.kind), id.code, value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        // SYN is what makes the kernel deliver the batch as one change.
        self.pending
            .push(InputEvent::new(EventType::SYNCHRONIZATION, SYN_REPORT, 0));
        let result = self.device.emit(&self.pending);
        self.pending.clear();
        result?;
        Ok(())
    }
}
