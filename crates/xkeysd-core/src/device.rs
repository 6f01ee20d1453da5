// Xkeysd Device Model
// Per-device identity and compiled slot bindings

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::mapping::KeyMacro;
use crate::report::{DialSlot, BUTTON_COUNT};

/// How a configured device is identified on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceId {
    /// An explicit hidraw node path.
    Path(PathBuf),
    /// A USB (vendor, product) pair to match during discovery.
    Usb { vendor: u16, product: u16 },
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Path(path) => write!(f, "{}", path.display()),
            DeviceId::Usb { vendor, product } => write!(f, "{:04x}:{:04x}", vendor, product),
        }
    }
}

/// One device's compiled remapping: a macro per bound button slot and a
/// relative-axis code per bound dial.
///
/// Unbound slots are `None`; their transitions replay to nothing.
#[derive(Debug, Clone)]
pub struct DeviceMapping {
    name: String,
    id: DeviceId,
    buttons: Vec<Option<KeyMacro>>,
    dials: [Option<u16>; 2],
}

impl DeviceMapping {
    pub fn new(name: impl Into<String>, id: DeviceId) -> Self {
        Self {
            name: name.into(),
            id,
            buttons: vec![None; BUTTON_COUNT],
            dials: [None, None],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Bind a button slot. Panics if `slot` is out of range; the config
    /// compiler validates indices before calling this.
    pub fn bind_button(&mut self, slot: usize, key_macro: KeyMacro) {
        self.buttons[slot] = Some(key_macro);
    }

    pub fn bind_dial(&mut self, slot: DialSlot, rel_code: u16) {
        self.dials[dial_index(slot)] = Some(rel_code);
    }

    pub fn button(&self, slot: usize) -> Option<&KeyMacro> {
        self.buttons.get(slot).and_then(|m| m.as_ref())
    }

    pub fn dial(&self, slot: DialSlot) -> Option<u16> {
        self.dials[dial_index(slot)]
    }

    /// Every key code referenced by any bound macro, deduplicated.
    pub fn key_codes(&self) -> BTreeSet<u16> {
        self.buttons
            .iter()
            .flatten()
            .flat_map(|m| m.key_codes())
            .collect()
    }

    /// Every bound relative-axis code, deduplicated.
    pub fn rel_codes(&self) -> BTreeSet<u16> {
        self.dials.iter().flatten().copied().collect()
    }
}

fn dial_index(slot: DialSlot) -> usize {
    match slot {
        DialSlot::Inner => 0,
        DialSlot::Outer => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::compile_macro;
    use crate::symbol::SymbolTable;

    #[test]
    fn test_unbound_slots_are_none() {
        let mapping = DeviceMapping::new("panel", DeviceId::Path("/dev/hidraw0".into()));
        assert!(mapping.button(0).is_none());
        assert!(mapping.button(BUTTON_COUNT - 1).is_none());
        assert!(mapping.button(BUTTON_COUNT).is_none());
        assert!(mapping.dial(DialSlot::Inner).is_none());
    }

    #[test]
    fn test_capability_sets() {
        let table = SymbolTable::new();
        let mut mapping = DeviceMapping::new(
            "panel",
            DeviceId::Usb {
                vendor: 0x05f3,
                product: 0x02b1,
            },
        );
        mapping.bind_button(0, compile_macro(&table, "KEY_LEFTCTRL+KEY_C").unwrap());
        mapping.bind_button(1, compile_macro(&table, "KEY_C;KEY_V").unwrap());
        mapping.bind_dial(DialSlot::Inner, 8);

        assert_eq!(
            mapping.key_codes().into_iter().collect::<Vec<_>>(),
            vec![29, 46, 47]
        );
        assert_eq!(mapping.rel_codes().into_iter().collect::<Vec<_>>(), vec![8]);
    }

    #[test]
    fn test_device_id_display() {
        let usb = DeviceId::Usb {
            vendor: 0x05f3,
            product: 0x02b1,
        };
        assert_eq!(usb.to_string(), "05f3:02b1");
    }
}
