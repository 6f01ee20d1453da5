// Xkeysd Config - TOML with Serde
// Deserializes device configuration and compiles it against the symbol table

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::device::{DeviceId, DeviceMapping};
use crate::mapping::{compile_dial, compile_macro, MappingError};
use crate::report::{BUTTON_COUNT, DialSlot};
use crate::symbol::SymbolTable;

/// The config format revision this build understands.
const CONFIG_VERSION: u32 = 1;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("unsupported config version {0} (expected {CONFIG_VERSION})")]
    Version(u32),

    #[error("device '{0}' needs a path or a vendor/product pair")]
    MissingIdentity(String),

    #[error("device '{device}': key index '{index}' is not in 0..{BUTTON_COUNT}")]
    KeyIndex { device: String, index: String },

    #[error("device '{device}', slot {slot}: {source}")]
    Slot {
        device: String,
        slot: String,
        source: MappingError,
    },
}

/// Root TOML table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    version: u32,

    #[serde(default, rename = "device")]
    devices: Vec<DeviceToml>,
}

/// One `[[device]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceToml {
    name: String,

    /// Explicit hidraw node. Takes precedence over vendor/product.
    #[serde(default)]
    path: Option<PathBuf>,

    #[serde(default)]
    vendor: Option<u16>,

    #[serde(default)]
    product: Option<u16>,

    /// Relative-axis binding for the jog wheel.
    #[serde(default)]
    inner_dial: Option<String>,

    /// Relative-axis binding for the shuttle ring.
    #[serde(default)]
    outer_dial: Option<String>,

    /// Macro specifications keyed by button index ("0" .. "45").
    #[serde(default)]
    keys: HashMap<String, String>,
}

/// Fully compiled configuration.
#[derive(Debug)]
pub struct Config {
    pub devices: Vec<DeviceMapping>,
}

impl Config {
    /// Load and compile a TOML config file.
    pub fn from_toml_path(path: &Path, table: &SymbolTable) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text, table)
    }

    /// Compile a TOML document.
    ///
    /// Every macro and dial specification is compiled here, so unresolvable
    /// names, wrong-namespace bindings and over-capacity chords all fail
    /// before any report is processed.
    pub fn from_toml_str(text: &str, table: &SymbolTable) -> Result<Self, ConfigError> {
        let raw: ConfigToml =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if raw.version != CONFIG_VERSION {
            return Err(ConfigError::Version(raw.version));
        }

        let mut devices = Vec::with_capacity(raw.devices.len());
        for entry in raw.devices {
            devices.push(compile_device(entry, table)?);
        }

        Ok(Self { devices })
    }
}

fn compile_device(entry: DeviceToml, table: &SymbolTable) -> Result<DeviceMapping, ConfigError> {
    let id = match (entry.path, entry.vendor, entry.product) {
        (Some(path), _, _) => DeviceId::Path(path),
        (None, Some(vendor), Some(product)) => DeviceId::Usb { vendor, product },
        _ => return Err(ConfigError::MissingIdentity(entry.name)),
    };

    let mut mapping = DeviceMapping::new(entry.name, id);

    for (index, spec) in &entry.keys {
        let slot: usize = index.parse().map_err(|_| ConfigError::KeyIndex {
            device: mapping.name().to_string(),
            index: index.clone(),
        })?;
        if slot >= BUTTON_COUNT {
            return Err(ConfigError::KeyIndex {
                device: mapping.name().to_string(),
                index: index.clone(),
            });
        }

        let key_macro = compile_macro(table, spec).map_err(|source| ConfigError::Slot {
            device: mapping.name().to_string(),
            slot: format!("key {}", slot),
            source,
        })?;
        mapping.bind_button(slot, key_macro);
    }

    if let Some(spec) = &entry.inner_dial {
        let code = compile_dial(table, spec).map_err(|source| ConfigError::Slot {
            device: mapping.name().to_string(),
            slot: "inner_dial".to_string(),
            source,
        })?;
        mapping.bind_dial(DialSlot::Inner, code);
    }
    if let Some(spec) = &entry.outer_dial {
        let code = compile_dial(table, spec).map_err(|source| ConfigError::Slot {
            device: mapping.name().to_string(),
            slot: "outer_dial".to_string(),
            source,
        })?;
        mapping.bind_dial(DialSlot::Outer, code);
    }

    debug!(
        "compiled device '{}' ({}): {} bound keys, {} bound dials",
        mapping.name(),
        mapping.id(),
        mapping.key_codes().len(),
        mapping.rel_codes().len()
    );

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingError;
    use crate::symbol::SymbolError;

    const SAMPLE: &str = r#"
version = 1

[[device]]
name = "edit-panel"
path = "/dev/hidraw0"
inner_dial = "REL_WHEEL"
outer_dial = "REL_HWHEEL"

[device.keys]
0 = "KEY_A"
5 = "KEY_LEFTALT+KEY_T;KEY_A"
45 = "KEY_LEFTCTRL+KEY_C"

[[device]]
name = "spare"
vendor = 0x05f3
product = 0x02b1
"#;

    fn table() -> SymbolTable {
        SymbolTable::new()
    }

    #[test]
    fn test_compile_sample() {
        let config = Config::from_toml_str(SAMPLE, &table()).unwrap();
        assert_eq!(config.devices.len(), 2);

        let panel = &config.devices[0];
        assert_eq!(panel.name(), "edit-panel");
        assert_eq!(panel.id(), &DeviceId::Path("/dev/hidraw0".into()));
        assert!(panel.button(0).unwrap().is_simple());
        assert_eq!(panel.button(5).unwrap().blocks().len(), 2);
        assert!(panel.button(1).is_none());
        assert_eq!(panel.dial(DialSlot::Inner), Some(8));
        assert_eq!(panel.dial(DialSlot::Outer), Some(6));

        let spare = &config.devices[1];
        assert_eq!(
            spare.id(),
            &DeviceId::Usb {
                vendor: 0x05f3,
                product: 0x02b1
            }
        );
        assert!(spare.dial(DialSlot::Inner).is_none());
    }

    #[test]
    fn test_version_is_checked() {
        let text = "version = 2\n";
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::Version(2))
        ));
    }

    #[test]
    fn test_missing_identity() {
        let text = r#"
version = 1
[[device]]
name = "nameless"
vendor = 0x05f3
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::MissingIdentity(name)) if name == "nameless"
        ));
    }

    #[test]
    fn test_key_index_out_of_range() {
        let text = r#"
version = 1
[[device]]
name = "panel"
path = "/dev/hidraw0"
[device.keys]
46 = "KEY_A"
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::KeyIndex { index, .. }) if index == "46"
        ));
    }

    #[test]
    fn test_unparseable_key_index() {
        let text = r#"
version = 1
[[device]]
name = "panel"
path = "/dev/hidraw0"
[device.keys]
front = "KEY_A"
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::KeyIndex { index, .. }) if index == "front"
        ));
    }

    #[test]
    fn test_macro_errors_are_fatal_at_compile_time() {
        let text = r#"
version = 1
[[device]]
name = "panel"
path = "/dev/hidraw0"
[device.keys]
0 = "KEY_A+KEY_B+KEY_C+KEY_D+KEY_E"
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::Slot {
                source: MappingError::Capacity(_),
                ..
            })
        ));

        let text = r#"
version = 1
[[device]]
name = "panel"
path = "/dev/hidraw0"
inner_dial = "KEY_A"
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::Slot {
                source: MappingError::Validation { .. },
                ..
            })
        ));

        let text = r#"
version = 1
[[device]]
name = "panel"
path = "/dev/hidraw0"
[device.keys]
0 = "KEY_NOT_REAL"
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::Slot {
                source: MappingError::Symbol(SymbolError::Unknown(_)),
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let text = r#"
version = 1
[[device]]
name = "panel"
path = "/dev/hidraw0"
extdial = "REL_WHEEL"
"#;
        assert!(matches!(
            Config::from_toml_str(text, &table()),
            Err(ConfigError::Parse(_))
        ));
    }
}
