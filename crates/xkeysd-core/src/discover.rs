// Xkeysd Device Discovery
// Enumerates hidraw nodes and matches them by USB identification numbers

use std::path::PathBuf;

use log::debug;

/// Errors from hidraw enumeration
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("udev error: {0}")]
    Udev(#[from] std::io::Error),
}

/// One enumerated hidraw node with its HID identification numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidrawInfo {
    pub node: PathBuf,
    pub vendor: u16,
    pub product: u16,
}

/// List every hidraw node whose HID parent exposes identification numbers.
pub fn enumerate() -> Result<Vec<HidrawInfo>, DiscoverError> {
    let mut enumerator = udev::Enumerator::new()?;
    enumerator.match_subsystem("hidraw")?;

    let mut found = Vec::new();
    for device in enumerator.scan_devices()? {
        let Some(node) = device.devnode() else {
            continue;
        };
        let Some(parent) = device.parent_with_subsystem("hid")? else {
            continue;
        };
        let Some(hid_id) = parent.property_value("HID_ID").and_then(|v| v.to_str()) else {
            continue;
        };
        let Some((vendor, product)) = parse_hid_id(hid_id) else {
            debug!("{}: unparseable HID_ID '{}'", node.display(), hid_id);
            continue;
        };

        found.push(HidrawInfo {
            node: node.to_path_buf(),
            vendor,
            product,
        });
    }

    Ok(found)
}

/// Node paths of every hidraw device matching the given identification pair.
pub fn find_by_ids(vendor: u16, product: u16) -> Result<Vec<PathBuf>, DiscoverError> {
    Ok(enumerate()?
        .into_iter()
        .filter(|info| info.vendor == vendor && info.product == product)
        .map(|info| info.node)
        .collect())
}

/// Parse a `HID_ID` property (`bus:vendor:product`, hex fields).
fn parse_hid_id(hid_id: &str) -> Option<(u16, u16)> {
    let mut fields = hid_id.split(':');
    let _bus = fields.next()?;
    let vendor = u32::from_str_radix(fields.next()?, 16).ok()?;
    let product = u32::from_str_radix(fields.next()?, 16).ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((vendor as u16, product as u16))
}
