use super::descriptor::{primary_usage, PrimaryUsage};
use crate::criteria::HidProperties;
use std::{fmt, fs, path::Path};
use tracing::{event, Level};

pub const HID_SUBSYSTEM: &str = "hid";

pub(super) trait UdevDeviceExt {
  fn property_str(&self, name: &str) -> Option<&str>;

  /// Properties carried by the device's uevent. These survive removal,
  /// unlike anything read from sysfs.
  fn hid_properties(&self) -> HidProperties;
}

impl UdevDeviceExt for tokio_udev::Device {
  fn property_str(&self, name: &str) -> Option<&str> {
    self
      .property_value(name)
      .and_then(|v| v.to_str())
      .filter(|v| !v.is_empty())
  }

  fn hid_properties(&self) -> HidProperties {
    let ids = self.property_str("HID_ID").and_then(parse_hid_id);

    HidProperties {
      vendor_id: ids.map(|(vendor, _)| vendor),
      product_id: ids.map(|(_, product)| product),
      usage_page: None,
      usage: None,
      product: self.property_str("HID_NAME").map(str::to_owned),
      address: self.property_str("HID_UNIQ").map(str::to_owned),
    }
  }
}

/// Splits `HID_ID` (`bus:vendor:product`, hex) into vendor and product.
pub fn parse_hid_id(value: &str) -> Option<(u32, u32)> {
  let mut parts = value.split(':');
  let _bus = parts.next()?;
  let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
  let product = u32::from_str_radix(parts.next()?, 16).ok()?;

  match parts.next() {
    None => Some((vendor, product)),
    Some(_) => None,
  }
}

pub(super) fn read_primary_usage(syspath: &Path) -> Option<PrimaryUsage> {
  let path = syspath.join("report_descriptor");
  match fs::read(&path) {
    Ok(descriptor) => primary_usage(&descriptor),
    Err(error) => {
      event!(target: "hidkitd", Level::TRACE, path = %path.display(), %error, "Failed to read report descriptor");
      None
    }
  }
}

/// A HID device reported by udev.
///
/// Owns a libudev reference, which is released when this is dropped.
pub struct UdevDevice {
  device: tokio_udev::Device,
  properties: HidProperties,
}

impl UdevDevice {
  pub(super) fn new(device: tokio_udev::Device, properties: HidProperties) -> Self {
    Self { device, properties }
  }

  pub fn syspath(&self) -> &Path {
    self.device.syspath()
  }
}

impl fmt::Debug for UdevDevice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UdevDevice")
      .field("syspath", &self.syspath())
      .field("product", &self.properties.product)
      .finish()
  }
}
