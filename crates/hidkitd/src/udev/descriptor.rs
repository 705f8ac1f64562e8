//! Just enough of the HID report descriptor format to find a device's primary
//! usage: the Usage Page and Usage in effect at its first Collection.

use crate::criteria::HidProperties;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryUsage {
  pub page: u32,
  pub usage: u32,
}

impl PrimaryUsage {
  pub fn apply_to(self, properties: &mut HidProperties) {
    properties.usage_page = Some(self.page);
    properties.usage = Some(self.usage);
  }
}

// short item prefixes with the size bits masked off
const USAGE_PAGE: u8 = 0x04;
const USAGE: u8 = 0x08;
const COLLECTION: u8 = 0xa0;

const LONG_ITEM: u8 = 0xfe;

pub fn primary_usage(descriptor: &[u8]) -> Option<PrimaryUsage> {
  let mut page = None;
  let mut usage = None;
  let mut rest = descriptor;

  while let Some((&prefix, tail)) = rest.split_first() {
    if prefix == LONG_ITEM {
      let size = usize::from(*tail.first()?);
      rest = tail.get(2 + size..)?;
      continue;
    }

    let size = match prefix & 0x03 {
      3 => 4,
      n => usize::from(n),
    };
    let data = tail.get(..size)?;
    let value = data
      .iter()
      .rev()
      .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));

    match prefix & 0xfc {
      USAGE_PAGE => page = Some(value),
      USAGE if usage.is_none() => usage = Some((value, size)),
      COLLECTION => break,
      _ => (),
    }

    rest = &tail[size..];
  }

  match usage? {
    // a 4 byte usage carries its own page in the high half
    (extended, 4) => Some(PrimaryUsage {
      page: extended >> 16,
      usage: extended & 0xffff,
    }),
    (usage, _) => Some(PrimaryUsage { page: page?, usage }),
  }
}
