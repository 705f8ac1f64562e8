use crate::config::{ConfigError, FilterConfig};
use smallvec::SmallVec;
use std::{fmt, ops::AddAssign};

/// Device property a predicate is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
  VendorId,
  ProductId,
  PrimaryUsagePage,
  PrimaryUsage,
  Product,
  DeviceAddress,
}

impl PropertyKey {
  pub const fn name(self) -> &'static str {
    match self {
      PropertyKey::VendorId => "VendorID",
      PropertyKey::ProductId => "ProductID",
      PropertyKey::PrimaryUsagePage => "PrimaryUsagePage",
      PropertyKey::PrimaryUsage => "PrimaryUsage",
      PropertyKey::Product => "Product",
      PropertyKey::DeviceAddress => "DeviceAddress",
    }
  }
}

impl fmt::Display for PropertyKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateValue {
  Number(u32),
  Text(String),
}

impl fmt::Display for PredicateValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PredicateValue::Number(n) => fmt::Display::fmt(n, f),
      PredicateValue::Text(s) => fmt::Debug::fmt(s, f),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
  pub key: PropertyKey,
  pub value: PredicateValue,
}

impl fmt::Display for Predicate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} == {}", self.key, self.value)
  }
}

/// The properties of a HID device that predicates are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HidProperties {
  pub vendor_id: Option<u32>,
  pub product_id: Option<u32>,
  pub usage_page: Option<u32>,
  pub usage: Option<u32>,
  pub product: Option<String>,
  pub address: Option<String>,
}

impl HidProperties {
  pub fn get(&self, key: PropertyKey) -> Option<PredicateValue> {
    match key {
      PropertyKey::VendorId => self.vendor_id.map(PredicateValue::Number),
      PropertyKey::ProductId => self.product_id.map(PredicateValue::Number),
      PropertyKey::PrimaryUsagePage => self.usage_page.map(PredicateValue::Number),
      PropertyKey::PrimaryUsage => self.usage.map(PredicateValue::Number),
      PropertyKey::Product => self.product.clone().map(PredicateValue::Text),
      PropertyKey::DeviceAddress => self.address.clone().map(PredicateValue::Text),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
  pub key: PropertyKey,
  pub expected: PredicateValue,
  pub actual: Option<PredicateValue>,
}

impl fmt::Display for Mismatch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.actual {
      Some(actual) => write!(f, "{}: expected {}, got {}", self.key, self.expected, actual),
      None => write!(f, "{}: expected {}, got nothing", self.key, self.expected),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
  Matches,
  Mismatches(SmallVec<[Mismatch; 2]>),
}

impl MatchResult {
  pub fn expected_value(
    key: PropertyKey,
    expected: PredicateValue,
    actual: Option<PredicateValue>,
  ) -> Self {
    let mut mismatches = SmallVec::new();
    mismatches.push(Mismatch {
      key,
      expected,
      actual,
    });
    MatchResult::Mismatches(mismatches)
  }

  pub fn is_match(&self) -> bool {
    matches!(self, MatchResult::Matches)
  }

  pub fn mismatches(&self) -> &[Mismatch] {
    match self {
      MatchResult::Matches => &[],
      MatchResult::Mismatches(m) => m.as_slice(),
    }
  }
}

impl AddAssign for MatchResult {
  fn add_assign(&mut self, rhs: Self) {
    match rhs {
      MatchResult::Matches => (),
      MatchResult::Mismatches(more) => match self {
        MatchResult::Matches => *self = MatchResult::Mismatches(more),
        MatchResult::Mismatches(existing) => existing.extend(more),
      },
    }
  }
}

/// An immutable conjunction of device-property predicates.
///
/// A registration takes ownership of the criteria it is given, so every
/// subscription builds its own instance with [`MatchCriteria::build`].
#[derive(Debug, PartialEq, Eq)]
pub struct MatchCriteria {
  predicates: SmallVec<[Predicate; 6]>,
}

impl MatchCriteria {
  pub fn build(filter: &FilterConfig) -> Result<Self, ConfigError> {
    let numbers = [
      (PropertyKey::VendorId, filter.vendor_id()),
      (PropertyKey::ProductId, filter.product_id()),
      (PropertyKey::PrimaryUsagePage, filter.usage_page()),
      (PropertyKey::PrimaryUsage, filter.usage()),
    ];
    let texts = [
      (PropertyKey::Product, filter.product_name()),
      (PropertyKey::DeviceAddress, filter.device_address()),
    ];

    let numbers = numbers.iter().filter_map(|(key, value)| {
      value.map(|v| Predicate {
        key: *key,
        value: PredicateValue::Number(v),
      })
    });
    let texts = texts.iter().filter_map(|(key, value)| {
      value.map(|v| Predicate {
        key: *key,
        value: PredicateValue::Text(v.to_owned()),
      })
    });

    let predicates: SmallVec<[Predicate; 6]> = numbers.chain(texts).collect();
    if predicates.is_empty() {
      return Err(ConfigError::NoFilter);
    }

    Ok(Self { predicates })
  }

  #[cfg(test)]
  pub fn predicates(&self) -> &[Predicate] {
    &self.predicates
  }

  #[cfg(test)]
  pub fn get(&self, key: PropertyKey) -> Option<&PredicateValue> {
    self
      .predicates
      .iter()
      .find(|p| p.key == key)
      .map(|p| &p.value)
  }

  pub fn match_with(&self, device: &HidProperties) -> MatchResult {
    let mut result = MatchResult::Matches;

    for predicate in &self.predicates {
      let actual = device.get(predicate.key);
      let matched = match (&predicate.value, &actual) {
        (PredicateValue::Number(expected), Some(PredicateValue::Number(actual))) => {
          expected == actual
        }
        (PredicateValue::Text(expected), Some(PredicateValue::Text(actual))) => {
          if predicate.key == PropertyKey::DeviceAddress {
            same_address(expected, actual)
          } else {
            expected == actual
          }
        }
        _ => false,
      };

      if !matched {
        result += MatchResult::expected_value(predicate.key, predicate.value.clone(), actual);
      }
    }

    result
  }
}

impl fmt::Display for MatchCriteria {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("{")?;
    for (index, predicate) in self.predicates.iter().enumerate() {
      if index > 0 {
        f.write_str(", ")?;
      }
      fmt::Display::fmt(predicate, f)?;
    }
    f.write_str("}")
  }
}

// macOS style `ab-cd-ef-12-34-56` and udev style `AB:CD:EF:12:34:56` name the same device.
fn same_address(expected: &str, actual: &str) -> bool {
  fn normalize(c: char) -> char {
    match c {
      '-' => ':',
      c => c.to_ascii_lowercase(),
    }
  }

  expected.len() == actual.len()
    && expected
      .chars()
      .map(normalize)
      .eq(actual.chars().map(normalize))
}
