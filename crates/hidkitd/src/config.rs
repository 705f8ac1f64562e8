use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("You must provide at least one filter. Use --help.")]
  NoFilter,

  #[error("You must provide at least one action script. Use --help.")]
  NoAction,

  #[error(transparent)]
  Args(#[from] clap::Error),
}

/// Device properties a subscription filters on. Zero, empty and missing
/// values are all treated as "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
  pub vendor_id: Option<u32>,
  pub product_id: Option<u32>,
  pub usage_page: Option<u32>,
  pub usage: Option<u32>,
  pub product_name: Option<String>,
  pub device_address: Option<String>,
}

impl FilterConfig {
  pub fn vendor_id(&self) -> Option<u32> {
    non_zero(self.vendor_id)
  }

  pub fn product_id(&self) -> Option<u32> {
    non_zero(self.product_id)
  }

  pub fn usage_page(&self) -> Option<u32> {
    non_zero(self.usage_page)
  }

  pub fn usage(&self) -> Option<u32> {
    non_zero(self.usage)
  }

  pub fn product_name(&self) -> Option<&str> {
    non_empty(self.product_name.as_deref())
  }

  pub fn device_address(&self) -> Option<&str> {
    non_empty(self.device_address.as_deref())
  }

  pub fn is_empty(&self) -> bool {
    self.vendor_id().is_none()
      && self.product_id().is_none()
      && self.usage_page().is_none()
      && self.usage().is_none()
      && self.product_name().is_none()
      && self.device_address().is_none()
  }
}

/// Scripts to run per event kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionConfig {
  pub on_connect: Option<PathBuf>,
  pub on_disconnect: Option<PathBuf>,
}

impl ActionConfig {
  pub fn on_connect(&self) -> Option<&Path> {
    non_empty_path(self.on_connect.as_deref())
  }

  pub fn on_disconnect(&self) -> Option<&Path> {
    non_empty_path(self.on_disconnect.as_deref())
  }

  pub fn is_empty(&self) -> bool {
    self.on_connect().is_none() && self.on_disconnect().is_none()
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
  pub filter: FilterConfig,
  pub actions: ActionConfig,
}

impl Config {
  /// Checks the startup invariant: at least one filter and at least one action.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.filter.is_empty() {
      return Err(ConfigError::NoFilter);
    }

    if self.actions.is_empty() {
      return Err(ConfigError::NoAction);
    }

    Ok(())
  }
}

fn non_zero(value: Option<u32>) -> Option<u32> {
  value.filter(|v| *v != 0)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<&Path>) -> Option<&Path> {
  value.filter(|v| !v.as_os_str().is_empty())
}
