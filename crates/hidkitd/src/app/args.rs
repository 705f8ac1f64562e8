use crate::config::{ActionConfig, Config, FilterConfig};
use clap::{ErrorKind, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum LogFormat {
  Pretty,
  Json,
}

const AFTER_HELP: &str = "\
HOW TO FIND FILTER VALUES:
    Ask udev about the device's HID node, for example:

        udevadm info --query=property /sys/class/hidraw/hidraw0/device

    HID_ID=0003:0000046D:0000C52B    bus, then --vendor-id 0x046d --product-id 0xc52b
    HID_NAME=Logitech USB Receiver   --name
    HID_UNIQ=ab:cd:ef:12:34:56       --address (case and - or : separators ignored)

    The primary usage page and usage come from the report descriptor. Common pairs:
    1/2 mouse, 1/6 keyboard, 12/1 consumer control.

EXAMPLE:
    Run a script whenever any keyboard is plugged in:

        hidkitd --usage-page 1 --usage 6 --on-connect ~/bin/keyboard-connected.sh";

/// Runs a script whenever a matching HID device connects or disconnects.
#[derive(Parser, Debug)]
#[clap(
  name = "hidkitd",
  version,
  arg_required_else_help = true,
  after_help = AFTER_HELP
)]
pub struct Args {
  /// Match devices with this vendor id
  #[clap(long = "vendor-id", value_name = "ID", value_parser = parse_number)]
  pub vendor_id: Option<u32>,

  /// Match devices with this product id
  #[clap(long = "product-id", value_name = "ID", value_parser = parse_number)]
  pub product_id: Option<u32>,

  /// Match devices whose primary usage page is this
  #[clap(long = "usage-page", value_name = "PAGE", value_parser = parse_number)]
  pub usage_page: Option<u32>,

  /// Match devices whose primary usage is this
  #[clap(long = "usage", value_name = "USAGE", value_parser = parse_number)]
  pub usage: Option<u32>,

  /// Match devices with exactly this product name
  #[clap(long = "name", value_name = "NAME", value_parser)]
  pub product_name: Option<String>,

  /// Match devices with this address, compared case-insensitively
  #[clap(long = "address", value_name = "ADDRESS", value_parser)]
  pub device_address: Option<String>,

  /// Script to run when a matching device connects
  #[clap(long = "on-connect", value_name = "SCRIPT", value_parser)]
  pub on_connect: Option<PathBuf>,

  /// Script to run when a matching device disconnects
  #[clap(long = "on-disconnect", value_name = "SCRIPT", value_parser)]
  pub on_disconnect: Option<PathBuf>,

  /// Log output format
  #[clap(
    value_enum,
    long = "log-format",
    short = 'f',
    default_value = "pretty"
  )]
  pub log_format: LogFormat,
}

impl From<Args> for Config {
  fn from(args: Args) -> Self {
    Config {
      filter: FilterConfig {
        vendor_id: args.vendor_id,
        product_id: args.product_id,
        usage_page: args.usage_page,
        usage: args.usage,
        product_name: args.product_name,
        device_address: args.device_address,
      },
      actions: ActionConfig {
        on_connect: args.on_connect,
        on_disconnect: args.on_disconnect,
      },
    }
  }
}

/// Accepts decimal or `0x` prefixed hex.
fn parse_number(value: &str) -> Result<u32, String> {
  let parsed = match value
    .strip_prefix("0x")
    .or_else(|| value.strip_prefix("0X"))
  {
    Some(hex) => u32::from_str_radix(hex, 16),
    None => value.parse(),
  };

  parsed.map_err(|e| format!("'{}' is not a decimal or 0x hex number: {}", value, e))
}

/// Help and version requests are not failures.
pub fn is_informational(kind: ErrorKind) -> bool {
  matches!(
    kind,
    ErrorKind::DisplayHelp
      | ErrorKind::DisplayVersion
      | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
  )
}
