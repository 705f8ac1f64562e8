mod args;

use self::args::{is_informational, Args, LogFormat};
use crate::{
  config::{Config, ConfigError},
  daemon::{Daemon, DaemonError},
  script::ProcessRunner,
  signals::Signal,
  udev::UdevHotplug,
};
use anyhow::Context;
use clap::Parser;
use std::{io, process::ExitCode};
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::from_default_env()
    // Set the base level when not matched by other directives to INFO.
    .add_directive(tracing::Level::INFO.into());

  match format {
    LogFormat::Pretty => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    }
    LogFormat::Json => {
      tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_current_span(false)
        .with_span_list(false)
        .init();
    }
  }
}

async fn serve(config: Config) -> Result<(), DaemonError> {
  // registered first so a signal arriving during the initial drain is kept
  let signals = Signal::watch()?;

  let daemon = Daemon::start(&config, UdevHotplug::new(), ProcessRunner).await?;
  daemon.run(signals).await?;
  event!(target: "hidkitd", Level::INFO, "Shut down");

  Ok(())
}

/// Rejects a config that could never do anything, before logging is set up.
fn prepare(args: Args) -> Result<(LogFormat, Config), ConfigError> {
  let format = args.log_format;
  let config = Config::from(args);
  config.validate()?;

  Ok((format, config))
}

fn parse_args() -> Result<Option<Args>, ConfigError> {
  match Args::try_parse() {
    Ok(args) => Ok(Some(args)),
    Err(error) if is_informational(error.kind()) => {
      let _ = error.print();
      Ok(None)
    }
    Err(error) => Err(error.into()),
  }
}

pub async fn run() -> ExitCode {
  let args = match parse_args() {
    Ok(Some(args)) => args,
    Ok(None) => return ExitCode::SUCCESS,
    Err(error) => {
      eprintln!("{}", error);
      return ExitCode::FAILURE;
    }
  };

  let (format, config) = match prepare(args) {
    Ok(prepared) => prepared,
    Err(error) => {
      eprintln!("{}", error);
      return ExitCode::FAILURE;
    }
  };

  init_tracing(format);

  match serve(config).await.context("hidkitd stopped") {
    Ok(()) => ExitCode::SUCCESS,
    Err(error) => {
      event!(target: "hidkitd", Level::ERROR, "{:#}", error);
      ExitCode::FAILURE
    }
  }
}
