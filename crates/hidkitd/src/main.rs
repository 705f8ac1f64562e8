use std::process::ExitCode;

mod app;
mod config;
mod criteria;
mod daemon;
mod dispatcher;
mod script;
mod signals;
mod subscriber;
mod udev;

#[cfg(test)]
mod testing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
  app::run().await
}
