use crate::{
  config::ActionConfig,
  script::{run_script, ScriptRunner},
  subscriber::Batch,
};
use std::{
  fmt,
  path::{Path, PathBuf},
};
use tracing::{event, Level};

/// What a subscription reports: devices showing up, or devices going away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  Connected,
  Disconnected,
}

impl EventKind {
  #[cfg(test)]
  pub const ALL: [EventKind; 2] = [EventKind::Connected, EventKind::Disconnected];

  pub const fn name(self) -> &'static str {
    match self {
      EventKind::Connected => "connect",
      EventKind::Disconnected => "disconnect",
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Script paths keyed by event kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actions {
  on_connect: Option<PathBuf>,
  on_disconnect: Option<PathBuf>,
}

impl Actions {
  pub fn script_for(&self, kind: EventKind) -> Option<&Path> {
    match kind {
      EventKind::Connected => self.on_connect.as_deref(),
      EventKind::Disconnected => self.on_disconnect.as_deref(),
    }
  }
}

impl<'a> From<&'a ActionConfig> for Actions {
  fn from(config: &'a ActionConfig) -> Self {
    Actions {
      on_connect: config.on_connect().map(Path::to_owned),
      on_disconnect: config.on_disconnect().map(Path::to_owned),
    }
  }
}

/// Feeds batches of device entries to the script runner.
///
/// Every batch goes through [`Dispatcher::dispatch`], both the snapshot a
/// subscription returns when it is registered and every live notification
/// after that.
pub struct Dispatcher<R> {
  actions: Actions,
  runner: R,
}

impl<R: ScriptRunner> Dispatcher<R> {
  pub fn new(actions: Actions, runner: R) -> Self {
    Self { actions, runner }
  }

  /// Drains `batch`, running the script configured for `kind` once per entry,
  /// and returns how many entries were handled.
  ///
  /// Entries are released as soon as their script has finished, whether or
  /// not it succeeded.
  pub async fn dispatch<D>(&self, kind: EventKind, batch: Batch<D>) -> usize
  where
    D: fmt::Debug,
  {
    let script = self.actions.script_for(kind);
    let mut handled = 0;

    for device in batch {
      event!(target: "hidkitd", Level::INFO, event.kind = %kind, ?device, "Received {} event", kind);
      run_script(&self.runner, script).await;
      drop(device);
      handled += 1;
    }

    handled
  }
}

impl<R> fmt::Debug for Dispatcher<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dispatcher")
      .field("actions", &self.actions)
      .finish()
  }
}
