use async_trait::async_trait;
use std::{
  io,
  path::{Path, PathBuf},
  process::ExitStatus,
};
use thiserror::Error;
use tokio::process::Command;
use tracing::{event, Level};

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("Failed to start script {}", .path.display())]
  Spawn {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Script {} exited with {status}", .path.display())]
  Failed { path: PathBuf, status: ExitStatus },
}

/// Launches an action script and waits for it to exit.
#[async_trait(?Send)]
pub trait ScriptRunner {
  async fn run(&self, script: &Path) -> Result<(), ScriptError>;
}

/// Runs scripts as child processes.
///
/// The path is the program itself: it is never split on whitespace or handed
/// to a shell, and the child gets no arguments and the daemon's environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait(?Send)]
impl ScriptRunner for ProcessRunner {
  async fn run(&self, script: &Path) -> Result<(), ScriptError> {
    event!(target: "hidkitd", Level::INFO, script.path = %script.display(), "Executing script");

    let status = Command::new(script)
      .status()
      .await
      .map_err(|source| ScriptError::Spawn {
        path: script.to_owned(),
        source,
      })?;

    if status.success() {
      Ok(())
    } else {
      Err(ScriptError::Failed {
        path: script.to_owned(),
        status,
      })
    }
  }
}

/// Runs `script` if one is configured. Failures are logged and swallowed.
pub async fn run_script<R>(runner: &R, script: Option<&Path>)
where
  R: ScriptRunner + ?Sized,
{
  let script = match script {
    Some(script) => script,
    None => return,
  };

  if let Err(error) = runner.run(script).await {
    event!(target: "hidkitd", Level::WARN, script.path = %script.display(), %error, "Script did not complete successfully");
  }
}
