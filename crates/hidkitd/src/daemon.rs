use crate::{
  config::{Config, ConfigError},
  dispatcher::{Actions, Dispatcher, EventKind},
  script::ScriptRunner,
  signals::{Signal, SignalWatchError},
  subscriber::{Batch, HotplugFacility, Subscriber, Subscription, SubscriptionError},
};
use futures::{pin_mut, Stream, StreamExt};
use thiserror::Error;
use tokio::select;
use tracing::{event, Level};

#[derive(Debug, Error)]
pub enum DaemonError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Subscription(#[from] SubscriptionError),

  #[error(transparent)]
  Signals(#[from] SignalWatchError),

  #[error("Signal stream stopped")]
  SignalsClosed,
}

enum Action {
  None,
  Shutdown,
}

enum Next<D> {
  Batch(Option<Result<(Subscription, Batch<D>), SubscriptionError>>),
  Signal(Option<Signal>),
}

/// Watches for matching devices and runs the configured scripts.
pub struct Daemon<F: HotplugFacility, R> {
  subscriber: Subscriber<F>,
  dispatcher: Dispatcher<R>,
}

impl<F, R> Daemon<F, R>
where
  F: HotplugFacility,
  R: ScriptRunner,
{
  /// Validates `config`, registers the connect and disconnect subscriptions
  /// and drains both initial batches.
  ///
  /// Both registrations must succeed before anything is drained, so a failed
  /// registration never runs a script.
  pub async fn start(config: &Config, facility: F, runner: R) -> Result<Self, DaemonError> {
    config.validate()?;
    event!(target: "hidkitd", Level::INFO, "Starting up");

    let mut subscriber = Subscriber::new(facility);
    let connected = subscriber.subscribe(&config.filter, EventKind::Connected)?;
    let disconnected = subscriber.subscribe(&config.filter, EventKind::Disconnected)?;

    let dispatcher = Dispatcher::new(Actions::from(&config.actions), runner);
    let subscription = connected.arm(&dispatcher).await;
    subscriber.activate(subscription);
    let subscription = disconnected.arm(&dispatcher).await;
    subscriber.activate(subscription);

    event!(target: "hidkitd", Level::INFO, "Monitoring started");
    Ok(Self {
      subscriber,
      dispatcher,
    })
  }

  /// Services hotplug events until a termination signal arrives.
  ///
  /// Only a signal ends the loop cleanly; the facility stopping or failing is
  /// an error.
  pub async fn run<S>(mut self, signals: S) -> Result<(), DaemonError>
  where
    S: Stream<Item = Signal>,
  {
    pin_mut!(signals);

    loop {
      let next = select! {
        batch = self.subscriber.next() => Next::Batch(batch),
        signal = signals.next() => Next::Signal(signal),
      };

      let action = match next {
        Next::Batch(batch) => self.on_batch(batch).await?,
        Next::Signal(signal) => self.on_signal(signal)?,
      };

      if let Action::Shutdown = action {
        return Ok(());
      }
    }
  }

  async fn on_batch(
    &self,
    batch: Option<Result<(Subscription, Batch<F::Device>), SubscriptionError>>,
  ) -> Result<Action, DaemonError> {
    match batch {
      None => {
        event!(target: "hidkitd", Level::ERROR, "Hotplug event stream stopped, shutting down.");
        Err(SubscriptionError::Closed.into())
      }

      Some(Err(error)) => {
        event!(target: "hidkitd", Level::ERROR, %error, "Hotplug event stream failed, shutting down.");
        Err(error.into())
      }

      Some(Ok((subscription, batch))) => {
        self.dispatcher.dispatch(subscription.kind(), batch).await;
        Ok(Action::None)
      }
    }
  }

  fn on_signal(&self, signal: Option<Signal>) -> Result<Action, DaemonError> {
    match signal {
      None => {
        event!(target: "hidkitd", Level::ERROR, "Signal stream stopped, shutting down.");
        Err(DaemonError::SignalsClosed)
      }

      Some(signal) if signal.is_termination() => {
        event!(target: "hidkitd", Level::INFO, "Received signal {}, shutting down.", signal);
        Ok(Action::Shutdown)
      }

      Some(signal) => {
        event!(target: "hidkitd", Level::INFO, "Received signal {}, nothing to reload.", signal);
        Ok(Action::None)
      }
    }
  }
}
