use crate::{
  config::{ConfigError, FilterConfig},
  criteria::MatchCriteria,
  dispatcher::{Dispatcher, EventKind},
  script::ScriptRunner,
};
use async_trait::async_trait;
use std::{
  collections::{BTreeMap, VecDeque},
  fmt, io,
  iter::FromIterator,
};
use thiserror::Error;
use tracing::{event, Level};

#[derive(Debug, Error)]
pub enum SubscriptionError {
  #[error("Failed to build match criteria")]
  InvalidCriteria(#[from] ConfigError),

  #[error("Failed to build the {kind} filter")]
  Filter {
    kind: EventKind,
    #[source]
    source: io::Error,
  },

  #[error("Failed to register the {kind} subscription")]
  Register {
    kind: EventKind,
    #[source]
    source: io::Error,
  },

  #[error("Failed to enumerate present devices")]
  Enumerate(#[source] io::Error),

  #[error("Failed to receive hotplug events")]
  Monitor(#[source] io::Error),

  #[error("Received a batch for subscription {0} which is not armed")]
  NotArmed(SubscriptionId),

  #[error("Hotplug event stream closed")]
  Closed,
}

/// Handle of one registration with a [`HotplugFacility`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// Device entries delivered together, either the snapshot taken at
/// registration or one live notification.
///
/// Entries are handed out by value; dropping an entry releases the host's
/// handle for it.
#[derive(Debug)]
pub struct Batch<D> {
  entries: VecDeque<D>,
}

impl<D> Batch<D> {
  pub fn empty() -> Self {
    Self {
      entries: VecDeque::new(),
    }
  }

  pub fn single(entry: D) -> Self {
    let mut entries = VecDeque::with_capacity(1);
    entries.push_back(entry);
    Self { entries }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}

impl<D> Iterator for Batch<D> {
  type Item = D;

  fn next(&mut self) -> Option<D> {
    self.entries.pop_front()
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.entries.len(), Some(self.entries.len()))
  }
}

impl<D> FromIterator<D> for Batch<D> {
  fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}

/// What a facility hands back from a registration.
#[derive(Debug)]
pub struct Registration<D> {
  pub id: SubscriptionId,
  pub initial: Batch<D>,
}

/// The host's device hotplug notification facility.
///
/// `subscribe` returns at once with a handle and a batch of the devices that
/// already satisfy the criteria. That batch must be drained before live
/// batches for the subscription can be trusted.
#[async_trait(?Send)]
pub trait HotplugFacility {
  type Device: fmt::Debug;

  fn subscribe(
    &mut self,
    criteria: MatchCriteria,
    kind: EventKind,
  ) -> Result<Registration<Self::Device>, SubscriptionError>;

  /// Waits for the next live batch. `None` means the facility stopped.
  async fn next_batch(
    &mut self,
  ) -> Option<Result<(SubscriptionId, Batch<Self::Device>), SubscriptionError>>;
}

/// A registered subscription whose initial batch has not been drained yet.
#[must_use = "the initial batch must be drained with `arm` or the subscription never fires"]
#[derive(Debug)]
pub struct PendingSubscription<D> {
  id: SubscriptionId,
  kind: EventKind,
  initial: Batch<D>,
}

impl<D: fmt::Debug> PendingSubscription<D> {
  #[cfg(test)]
  pub fn id(&self) -> SubscriptionId {
    self.id
  }

  #[cfg(test)]
  pub fn initial_len(&self) -> usize {
    self.initial.len()
  }

  /// Drains the initial batch through `dispatcher`, which arms the subscription.
  pub async fn arm<R: ScriptRunner>(self, dispatcher: &Dispatcher<R>) -> Subscription {
    let PendingSubscription { id, kind, initial } = self;
    let drained = dispatcher.dispatch(kind, initial).await;
    event!(target: "hidkitd", Level::DEBUG, subscription.id = %id, event.kind = %kind, drained, "Subscription armed");

    Subscription { id, kind }
  }
}

/// An armed subscription. It stays live until the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
  id: SubscriptionId,
  kind: EventKind,
}

impl Subscription {
  #[cfg(test)]
  pub fn id(&self) -> SubscriptionId {
    self.id
  }

  pub fn kind(&self) -> EventKind {
    self.kind
  }
}

/// Registers subscriptions with a facility and routes its live batches.
pub struct Subscriber<F> {
  facility: F,
  armed: BTreeMap<SubscriptionId, Subscription>,
}

impl<F: HotplugFacility> Subscriber<F> {
  pub fn new(facility: F) -> Self {
    Self {
      facility,
      armed: BTreeMap::new(),
    }
  }

  /// Builds fresh criteria from `filter` and registers them for `kind`.
  pub fn subscribe(
    &mut self,
    filter: &FilterConfig,
    kind: EventKind,
  ) -> Result<PendingSubscription<F::Device>, SubscriptionError> {
    let criteria = MatchCriteria::build(filter)?;
    event!(target: "hidkitd", Level::DEBUG, event.kind = %kind, %criteria, "Registering subscription");

    let Registration { id, initial } = self.facility.subscribe(criteria, kind)?;
    event!(target: "hidkitd", Level::DEBUG, subscription.id = %id, event.kind = %kind, initial.len = initial.len(), "Subscription registered");

    Ok(PendingSubscription { id, kind, initial })
  }

  /// Makes an armed subscription eligible for live batches.
  pub fn activate(&mut self, subscription: Subscription) {
    self.armed.insert(subscription.id, subscription);
  }

  #[cfg(test)]
  pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
    self.armed.values()
  }

  /// Waits for the next live batch and resolves the subscription it belongs to.
  pub async fn next(
    &mut self,
  ) -> Option<Result<(Subscription, Batch<F::Device>), SubscriptionError>> {
    let (id, batch) = match self.facility.next_batch().await? {
      Ok(next) => next,
      Err(error) => return Some(Err(error)),
    };

    match self.armed.get(&id) {
      Some(subscription) => Some(Ok((*subscription, batch))),
      None => Some(Err(SubscriptionError::NotArmed(id))),
    }
  }

  #[cfg(test)]
  pub fn facility(&self) -> &F {
    &self.facility
  }
}
