//! In-memory stand-ins for the hotplug facility and the script runner.

use crate::{
  criteria::{HidProperties, MatchCriteria},
  dispatcher::EventKind,
  script::{ScriptError, ScriptRunner},
  subscriber::{Batch, HotplugFacility, Registration, SubscriptionError, SubscriptionId},
};
use async_trait::async_trait;
use futures::future;
use std::{
  cell::RefCell,
  collections::VecDeque,
  fmt, io,
  path::{Path, PathBuf},
  rc::Rc,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
  Ran(PathBuf),
  Released(u32),
}

/// Shared, ordered record of script runs and device releases.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Entry>>>);

impl Journal {
  fn record(&self, entry: Entry) {
    self.0.borrow_mut().push(entry);
  }

  pub fn entries(&self) -> Vec<Entry> {
    self.0.borrow().clone()
  }

  pub fn ran(&self) -> Vec<PathBuf> {
    self
      .entries()
      .into_iter()
      .filter_map(|e| match e {
        Entry::Ran(path) => Some(path),
        Entry::Released(_) => None,
      })
      .collect()
  }

  pub fn released(&self) -> Vec<u32> {
    self
      .entries()
      .into_iter()
      .filter_map(|e| match e {
        Entry::Released(id) => Some(id),
        Entry::Ran(_) => None,
      })
      .collect()
  }
}

/// Records every script it is asked to run and always succeeds.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
  journal: Journal,
}

impl RecordingRunner {
  pub fn new(journal: &Journal) -> Self {
    Self {
      journal: journal.clone(),
    }
  }

  pub fn calls(&self) -> Vec<PathBuf> {
    self.journal.ran()
  }
}

#[async_trait(?Send)]
impl ScriptRunner for RecordingRunner {
  async fn run(&self, script: &Path) -> Result<(), ScriptError> {
    self.journal.record(Entry::Ran(script.to_owned()));
    Ok(())
  }
}

/// A device handle that journals its own release.
pub struct SimDevice {
  id: u32,
  journal: Journal,
}

impl SimDevice {
  pub fn new(id: u32, journal: &Journal) -> Self {
    Self {
      id,
      journal: journal.clone(),
    }
  }
}

impl Drop for SimDevice {
  fn drop(&mut self) {
    self.journal.record(Entry::Released(self.id));
  }
}

impl fmt::Debug for SimDevice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "SimDevice({})", self.id)
  }
}

pub fn vendor(vendor_id: u32) -> HidProperties {
  HidProperties {
    vendor_id: Some(vendor_id),
    ..Default::default()
  }
}

/// A hotplug facility driven by a script of present devices and live events.
///
/// Once the live events run out it either waits forever, like a real event
/// loop, or reports the stream as closed.
pub struct SimulatedHotplug {
  journal: Journal,
  present: Vec<(u32, HidProperties)>,
  live: VecDeque<(EventKind, u32, HidProperties)>,
  subscriptions: Vec<(SubscriptionId, EventKind, MatchCriteria)>,
  queued: VecDeque<(SubscriptionId, Batch<SimDevice>)>,
  fail_on: Option<EventKind>,
  closes: bool,
}

impl SimulatedHotplug {
  pub fn new(journal: &Journal) -> Self {
    Self {
      journal: journal.clone(),
      present: Vec::new(),
      live: VecDeque::new(),
      subscriptions: Vec::new(),
      queued: VecDeque::new(),
      fail_on: None,
      closes: false,
    }
  }

  pub fn with_present(mut self, id: u32, properties: HidProperties) -> Self {
    self.present.push((id, properties));
    self
  }

  pub fn with_live(mut self, kind: EventKind, id: u32, properties: HidProperties) -> Self {
    self.live.push_back((kind, id, properties));
    self
  }

  pub fn failing_on(mut self, kind: EventKind) -> Self {
    self.fail_on = Some(kind);
    self
  }

  pub fn closing(mut self) -> Self {
    self.closes = true;
    self
  }

  /// Registrations so far, with their criteria rendered.
  pub fn registered(&self) -> Vec<(EventKind, String)> {
    self
      .subscriptions
      .iter()
      .map(|(_, kind, criteria)| (*kind, criteria.to_string()))
      .collect()
  }
}

#[async_trait(?Send)]
impl HotplugFacility for SimulatedHotplug {
  type Device = SimDevice;

  fn subscribe(
    &mut self,
    criteria: MatchCriteria,
    kind: EventKind,
  ) -> Result<Registration<SimDevice>, SubscriptionError> {
    if self.fail_on == Some(kind) {
      return Err(SubscriptionError::Register {
        kind,
        source: io::Error::new(io::ErrorKind::Other, "simulated registration failure"),
      });
    }

    let id = SubscriptionId(self.subscriptions.len() as u32 + 1);
    let initial = match kind {
      EventKind::Connected => self
        .present
        .iter()
        .filter(|(_, properties)| criteria.match_with(properties).is_match())
        .map(|(device, _)| SimDevice::new(*device, &self.journal))
        .collect(),
      EventKind::Disconnected => Batch::empty(),
    };

    self.subscriptions.push((id, kind, criteria));
    Ok(Registration { id, initial })
  }

  async fn next_batch(
    &mut self,
  ) -> Option<Result<(SubscriptionId, Batch<SimDevice>), SubscriptionError>> {
    loop {
      if let Some(next) = self.queued.pop_front() {
        return Some(Ok(next));
      }

      let (kind, device, properties) = match self.live.pop_front() {
        Some(event) => event,
        None if self.closes => return None,
        None => return future::pending().await,
      };

      for (id, subscribed, criteria) in &self.subscriptions {
        if *subscribed == kind && criteria.match_with(&properties).is_match() {
          let batch = Batch::single(SimDevice::new(device, &self.journal));
          self.queued.push_back((*id, batch));
        }
      }
    }
  }
}
