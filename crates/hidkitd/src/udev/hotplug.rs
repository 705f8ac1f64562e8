use super::{
  device::{read_primary_usage, UdevDevice, UdevDeviceExt, HID_SUBSYSTEM},
  router::{event_kind, Router},
};
use crate::{
  criteria::{HidProperties, MatchCriteria},
  dispatcher::EventKind,
  subscriber::{Batch, HotplugFacility, Registration, SubscriptionError, SubscriptionId},
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use tokio_udev::{AsyncMonitorSocket, Enumerator, MonitorBuilder};
use tracing::{event, Level};

/// Hotplug notifications for HID devices, backed by a udev monitor on the
/// `hid` subsystem.
///
/// The monitor socket is opened by the first registration, before any
/// enumeration, so a device that arrives while the present devices are being
/// listed is still reported, and reported once.
///
/// libudev handles are not thread safe; this must be driven from a single
/// thread.
pub struct UdevHotplug {
  socket: Option<AsyncMonitorSocket>,
  router: Router,
  queued: VecDeque<(SubscriptionId, Batch<UdevDevice>)>,
}

impl UdevHotplug {
  pub fn new() -> Self {
    Self {
      socket: None,
      router: Router::default(),
      queued: VecDeque::new(),
    }
  }

  fn listen(&mut self, kind: EventKind) -> Result<(), SubscriptionError> {
    if self.socket.is_some() {
      return Ok(());
    }

    let builder = MonitorBuilder::new()
      .and_then(|builder| builder.match_subsystem(HID_SUBSYSTEM))
      .map_err(|source| SubscriptionError::Filter { kind, source })?;

    let socket = builder
      .listen()
      .and_then(AsyncMonitorSocket::new)
      .map_err(|source| SubscriptionError::Register { kind, source })?;

    event!(target: "hidkitd", Level::DEBUG, subsystem = HID_SUBSYSTEM, "Listening for udev events");
    self.socket = Some(socket);
    Ok(())
  }

  fn scan(&mut self) -> Result<Vec<(tokio_udev::Device, HidProperties)>, SubscriptionError> {
    let mut enumerator = Enumerator::new().map_err(SubscriptionError::Enumerate)?;
    enumerator
      .match_subsystem(HID_SUBSYSTEM)
      .map_err(SubscriptionError::Enumerate)?;

    let mut present = Vec::new();
    for device in enumerator
      .scan_devices()
      .map_err(SubscriptionError::Enumerate)?
    {
      let properties = self.arrived(&device);
      present.push((device, properties));
    }

    event!(target: "hidkitd", Level::DEBUG, devices = present.len(), "Enumerated present devices");
    Ok(present)
  }

  fn arrived(&mut self, device: &tokio_udev::Device) -> HidProperties {
    let mut properties = device.hid_properties();
    let usage = read_primary_usage(device.syspath());
    self
      .router
      .arrived(device.syspath(), &mut properties, usage);

    properties
  }

  fn departed(&mut self, device: &tokio_udev::Device) -> HidProperties {
    let mut properties = device.hid_properties();
    self.router.departed(device.syspath(), &mut properties);

    properties
  }
}

impl Default for UdevHotplug {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait(?Send)]
impl HotplugFacility for UdevHotplug {
  type Device = UdevDevice;

  fn subscribe(
    &mut self,
    criteria: MatchCriteria,
    kind: EventKind,
  ) -> Result<Registration<UdevDevice>, SubscriptionError> {
    self.listen(kind)?;

    // removals need the usage cache seeded even though their snapshot is empty
    let present = self.scan()?;
    let id = self.router.register(criteria, kind);

    let router = &mut self.router;
    let initial = present
      .into_iter()
      .filter(|(device, properties)| router.claim(id, device.syspath(), properties))
      .map(|(device, properties)| UdevDevice::new(device, properties))
      .collect();

    Ok(Registration { id, initial })
  }

  async fn next_batch(
    &mut self,
  ) -> Option<Result<(SubscriptionId, Batch<UdevDevice>), SubscriptionError>> {
    loop {
      if let Some(next) = self.queued.pop_front() {
        return Some(Ok(next));
      }

      let socket = self.socket.as_mut()?;
      let event = match socket.next().await? {
        Ok(event) => event,
        Err(error) => return Some(Err(SubscriptionError::Monitor(error))),
      };

      let device = event.device();
      let kind = match event_kind(event.event_type()) {
        Some(kind) => kind,
        None => {
          event!(target: "hidkitd", Level::TRACE, udev.action = ?event.event_type(), syspath = %device.syspath().display(), "Ignoring udev event");
          continue;
        }
      };

      let properties = match kind {
        EventKind::Connected => self.arrived(&device),
        EventKind::Disconnected => self.departed(&device),
      };

      for id in self.router.route(kind, device.syspath(), &properties) {
        let entry = UdevDevice::new(device.clone(), properties.clone());
        self.queued.push_back((id, Batch::single(entry)));
      }
    }
  }
}
