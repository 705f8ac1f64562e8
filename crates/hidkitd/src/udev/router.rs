use super::descriptor::PrimaryUsage;
use crate::{
  criteria::{HidProperties, MatchCriteria},
  dispatcher::EventKind,
  subscriber::SubscriptionId,
};
use smallvec::SmallVec;
use std::{
  collections::{BTreeMap, BTreeSet},
  path::{Path, PathBuf},
};
use tokio_udev::EventType;
use tracing::{event, Level};

pub(super) fn event_kind(event_type: EventType) -> Option<EventKind> {
  match event_type {
    EventType::Add => Some(EventKind::Connected),
    EventType::Remove => Some(EventKind::Disconnected),
    _ => None,
  }
}

struct Route {
  id: SubscriptionId,
  kind: EventKind,
  criteria: MatchCriteria,
  // devices handed out in the initial batch whose `add` may still be queued
  reported: BTreeSet<PathBuf>,
}

/// Decides which subscriptions a device event belongs to.
///
/// Keeps the primary usage of every device seen arriving, keyed by syspath,
/// so removals can still be matched on usage.
#[derive(Default)]
pub(super) struct Router {
  routes: Vec<Route>,
  usages: BTreeMap<PathBuf, PrimaryUsage>,
}

impl Router {
  pub fn register(&mut self, criteria: MatchCriteria, kind: EventKind) -> SubscriptionId {
    let id = SubscriptionId(self.routes.len() as u32 + 1);
    self.routes.push(Route {
      id,
      kind,
      criteria,
      reported: BTreeSet::new(),
    });

    id
  }

  /// Whether a present device belongs in the initial batch of `id`. Claimed
  /// devices are not reported again by a queued `add` for the same syspath.
  pub fn claim(&mut self, id: SubscriptionId, syspath: &Path, properties: &HidProperties) -> bool {
    let route = match self.routes.iter_mut().find(|r| r.id == id) {
      Some(route) => route,
      None => return false,
    };

    if route.kind != EventKind::Connected || !route.criteria.match_with(properties).is_match() {
      return false;
    }

    route.reported.insert(syspath.to_owned());
    true
  }

  pub fn arrived(
    &mut self,
    syspath: &Path,
    properties: &mut HidProperties,
    usage: Option<PrimaryUsage>,
  ) {
    if let Some(usage) = usage {
      usage.apply_to(properties);
      self.usages.insert(syspath.to_owned(), usage);
    }
  }

  pub fn departed(&mut self, syspath: &Path, properties: &mut HidProperties) {
    if let Some(usage) = self.usages.remove(syspath) {
      usage.apply_to(properties);
    }
  }

  /// Subscriptions that get a batch for this event, in registration order.
  pub fn route(
    &mut self,
    kind: EventKind,
    syspath: &Path,
    properties: &HidProperties,
  ) -> SmallVec<[SubscriptionId; 2]> {
    let mut matched = SmallVec::new();

    for route in &mut self.routes {
      if kind == EventKind::Disconnected {
        route.reported.remove(syspath);
      }

      if route.kind != kind {
        continue;
      }

      if route.reported.remove(syspath) {
        event!(target: "hidkitd", Level::DEBUG, subscription.id = %route.id, syspath = %syspath.display(), "Device already reported at startup");
        continue;
      }

      let result = route.criteria.match_with(properties);
      if result.is_match() {
        matched.push(route.id);
      } else {
        event!(target: "hidkitd", Level::TRACE, subscription.id = %route.id, syspath = %syspath.display(), mismatches = ?result.mismatches(), "Device does not match");
      }
    }

    matched
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::FilterConfig;

  const KEYBOARD: PrimaryUsage = PrimaryUsage { page: 1, usage: 6 };

  fn criteria(filter: FilterConfig) -> MatchCriteria {
    MatchCriteria::build(&filter).unwrap()
  }

  fn keyboards() -> MatchCriteria {
    criteria(FilterConfig {
      usage_page: Some(1),
      usage: Some(6),
      ..Default::default()
    })
  }

  fn logitech() -> MatchCriteria {
    criteria(FilterConfig {
      vendor_id: Some(0x046d),
      ..Default::default()
    })
  }

  fn uevent_properties(vendor_id: u32) -> HidProperties {
    HidProperties {
      vendor_id: Some(vendor_id),
      product_id: Some(0xc52b),
      ..Default::default()
    }
  }

  #[test]
  fn maps_add_and_remove_only() {
    assert_eq!(event_kind(EventType::Add), Some(EventKind::Connected));
    assert_eq!(event_kind(EventType::Remove), Some(EventKind::Disconnected));
    assert_eq!(event_kind(EventType::Change), None);
    assert_eq!(event_kind(EventType::Bind), None);
    assert_eq!(event_kind(EventType::Unbind), None);
    assert_eq!(event_kind(EventType::Unknown), None);
  }

  #[test]
  fn removal_matches_usage_seeded_at_arrival() {
    let mut router = Router::default();
    let removed = router.register(keyboards(), EventKind::Disconnected);
    let syspath = Path::new("/sys/devices/usb1/0003:046D:C52B.0001");

    let mut arriving = uevent_properties(0x046d);
    router.arrived(syspath, &mut arriving, Some(KEYBOARD));
    assert_eq!(arriving.usage_page, Some(1));

    // a remove uevent carries no report descriptor
    let mut departing = uevent_properties(0x046d);
    router.departed(syspath, &mut departing);
    assert_eq!(
      router
        .route(EventKind::Disconnected, syspath, &departing)
        .as_slice(),
      &[removed]
    );

    // the cache entry is gone once the device is
    let mut again = uevent_properties(0x046d);
    router.departed(syspath, &mut again);
    assert!(router
      .route(EventKind::Disconnected, syspath, &again)
      .is_empty());
  }

  #[test]
  fn removal_of_unseen_device_has_no_usage() {
    let mut router = Router::default();
    router.register(keyboards(), EventKind::Disconnected);
    let syspath = Path::new("/sys/devices/usb1/0003:046D:C52B.0002");

    let mut departing = uevent_properties(0x046d);
    router.departed(syspath, &mut departing);
    assert_eq!(departing.usage, None);
    assert!(router
      .route(EventKind::Disconnected, syspath, &departing)
      .is_empty());
  }

  #[test]
  fn every_matching_subscription_of_the_kind_is_routed_once() {
    let mut router = Router::default();
    let first = router.register(logitech(), EventKind::Connected);
    let removed = router.register(logitech(), EventKind::Disconnected);
    let second = router.register(logitech(), EventKind::Connected);
    router.register(keyboards(), EventKind::Connected);
    let syspath = Path::new("/sys/devices/usb1/0003:046D:C52B.0003");

    let arriving = uevent_properties(0x046d);
    assert_eq!(
      router
        .route(EventKind::Connected, syspath, &arriving)
        .as_slice(),
      &[first, second]
    );
    assert_eq!(
      router
        .route(EventKind::Disconnected, syspath, &arriving)
        .as_slice(),
      &[removed]
    );

    let other = uevent_properties(0x1234);
    assert!(router
      .route(EventKind::Connected, syspath, &other)
      .is_empty());
  }

  #[test]
  fn queued_add_for_a_claimed_device_is_dropped() {
    let mut router = Router::default();
    let connected = router.register(logitech(), EventKind::Connected);
    let syspath = Path::new("/sys/devices/usb1/0003:046D:C52B.0004");
    let properties = uevent_properties(0x046d);

    // plugged in between opening the monitor and enumerating
    assert!(router.claim(connected, syspath, &properties));
    assert!(router
      .route(EventKind::Connected, syspath, &properties)
      .is_empty());

    // a later replug is reported normally
    router.route(EventKind::Disconnected, syspath, &properties);
    assert_eq!(
      router
        .route(EventKind::Connected, syspath, &properties)
        .as_slice(),
      &[connected]
    );
  }

  #[test]
  fn claim_after_removal_does_not_swallow_the_next_add() {
    let mut router = Router::default();
    let connected = router.register(logitech(), EventKind::Connected);
    let syspath = Path::new("/sys/devices/usb1/0003:046D:C52B.0005");
    let properties = uevent_properties(0x046d);

    assert!(router.claim(connected, syspath, &properties));
    router.route(EventKind::Disconnected, syspath, &properties);

    assert_eq!(
      router
        .route(EventKind::Connected, syspath, &properties)
        .as_slice(),
      &[connected]
    );
  }

  #[test]
  fn only_matching_connect_subscriptions_claim() {
    let mut router = Router::default();
    let connected = router.register(logitech(), EventKind::Connected);
    let removed = router.register(logitech(), EventKind::Disconnected);
    let syspath = Path::new("/sys/devices/usb1/0003:1234:0001.0006");

    assert!(!router.claim(connected, syspath, &uevent_properties(0x1234)));
    assert!(!router.claim(removed, syspath, &uevent_properties(0x046d)));
    assert!(!router.claim(SubscriptionId(42), syspath, &uevent_properties(0x046d)));
  }
}
