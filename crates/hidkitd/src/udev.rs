mod descriptor;
mod device;
mod hotplug;
mod router;

pub use device::UdevDevice;
pub use hotplug::UdevHotplug;
