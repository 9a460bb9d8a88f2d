use crate::{device, probe::DeviceProbe, V4l2Device};
use tracing::{event, Level};

/// Fixed candidate namespace covered by one-shot discovery.
const DEV_PATH_BASES: [&str; 2] = ["/dev/video", "/dev/v4l2/video"];
const MAX_DEVICE_INDEX: u32 = 64;

/// Probes every candidate path once and returns the records that classified.
///
/// Per-candidate failures are skipped; an empty result is valid. Output order
/// is deterministic for a fixed filesystem state.
pub(crate) fn scan(probe: &dyn DeviceProbe) -> Vec<V4l2Device> {
  let mut devices = Vec::new();

  for index in 0..MAX_DEVICE_INDEX {
    for base in &DEV_PATH_BASES {
      let path = format!("{}{}", base, index);
      if let Some(device) = device::probe_device(probe, &path, None, None) {
        devices.push(device);
      }
    }
  }

  event!(target: "v4l2-device-monitor", Level::DEBUG, devices.len = devices.len(), "static scan finished");
  devices
}
