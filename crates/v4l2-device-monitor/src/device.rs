use crate::probe::DeviceProbe;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, sync::Arc};
use tracing::{event, Level};
use v4l2_probe::{Capabilities, DeviceCaps, DeviceHandle, ProbeError};

/// Role of a discovered device, derived from its capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
  Source,
  Sink,
}

#[derive(Debug, Serialize)]
struct Inner {
  device_path: String,
  display_name: String,
  device_type: DeviceType,
  caps: DeviceCaps,

  #[serde(skip_serializing_if = "Option::is_none")]
  syspath: Option<String>,
}

/// One discovered video device. Immutable once constructed; cloning shares
/// the same record.
#[derive(Clone)]
pub struct V4l2Device(Arc<Inner>);

impl V4l2Device {
  pub(crate) fn new(
    device_path: String,
    display_name: String,
    device_type: DeviceType,
    caps: DeviceCaps,
    syspath: Option<String>,
  ) -> V4l2Device {
    V4l2Device(Arc::new(Inner {
      device_path,
      display_name,
      device_type,
      caps,
      syspath,
    }))
  }

  pub fn device_path(&self) -> &str {
    &self.0.device_path
  }

  pub fn display_name(&self) -> &str {
    &self.0.display_name
  }

  pub fn device_type(&self) -> DeviceType {
    self.0.device_type
  }

  pub fn caps(&self) -> &DeviceCaps {
    &self.0.caps
  }

  /// Sysfs path of the underlying udev entry. Absent for records found by a
  /// static scan, which cannot be correlated with removal events.
  pub fn syspath(&self) -> Option<&str> {
    self.0.syspath.as_deref()
  }

  /// Identity used by the live set: the syspath when known, otherwise the
  /// device path.
  pub fn key(&self) -> &str {
    self.0.syspath.as_deref().unwrap_or(&self.0.device_path)
  }

  /// Opens a handle to the device node this record describes.
  pub fn open(&self) -> Result<DeviceHandle, ProbeError> {
    v4l2_probe::open(&self.0.device_path)
  }
}

impl fmt::Debug for V4l2Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl Serialize for V4l2Device {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    Serialize::serialize(&*self.0, serializer)
  }
}

/// Classifies a device from its capability flags. Devices exposing both
/// capture and output queues (memory-to-memory) are not monitored.
pub(crate) fn classify(capabilities: Capabilities) -> Option<DeviceType> {
  let capture = capabilities.contains(Capabilities::VIDEO_CAPTURE);
  let output = capabilities.contains(Capabilities::VIDEO_OUTPUT);

  match (capture, output) {
    (true, false) => Some(DeviceType::Source),
    (false, true) => Some(DeviceType::Sink),
    _ => None,
  }
}

/// Probes and classifies one candidate path into a device record. Any
/// per-candidate failure is logged and skipped, never surfaced.
pub(crate) fn probe_device(
  probe: &dyn DeviceProbe,
  device_path: &str,
  name_hint: Option<&str>,
  syspath: Option<&str>,
) -> Option<V4l2Device> {
  let probed = match probe.probe(Path::new(device_path)) {
    Ok(probed) => probed,
    Err(error) => {
      event!(target: "v4l2-device-monitor", Level::DEBUG, device.path = %device_path, ?error, "probe failed");
      return None;
    }
  };

  let device_type = match classify(probed.capabilities) {
    Some(device_type) => device_type,
    None => {
      event!(target: "v4l2-device-monitor", Level::DEBUG, device.path = %device_path, capabilities = ?probed.capabilities, "not a capture or output device");
      return None;
    }
  };

  if probed.caps.is_empty() {
    event!(target: "v4l2-device-monitor", Level::DEBUG, device.path = %device_path, "device advertises no formats");
    return None;
  }

  let display_name = match name_hint {
    Some(name) => name.to_owned(),
    None => probed.card,
  };

  Some(V4l2Device::new(
    device_path.to_owned(),
    display_name,
    device_type,
    probed.caps,
    syspath.map(str::to_owned),
  ))
}
