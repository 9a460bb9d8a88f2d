use crate::{Capabilities, DeviceCaps, FormatDesc};
use std::{
  io,
  os::unix::fs::FileTypeExt,
  path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{event, Level};
use v4l::video::{Capture, Output};

/// Result of a successful capability query on a device node.
#[derive(Debug, Clone)]
pub struct ProbedDevice {
  pub capabilities: Capabilities,
  pub caps: DeviceCaps,

  /// Card name reported by the driver, used as a display-name fallback.
  pub card: String,
}

#[derive(Debug, Error)]
pub enum ProbeError {
  #[error("failed to stat {}", .path.display())]
  Stat {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{} is not a character device", .path.display())]
  NotCharDevice { path: PathBuf },

  #[error("failed to open {}", .path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("capability query on {} failed", .path.display())]
  QueryCaps {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("format enumeration on {} failed", .path.display())]
  EnumFormats {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ProbeError {
  fn stat(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::Stat {
      path: path.into(),
      source,
    }
  }

  fn not_char_device(path: impl Into<PathBuf>) -> Self {
    Self::NotCharDevice { path: path.into() }
  }

  fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::Open {
      path: path.into(),
      source,
    }
  }

  fn query_caps(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::QueryCaps {
      path: path.into(),
      source,
    }
  }

  fn enum_formats(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::EnumFormats {
      path: path.into(),
      source,
    }
  }
}

/// Opens a candidate device node and queries its capability set.
///
/// Safe to call repeatedly; the device handle is released before returning.
pub fn probe(path: impl AsRef<Path>) -> Result<ProbedDevice, ProbeError> {
  let path = path.as_ref();

  let metadata = std::fs::metadata(path).map_err(|source| ProbeError::stat(path, source))?;
  if !metadata.file_type().is_char_device() {
    return Err(ProbeError::not_char_device(path));
  }

  let device = v4l::Device::with_path(path).map_err(|source| ProbeError::open(path, source))?;
  let vcap = device
    .query_caps()
    .map_err(|source| ProbeError::query_caps(path, source))?;
  let capabilities = Capabilities::from_bits_truncate(vcap.capabilities.bits());

  // Formats come from the queue matching the reported role; devices exposing
  // both queues answer for capture.
  let formats = if capabilities.contains(Capabilities::VIDEO_CAPTURE) {
    Capture::enum_formats(&device).map_err(|source| ProbeError::enum_formats(path, source))?
  } else if capabilities.contains(Capabilities::VIDEO_OUTPUT) {
    Output::enum_formats(&device).map_err(|source| ProbeError::enum_formats(path, source))?
  } else {
    Vec::new()
  };

  let caps = formats
    .iter()
    .map(|format| FormatDesc::new(format.fourcc.to_string(), format.description.clone()))
    .collect::<DeviceCaps>();

  event!(
    target: "v4l2-probe",
    Level::DEBUG,
    device.path = %path.display(),
    device.card = %vcap.card,
    device.formats = caps.len(),
    "probed device"
  );

  Ok(ProbedDevice {
    capabilities,
    caps,
    card: vcap.card,
  })
}

/// Opens a device node for use, without querying capabilities.
///
/// This is the handle factory consumers call on a discovered device record.
pub fn open(path: impl AsRef<Path>) -> Result<v4l::Device, ProbeError> {
  let path = path.as_ref();
  v4l::Device::with_path(path).map_err(|source| ProbeError::open(path, source))
}
