use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::iter::FromIterator;

bitflags! {
  /// Device capability flags as reported by `VIDIOC_QUERYCAP`.
  pub struct Capabilities: u32 {
    const VIDEO_CAPTURE = 0x0000_0001;
    const VIDEO_OUTPUT = 0x0000_0002;
    const VIDEO_OVERLAY = 0x0000_0004;
    const VIDEO_M2M = 0x0000_8000;
    const READ_WRITE = 0x0100_0000;
    const STREAMING = 0x0400_0000;
    const DEVICE_CAPS = 0x8000_0000;
  }
}

/// One image format a device advertises on its capture or output queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDesc {
  fourcc: String,
  description: String,
}

impl FormatDesc {
  pub fn new(fourcc: impl Into<String>, description: impl Into<String>) -> FormatDesc {
    FormatDesc {
      fourcc: fourcc.into(),
      description: description.into(),
    }
  }

  pub fn fourcc(&self) -> &str {
    &self.fourcc
  }

  pub fn description(&self) -> &str {
    &self.description
  }
}

/// Capability descriptor of a probed device.
///
/// Consumers treat this as opaque; the monitor only tests it for emptiness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCaps {
  formats: SmallVec<[FormatDesc; 4]>,
}

impl DeviceCaps {
  pub fn formats(&self) -> &[FormatDesc] {
    &self.formats
  }

  pub fn len(&self) -> usize {
    self.formats.len()
  }

  pub fn is_empty(&self) -> bool {
    self.formats.is_empty()
  }
}

impl FromIterator<FormatDesc> for DeviceCaps {
  fn from_iter<I: IntoIterator<Item = FormatDesc>>(iter: I) -> DeviceCaps {
    DeviceCaps {
      formats: iter.into_iter().collect(),
    }
  }
}
