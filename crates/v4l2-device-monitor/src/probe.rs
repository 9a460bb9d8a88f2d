use std::path::Path;
use v4l2_probe::{ProbeError, ProbedDevice};

/// Capability used to open and capability-query a candidate device node.
///
/// Implementations must release any OS handle before returning and must be
/// safe to call repeatedly for the same path.
pub trait DeviceProbe: Send + Sync {
  fn probe(&self, path: &Path) -> Result<ProbedDevice, ProbeError>;
}

/// Probe backed by the real video4linux2 ioctl surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Probe;

impl DeviceProbe for V4l2Probe {
  fn probe(&self, path: &Path) -> Result<ProbedDevice, ProbeError> {
    v4l2_probe::probe(path)
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::DeviceProbe;
  use std::{collections::HashMap, iter::FromIterator, path::Path};
  use v4l2_probe::{Capabilities, DeviceCaps, FormatDesc, ProbeError, ProbedDevice};

  /// Probe answering from a fixed table; any other path fails.
  #[derive(Debug, Default)]
  pub struct TableProbe {
    entries: HashMap<String, ProbedDevice>,
  }

  impl TableProbe {
    pub fn new() -> TableProbe {
      TableProbe::default()
    }

    pub fn insert(&mut self, path: &str, capabilities: Capabilities, card: &str) -> &mut TableProbe {
      let caps = DeviceCaps::from_iter(vec![FormatDesc::new("YUYV", "YUYV 4:2:2")]);
      self.insert_with_caps(path, capabilities, card, caps)
    }

    pub fn insert_with_caps(
      &mut self,
      path: &str,
      capabilities: Capabilities,
      card: &str,
      caps: DeviceCaps,
    ) -> &mut TableProbe {
      self.entries.insert(
        path.to_owned(),
        ProbedDevice {
          capabilities,
          caps,
          card: card.to_owned(),
        },
      );
      self
    }
  }

  impl DeviceProbe for TableProbe {
    fn probe(&self, path: &Path) -> Result<ProbedDevice, ProbeError> {
      match path.to_str().and_then(|path| self.entries.get(path)) {
        Some(probed) => Ok(probed.clone()),
        None => Err(ProbeError::NotCharDevice {
          path: path.to_owned(),
        }),
      }
    }
  }
}
