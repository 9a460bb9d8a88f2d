mod caps;
mod probe;

pub use caps::{Capabilities, DeviceCaps, FormatDesc};
pub use probe::{open, probe, ProbeError, ProbedDevice};

pub use v4l::Device as DeviceHandle;
