mod device;
mod monitor;
mod probe;
mod scan;
mod watch;

pub use device::{DeviceType, V4l2Device};
pub use monitor::{DeviceListener, Monitor, MonitorError, MonitorState};
pub use probe::{DeviceProbe, V4l2Probe};

pub use v4l2_probe::{Capabilities, DeviceCaps, DeviceHandle, FormatDesc, ProbeError, ProbedDevice};
