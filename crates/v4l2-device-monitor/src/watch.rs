use crate::{
  device,
  monitor::{DeviceListener, Shared},
  probe::DeviceProbe,
  V4l2Device,
};
use futures::StreamExt;
use std::{ffi::OsStr, io, sync::Arc, thread};
use tokio::{runtime::Builder, select, sync::oneshot, task::LocalSet};
use tokio_udev::{AsyncMonitorSocket, Device, Enumerator, EventType, MonitorBuilder};
use tracing::{event, Level};

/// udev subsystem the watch is scoped to.
const SUBSYSTEM: &str = "video4linux";

/// The subsystem multiplexes v4l1 and v4l2 nodes; only version 2 is
/// monitored.
const V4L_VERSION_PROPERTY: &str = "ID_V4L_VERSION";

/// Owns the watch thread and the channel used to cancel its event loop.
pub(crate) struct WatchHandle {
  thread: thread::JoinHandle<()>,
  terminate: oneshot::Sender<()>,
}

impl WatchHandle {
  /// Posts the terminate instruction into the watch loop and waits for the
  /// thread to exit. The loop is never force-killed; an in-flight event is
  /// fully applied before the thread ends.
  pub(crate) fn shutdown(self) {
    let _ = self.terminate.send(());
    let _ = self.thread.join();
  }
}

pub(crate) fn spawn(
  shared: Arc<Shared>,
  probe: Arc<dyn DeviceProbe>,
  listener: Arc<dyn DeviceListener>,
) -> io::Result<WatchHandle> {
  let (terminate, terminate_receiver) = oneshot::channel();
  let thread = thread::Builder::new()
    .name("v4l2-device-monitor".into())
    .spawn(move || run(shared, probe, listener, terminate_receiver))?;

  Ok(WatchHandle { thread, terminate })
}

// The udev socket is not Send, so the whole watch lives on its own thread
// with a current-thread runtime.
fn run(
  shared: Arc<Shared>,
  probe: Arc<dyn DeviceProbe>,
  listener: Arc<dyn DeviceListener>,
  terminate: oneshot::Receiver<()>,
) {
  let runtime = match Builder::new_current_thread().enable_all().build() {
    Ok(runtime) => runtime,
    Err(error) => {
      event!(target: "v4l2-device-monitor", Level::WARN, ?error, "failed to build watch runtime");
      shared.mark_ready(false);
      return;
    }
  };

  let local = LocalSet::new();
  local.block_on(&runtime, watch(shared, probe, listener, terminate));
}

async fn watch(
  shared: Arc<Shared>,
  probe: Arc<dyn DeviceProbe>,
  listener: Arc<dyn DeviceListener>,
  mut terminate: oneshot::Receiver<()>,
) {
  // Subscribe before enumerating so a device arriving in between is not
  // lost.
  let mut socket = match subscribe() {
    Ok(socket) => socket,
    Err(error) => {
      event!(target: "v4l2-device-monitor", Level::WARN, ?error, "udev watch unavailable, hotplug events disabled");
      // Readiness is signaled regardless, and the thread stays parked so
      // teardown is the same in both modes.
      shared.mark_ready(false);
      let _ = terminate.await;
      return;
    }
  };

  if let Err(error) = enumerate(&shared, &*probe, &*listener) {
    event!(target: "v4l2-device-monitor", Level::WARN, ?error, "initial device enumeration failed");
  }

  shared.mark_ready(true);

  loop {
    select! {
      _ = &mut terminate => break,
      next = socket.next() => match next {
        None => break,
        Some(Ok(udev_event)) => handle_event(&shared, &*probe, &*listener, udev_event),
        Some(Err(error)) => {
          event!(target: "v4l2-device-monitor", Level::WARN, ?error, "udev socket error");
        }
      },
    }
  }
}

fn subscribe() -> io::Result<AsyncMonitorSocket> {
  MonitorBuilder::new()?
    .match_subsystem(SUBSYSTEM)?
    .listen()
    .and_then(AsyncMonitorSocket::new)
}

/// Synchronous sweep of the devices the subsystem already reports, applied
/// to the live set before readiness is signaled.
fn enumerate(shared: &Shared, probe: &dyn DeviceProbe, listener: &dyn DeviceListener) -> io::Result<()> {
  let mut enumerator = Enumerator::new()?;
  enumerator.match_subsystem(SUBSYSTEM)?;

  for udev_device in enumerator.scan_devices()? {
    if !is_v4l2(&udev_device) {
      continue;
    }

    if let Some(device) = record_from_udev(probe, &udev_device) {
      shared.apply_add(device, listener);
    }
  }

  Ok(())
}

fn handle_event(
  shared: &Shared,
  probe: &dyn DeviceProbe,
  listener: &dyn DeviceListener,
  udev_event: tokio_udev::Event,
) {
  let udev_device = udev_event.device();
  if !is_v4l2(&udev_device) {
    return;
  }

  match udev_event.event_type() {
    EventType::Add => {
      if let Some(device) = record_from_udev(probe, &udev_device) {
        shared.apply_add(device, listener);
      }
    }

    EventType::Remove => {
      // The node may already be gone; the record is looked up by identity,
      // never re-probed.
      if let Some(syspath) = udev_device.syspath().to_str() {
        shared.apply_remove(syspath, listener);
      }
    }

    other => {
      event!(
        target: "v4l2-device-monitor",
        Level::DEBUG,
        event.action = %other,
        event.syspath = %udev_device.syspath().display(),
        "unhandled udev action"
      );
    }
  }
}

fn is_v4l2(udev_device: &Device) -> bool {
  udev_device
    .property_value(V4L_VERSION_PROPERTY)
    .and_then(OsStr::to_str)
    == Some("2")
}

fn record_from_udev(probe: &dyn DeviceProbe, udev_device: &Device) -> Option<V4l2Device> {
  let devnode = udev_device.devnode()?.to_str()?;
  let syspath = udev_device.syspath().to_str()?;
  let name_hint = name_hint(udev_device);

  device::probe_device(probe, devnode, name_hint.as_deref(), Some(syspath))
}

/// Display name preference order matches what udev publishes for v4l
/// devices.
fn name_hint(udev_device: &Device) -> Option<String> {
  udev_device
    .property_value("ID_V4L_PRODUCT")
    .or_else(|| udev_device.property_value("ID_MODEL_ENC"))
    .or_else(|| udev_device.property_value("ID_MODEL"))
    .and_then(OsStr::to_str)
    .map(str::to_owned)
}
