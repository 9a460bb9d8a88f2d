use crate::{
  probe::{DeviceProbe, V4l2Probe},
  scan,
  watch::{self, WatchHandle},
  V4l2Device,
};
use parking_lot::{Condvar, Mutex};
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{event, Level};

/// Lifecycle of one monitor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
  Idle,
  Starting,
  Running,
  Stopping,
}

#[derive(Debug, Error)]
pub enum MonitorError {
  #[error("monitor already started (state {0:?})")]
  AlreadyStarted(MonitorState),

  #[error("failed to spawn monitor thread")]
  Spawn(#[source] io::Error),
}

/// Receives live inventory changes.
///
/// Callbacks run on the watch thread, after the monitor's lock has been
/// released, so they may query the monitor freely.
pub trait DeviceListener: Send + Sync {
  fn device_added(&self, device: &V4l2Device);
  fn device_removed(&self, device: &V4l2Device);
}

struct Inner {
  state: MonitorState,
  devices: Vec<V4l2Device>,
  watch_active: bool,
}

/// State shared between the owning thread and the watch thread. All access
/// is serialized through one mutex/condvar pair.
pub(crate) struct Shared {
  inner: Mutex<Inner>,
  ready: Condvar,
}

impl Shared {
  fn new() -> Shared {
    Shared {
      inner: Mutex::new(Inner {
        state: MonitorState::Idle,
        devices: Vec::new(),
        watch_active: false,
      }),
      ready: Condvar::new(),
    }
  }

  /// Transitions Starting -> Running and wakes the thread blocked in
  /// `start()`. The watch task calls this exactly once, whether or not its
  /// setup succeeded.
  pub(crate) fn mark_ready(&self, watch_active: bool) {
    let mut inner = self.inner.lock();
    inner.state = MonitorState::Running;
    inner.watch_active = watch_active;
    self.ready.notify_all();
  }

  /// Inserts a record into the live set and notifies the listener. A record
  /// whose key is already present is a duplicate add and is ignored.
  pub(crate) fn apply_add(&self, device: V4l2Device, listener: &dyn DeviceListener) {
    {
      let mut inner = self.inner.lock();
      if inner.devices.iter().any(|existing| existing.key() == device.key()) {
        event!(target: "v4l2-device-monitor", Level::DEBUG, device.key = %device.key(), "duplicate add ignored");
        return;
      }
      inner.devices.push(device.clone());
    }

    listener.device_added(&device);
  }

  /// Removes the record with the given key from the live set and notifies
  /// the listener. A key that was never added is a stale remove and is
  /// ignored.
  pub(crate) fn apply_remove(&self, key: &str, listener: &dyn DeviceListener) {
    let removed = {
      let mut inner = self.inner.lock();
      inner
        .devices
        .iter()
        .position(|device| device.key() == key)
        .map(|index| inner.devices.remove(index))
    };

    match removed {
      Some(device) => listener.device_removed(&device),
      None => {
        event!(target: "v4l2-device-monitor", Level::DEBUG, device.key = %key, "remove for unknown device ignored")
      }
    }
  }
}

/// Discovers video4linux2 devices and tracks their arrival and removal.
///
/// One-shot discovery (`probe_once`) walks the static `/dev` namespace;
/// continuous monitoring (`start`/`stop`) watches udev hotplug events on a
/// dedicated thread and keeps the live set current.
pub struct Monitor {
  shared: Arc<Shared>,
  probe: Arc<dyn DeviceProbe>,
  listener: Arc<dyn DeviceListener>,
  watch: Mutex<Option<WatchHandle>>,
}

impl Monitor {
  pub fn new(listener: Arc<dyn DeviceListener>) -> Monitor {
    Monitor::with_probe(Arc::new(V4l2Probe), listener)
  }

  pub fn with_probe(probe: Arc<dyn DeviceProbe>, listener: Arc<dyn DeviceListener>) -> Monitor {
    Monitor {
      shared: Arc::new(Shared::new()),
      probe,
      listener,
      watch: Mutex::new(None),
    }
  }

  /// One-shot enumeration of the static `/dev` namespace. Usable in any
  /// state; does not touch the live set.
  pub fn probe_once(&self) -> Vec<V4l2Device> {
    scan::scan(&*self.probe)
  }

  /// Starts continuous monitoring. Blocks until the watch thread has
  /// enumerated the devices already present, so the live set is complete
  /// when this returns.
  ///
  /// Must be called from Idle; anything else is a lifecycle violation.
  pub fn start(&self) -> Result<(), MonitorError> {
    {
      let mut inner = self.shared.inner.lock();
      if inner.state != MonitorState::Idle {
        return Err(MonitorError::AlreadyStarted(inner.state));
      }
      inner.state = MonitorState::Starting;
    }

    let handle = match watch::spawn(
      self.shared.clone(),
      self.probe.clone(),
      self.listener.clone(),
    ) {
      Ok(handle) => handle,
      Err(error) => {
        self.shared.inner.lock().state = MonitorState::Idle;
        return Err(MonitorError::Spawn(error));
      }
    };

    *self.watch.lock() = Some(handle);

    let mut inner = self.shared.inner.lock();
    while inner.state == MonitorState::Starting {
      self.shared.ready.wait(&mut inner);
    }

    event!(
      target: "v4l2-device-monitor",
      Level::DEBUG,
      devices.len = inner.devices.len(),
      watch.active = inner.watch_active,
      "monitor started"
    );
    Ok(())
  }

  /// Stops continuous monitoring. No-op when idle; otherwise posts the
  /// terminate instruction into the watch loop, waits for the thread to
  /// exit, and releases it. No event is delivered after this returns.
  pub fn stop(&self) {
    {
      let mut inner = self.shared.inner.lock();
      if inner.state != MonitorState::Running {
        return;
      }
      inner.state = MonitorState::Stopping;
    }

    if let Some(handle) = self.watch.lock().take() {
      handle.shutdown();
    }

    let mut inner = self.shared.inner.lock();
    inner.state = MonitorState::Idle;
    inner.watch_active = false;
    event!(target: "v4l2-device-monitor", Level::DEBUG, "monitor stopped");
  }

  /// Snapshot of the live set. After `stop()` this retains the last known
  /// inventory; it is no longer mutated.
  pub fn devices(&self) -> Vec<V4l2Device> {
    self.shared.inner.lock().devices.clone()
  }

  pub fn state(&self) -> MonitorState {
    self.shared.inner.lock().state
  }

  /// False while running means hotplug watch setup failed and the monitor
  /// sees no arrival/removal events.
  pub fn watch_active(&self) -> bool {
    self.shared.inner.lock().watch_active
  }
}

impl Drop for Monitor {
  fn drop(&mut self) {
    self.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::device::DeviceType;
  use std::{iter::FromIterator, thread};
  use v4l2_probe::{DeviceCaps, FormatDesc};

  fn record(path: &str, syspath: Option<&str>) -> V4l2Device {
    V4l2Device::new(
      path.to_owned(),
      format!("{} card", path),
      DeviceType::Source,
      DeviceCaps::from_iter(vec![FormatDesc::new("YUYV", "YUYV 4:2:2")]),
      syspath.map(str::to_owned),
    )
  }

  #[derive(Default)]
  struct RecordingListener {
    events: Mutex<Vec<String>>,
  }

  impl RecordingListener {
    fn events(&self) -> Vec<String> {
      self.events.lock().clone()
    }
  }

  impl DeviceListener for RecordingListener {
    fn device_added(&self, device: &V4l2Device) {
      self.events.lock().push(format!("added {}", device.key()));
    }

    fn device_removed(&self, device: &V4l2Device) {
      self.events.lock().push(format!("removed {}", device.key()));
    }
  }

  #[test]
  fn events_apply_and_forward_in_order() {
    let shared = Shared::new();
    let listener = RecordingListener::default();

    shared.apply_add(record("/dev/video0", Some("/sys/a")), &listener);
    shared.apply_add(record("/dev/video1", Some("/sys/b")), &listener);
    shared.apply_remove("/sys/a", &listener);

    let devices = shared.inner.lock().devices.clone();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].key(), "/sys/b");
    assert_eq!(
      listener.events(),
      vec!["added /sys/a", "added /sys/b", "removed /sys/a"]
    );
  }

  #[test]
  fn duplicate_add_is_suppressed() {
    let shared = Shared::new();
    let listener = RecordingListener::default();

    shared.apply_add(record("/dev/video0", Some("/sys/a")), &listener);
    shared.apply_add(record("/dev/video0", Some("/sys/a")), &listener);

    assert_eq!(shared.inner.lock().devices.len(), 1);
    assert_eq!(listener.events(), vec!["added /sys/a"]);
  }

  #[test]
  fn stale_remove_is_ignored() {
    let shared = Shared::new();
    let listener = RecordingListener::default();

    shared.apply_add(record("/dev/video0", Some("/sys/a")), &listener);
    shared.apply_remove("/sys/never-added", &listener);

    assert_eq!(shared.inner.lock().devices.len(), 1);
    assert_eq!(listener.events(), vec!["added /sys/a"]);
  }

  #[test]
  fn readiness_unblocks_start_wait_after_initial_enumeration() {
    let shared = Arc::new(Shared::new());
    shared.inner.lock().state = MonitorState::Starting;

    let watcher_shared = shared.clone();
    let watcher = thread::spawn(move || {
      let listener = RecordingListener::default();
      watcher_shared.apply_add(record("/dev/video0", Some("/sys/a")), &listener);
      watcher_shared.mark_ready(true);
    });

    let mut inner = shared.inner.lock();
    while inner.state == MonitorState::Starting {
      shared.ready.wait(&mut inner);
    }

    assert_eq!(inner.state, MonitorState::Running);
    assert!(inner.watch_active);
    assert_eq!(inner.devices.len(), 1);
    drop(inner);

    watcher.join().unwrap();
  }

  #[test]
  fn listener_callbacks_run_without_the_lock_held() {
    struct ProbingListener {
      shared: Arc<Shared>,
    }

    impl DeviceListener for ProbingListener {
      fn device_added(&self, _: &V4l2Device) {
        assert!(self.shared.inner.try_lock().is_some());
      }

      fn device_removed(&self, _: &V4l2Device) {
        assert!(self.shared.inner.try_lock().is_some());
      }
    }

    let shared = Arc::new(Shared::new());
    let listener = ProbingListener {
      shared: shared.clone(),
    };

    shared.apply_add(record("/dev/video0", Some("/sys/a")), &listener);
    shared.apply_remove("/sys/a", &listener);
  }
}
