use std::sync::{Arc, Mutex};
use v4l2_device_monitor::{DeviceListener, Monitor, MonitorError, MonitorState, V4l2Device};

#[derive(Default)]
struct CountingListener {
  events: Mutex<Vec<String>>,
}

impl DeviceListener for CountingListener {
  fn device_added(&self, device: &V4l2Device) {
    self
      .events
      .lock()
      .unwrap()
      .push(format!("added {}", device.key()));
  }

  fn device_removed(&self, device: &V4l2Device) {
    self
      .events
      .lock()
      .unwrap()
      .push(format!("removed {}", device.key()));
  }
}

// These tests run against the real udev watch. On hosts without hotplug
// support the monitor starts in its degraded mode, which keeps every
// lifecycle property below intact.

#[test]
fn start_stop_lifecycle() {
  let monitor = Monitor::new(Arc::new(CountingListener::default()));
  assert_eq!(monitor.state(), MonitorState::Idle);

  monitor.start().expect("start from idle");
  assert_eq!(monitor.state(), MonitorState::Running);

  match monitor.start() {
    Err(MonitorError::AlreadyStarted(state)) => assert_eq!(state, MonitorState::Running),
    other => panic!("expected lifecycle violation, got {:?}", other),
  }

  monitor.stop();
  assert_eq!(monitor.state(), MonitorState::Idle);

  // Second stop while idle is a no-op.
  monitor.stop();
  assert_eq!(monitor.state(), MonitorState::Idle);
}

#[test]
fn restart_after_stop() {
  let monitor = Monitor::new(Arc::new(CountingListener::default()));

  monitor.start().expect("first start");
  monitor.stop();

  monitor.start().expect("restart from idle");
  assert_eq!(monitor.state(), MonitorState::Running);
  monitor.stop();
}

#[test]
fn probe_once_works_in_every_state() {
  let monitor = Monitor::new(Arc::new(CountingListener::default()));

  let before = monitor.probe_once();
  monitor.start().expect("start");
  let during = monitor.probe_once();
  monitor.stop();
  let after = monitor.probe_once();

  // The scan is deterministic for a fixed filesystem state.
  assert_eq!(before.len(), during.len());
  assert_eq!(before.len(), after.len());
}

#[test]
fn live_set_is_retained_after_stop() {
  let monitor = Monitor::new(Arc::new(CountingListener::default()));

  monitor.start().expect("start");
  let running = monitor.devices();
  monitor.stop();

  assert_eq!(monitor.devices().len(), running.len());
}
