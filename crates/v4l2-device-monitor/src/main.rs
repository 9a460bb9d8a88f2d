use anyhow::Result;
use clap::{Parser, ValueEnum};
use signal_hook::{
  consts::signal::{SIGINT, SIGTERM},
  iterator::Signals,
};
use std::sync::Arc;
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

use v4l2_device_monitor::{DeviceListener, Monitor, V4l2Device};

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
enum LogFormat {
  Pretty,
  Json,
}

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
enum OutputFormat {
  Text,
  Json,
}

/// List and monitor video4linux2 source and sink devices.
#[derive(Parser, Debug)]
#[command(version, about)]
struct App {
  /// Log output format
  #[arg(
    value_enum,
    long = "log-format",
    short = 'f',
    env = "LOG_FORMAT",
    default_value = "pretty"
  )]
  log_format: LogFormat,

  /// Device listing format
  #[arg(
    value_enum,
    long = "output",
    short = 'o',
    env = "OUTPUT_FORMAT",
    default_value = "text"
  )]
  output: OutputFormat,

  /// Keep running and report hotplug events until interrupted
  #[arg(long)]
  follow: bool,
}

struct PrintListener {
  output: OutputFormat,
}

impl PrintListener {
  fn print(&self, action: &str, device: &V4l2Device) {
    match self.output {
      OutputFormat::Text => println!(
        "{}: {} ({}, {:?})",
        action,
        device.device_path(),
        device.display_name(),
        device.device_type()
      ),
      OutputFormat::Json => {
        println!(
          "{}",
          serde_json::json!({ "event": action, "device": device })
        )
      }
    }
  }
}

impl DeviceListener for PrintListener {
  fn device_added(&self, device: &V4l2Device) {
    self.print("added", device);
  }

  fn device_removed(&self, device: &V4l2Device) {
    self.print("removed", device);
  }
}

fn print_devices(devices: &[V4l2Device], output: OutputFormat) -> Result<()> {
  match output {
    OutputFormat::Text => {
      for device in devices {
        println!(
          "{}\t{}\t{:?}\t{} formats",
          device.device_path(),
          device.display_name(),
          device.device_type(),
          device.caps().len()
        );
      }
    }
    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(devices)?),
  }

  Ok(())
}

fn main() -> Result<()> {
  let app = App::parse();
  let filter = EnvFilter::from_default_env()
    // Set the base level when not matched by other directives to INFO.
    .add_directive(Level::INFO.into());

  match app.log_format {
    LogFormat::Pretty => {
      tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    LogFormat::Json => {
      tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .with_span_list(false)
        .init();
    }
  }

  let monitor = Monitor::new(Arc::new(PrintListener { output: app.output }));

  if !app.follow {
    return print_devices(&monitor.probe_once(), app.output);
  }

  // Devices already present are reported through the listener while start()
  // blocks on the initial enumeration.
  monitor.start()?;
  if !monitor.watch_active() {
    event!(
      target: "v4l2-device-monitor",
      Level::WARN,
      "hotplug watch unavailable, no further device events will be reported"
    );
  }

  let mut signals = Signals::new(&[SIGINT, SIGTERM])?;
  if let Some(signal) = signals.forever().next() {
    let signal_name = match signal {
      SIGTERM => "SIGTERM",
      _ => "SIGINT",
    };
    event!(
      target: "v4l2-device-monitor",
      Level::INFO,
      "Received signal {}, shutting down.",
      signal_name
    );
  }

  monitor.stop();
  Ok(())
}
