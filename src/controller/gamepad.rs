//! # Evdev Gamepad Module
//!
//! Finds a gamepad through the Linux evdev interface and reads its state once
//! per tick.
//!
//! ## Controller Detection
//!
//! With an explicit `device_path` that node is opened. Otherwise all
//! `/dev/input/event*` nodes are scanned in sorted order and the first one
//! exposing `BTN_SOUTH` and `ABS_X` is taken. The layout (Xbox or DualSense)
//! comes from the configuration or, on `auto`, from the vendor ID.
//!
//! ## Reading
//!
//! [`EvdevGamepad::read`] queries the kernel's current key and absolute-axis
//! state instead of draining the event queue, so it never blocks and always
//! sees the latest values. When a query fails the device is dropped and
//! reopening is tried at most once per `reconnect_interval_ms`.

use evdev::{AbsoluteAxisType, Device, Key};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::layout::{LayoutChoice, PadLayout};
use super::mapper::{map_reading, AxisRange, PadReading};
use super::sampler::InputSource;
use crate::config::ControllerConfig;
use crate::error::{Result, TeleopError};

const INPUT_DIR: &str = "/dev/input";

struct OpenDevice {
    device: Device,
    path: PathBuf,
    layout: PadLayout,
}

/// Gamepad handle with automatic reconnect
pub struct EvdevGamepad {
    device_path: Option<PathBuf>,
    layout: LayoutChoice,
    reconnect_interval: Duration,
    open: Option<OpenDevice>,
    last_attempt: Option<Instant>,
}

impl EvdevGamepad {
    /// Creates the handle and tries to open the device once.
    ///
    /// A missing device is not an error here: [`read`](InputSource::read)
    /// keeps retrying and reports `DeviceUnavailable` until it shows up.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arm_teleop::config::ControllerConfig;
    /// use arm_teleop::controller::gamepad::EvdevGamepad;
    ///
    /// let pad = EvdevGamepad::new(&ControllerConfig::default());
    /// println!("connected: {}", pad.is_connected());
    /// ```
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        let device_path = if config.device_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.device_path))
        };

        let mut pad = Self {
            device_path,
            layout: config.layout,
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            open: None,
            last_attempt: None,
        };

        if let Err(e) = pad.connect() {
            warn!("No gamepad yet: {}", e);
        }
        pad
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.open.is_some()
    }

    /// Path of the open device node
    #[must_use]
    pub fn device_path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    /// Layout in use, once connected
    #[must_use]
    pub fn layout(&self) -> Option<PadLayout> {
        self.open.as_ref().map(|o| o.layout)
    }

    fn connect(&mut self) -> Result<()> {
        self.last_attempt = Some(Instant::now());

        let (device, path) = match &self.device_path {
            Some(path) => {
                let device = Device::open(path).map_err(|e| {
                    TeleopError::DeviceUnavailable(format!("{}: {}", path.display(), e))
                })?;
                (device, path.clone())
            }
            None => scan_for_gamepad()?,
        };

        let layout = PadLayout::resolve(self.layout, device.input_id().vendor());
        info!(
            "Gamepad connected: {} ({}), layout {:?}",
            path.display(),
            device.name().unwrap_or("unnamed"),
            layout
        );

        self.open = Some(OpenDevice { device, path, layout });
        Ok(())
    }

    fn reconnect_due(&self) -> bool {
        self.last_attempt
            .map_or(true, |at| at.elapsed() >= self.reconnect_interval)
    }
}

impl InputSource for EvdevGamepad {
    fn read(&mut self) -> Result<PadReading> {
        if self.open.is_none() {
            if !self.reconnect_due() {
                return Err(TeleopError::DeviceUnavailable("gamepad not connected".into()));
            }
            self.connect()?;
        }

        let Some(open) = self.open.as_ref() else {
            return Err(TeleopError::DeviceUnavailable("gamepad not connected".into()));
        };

        match read_state(open) {
            Ok(reading) => Ok(reading),
            Err(e) => {
                warn!("Gamepad {} lost: {}", open.path.display(), e);
                self.open = None;
                self.last_attempt = Some(Instant::now());
                Err(TeleopError::DeviceUnavailable(e.to_string()))
            }
        }
    }
}

fn read_state(open: &OpenDevice) -> std::io::Result<PadReading> {
    let keys = open.device.get_key_state()?;
    let abs = open.device.get_abs_state()?;
    let supported = open.device.supported_absolute_axes();

    Ok(map_reading(
        open.layout,
        |key| keys.contains(key),
        |axis: AbsoluteAxisType| {
            let present = supported.map_or(false, |set| set.contains(axis));
            let info = abs.get(axis.0 as usize)?;
            present.then(|| AxisRange::new(info.value, info.minimum, info.maximum))
        },
    ))
}

fn scan_for_gamepad() -> Result<(Device, PathBuf)> {
    let input_dir = Path::new(INPUT_DIR);

    if !input_dir.exists() {
        return Err(TeleopError::DeviceUnavailable(format!(
            "{} directory not found",
            INPUT_DIR
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(input_dir)
        .map_err(|e| TeleopError::Controller(format!("Failed to read {}: {}", INPUT_DIR, e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("event"))
        })
        .collect();

    // Deterministic pick when several pads are connected
    entries.sort();

    for path in entries {
        match Device::open(&path) {
            Ok(device) => {
                let id = device.input_id();
                debug!(
                    "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                    path.display(),
                    id.vendor(),
                    id.product()
                );

                if is_gamepad(&device) {
                    return Ok((device, path));
                }
            }
            Err(e) => debug!("Could not open {}: {}", path.display(), e),
        }
    }

    Err(TeleopError::DeviceUnavailable("no gamepad found".into()))
}

fn is_gamepad(device: &Device) -> bool {
    let has_button = device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_SOUTH));
    let has_stick = device
        .supported_absolute_axes()
        .map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_X));
    has_button && has_stick
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_path(path: &str) -> ControllerConfig {
        ControllerConfig {
            device_path: path.to_string(),
            reconnect_interval_ms: 60_000,
            ..ControllerConfig::default()
        }
    }

    #[test]
    fn test_missing_device_path_is_unavailable() {
        let mut pad = EvdevGamepad::new(&config_with_path("/nonexistent/event99"));
        assert!(!pad.is_connected());
        assert!(pad.device_path().is_none());

        let err = pad.read().unwrap_err();
        assert!(matches!(err, TeleopError::DeviceUnavailable(_)));
    }

    #[test]
    fn test_reconnect_is_throttled() {
        let mut pad = EvdevGamepad::new(&config_with_path("/nonexistent/event99"));
        let first = pad.last_attempt;
        assert!(first.is_some());

        // Interval not elapsed: no new open attempt
        let _ = pad.read();
        assert_eq!(pad.last_attempt, first);
    }

    #[test]
    fn test_reconnect_due_after_interval() {
        let mut pad = EvdevGamepad::new(&ControllerConfig {
            device_path: "/nonexistent/event99".into(),
            reconnect_interval_ms: 0,
            ..ControllerConfig::default()
        });
        assert!(pad.reconnect_due());
        let before = pad.last_attempt;
        let _ = pad.read();
        assert!(pad.last_attempt >= before);
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        let pad = EvdevGamepad::new(&ControllerConfig::default());
        assert!(pad.is_connected(), "Should detect a connected gamepad");
        assert!(pad.device_path().unwrap().starts_with("/dev/input"));
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_read_with_real_hardware() {
        let mut pad = EvdevGamepad::new(&ControllerConfig::default());

        println!("Press any button within 5 seconds...");
        for _ in 0..100 {
            if let Ok(reading) = pad.read() {
                if reading.first_pressed().is_some() {
                    return;
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        panic!("No button press seen");
    }
}
