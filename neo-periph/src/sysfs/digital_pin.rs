//! sysfs GPIO pin handle.

use std::path::PathBuf;
use std::sync::Arc;

use nix::errno::Errno;
use tracing::{debug, trace};

use super::{is_errno, Filesystem};
use crate::hw_trait::{PinDirection, PinValue, Result};

/// One kernel GPIO line, addressed by its global number.
pub struct DigitalPin {
    pin: u32,
    gpio_path: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl DigitalPin {
    /// Handle for GPIO `pin` under `gpio_path` (normally `/sys/class/gpio`).
    /// Nothing is written until [`export`](Self::export).
    pub fn new(pin: u32, gpio_path: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            pin,
            gpio_path: gpio_path.into(),
            fs,
        }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn pin_dir(&self) -> PathBuf {
        self.gpio_path.join(format!("gpio{}", self.pin))
    }

    fn write_control(&self, file: &str) -> std::io::Result<()> {
        self.fs
            .write(&self.gpio_path.join(file), &self.pin.to_string())
    }

    fn write_attr(&self, attr: &str, value: &str) -> Result<()> {
        let path = self.pin_dir().join(attr);
        trace!(path = %path.display(), value, "GPIO write");
        self.fs.write(&path, value)?;
        Ok(())
    }

    /// Ask the kernel to expose the pin. A pin that is already exported
    /// answers `EBUSY`, which is not an error here.
    pub fn export(&self) -> Result<()> {
        match self.write_control("export") {
            Err(e) if is_errno(&e, Errno::EBUSY) => {
                debug!(pin = self.pin, "GPIO already exported");
                Ok(())
            }
            other => Ok(other?),
        }
    }

    /// Hand the pin back to the kernel. `EINVAL` means it was not exported.
    pub fn unexport(&self) -> Result<()> {
        match self.write_control("unexport") {
            Err(e) if is_errno(&e, Errno::EINVAL) => Ok(()),
            other => Ok(other?),
        }
    }

    pub fn set_direction(&self, direction: PinDirection) -> Result<()> {
        self.write_attr("direction", direction.as_sysfs())
    }

    pub fn read(&self) -> Result<PinValue> {
        let text = self.fs.read_to_string(&self.pin_dir().join("value"))?;
        PinValue::from_sysfs(&text)
    }

    pub fn write(&self, value: PinValue) -> Result<()> {
        self.write_attr("value", value.as_sysfs())
    }
}
