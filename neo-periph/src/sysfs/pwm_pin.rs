//! sysfs PWM channel handle.

use std::path::PathBuf;
use std::sync::Arc;

use nix::errno::Errno;
use tracing::{debug, trace};

use super::{is_errno, parse_u32, Filesystem};
use crate::hw_trait::{Polarity, Result};

/// One channel of a PWM chip such as `/sys/class/pwm/pwmchip0`.
pub struct PwmPin {
    channel: u32,
    chip_path: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl PwmPin {
    pub fn new(channel: u32, chip_path: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            channel,
            chip_path: chip_path.into(),
            fs,
        }
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    fn attr(&self, name: &str) -> PathBuf {
        self.chip_path
            .join(format!("pwm{}", self.channel))
            .join(name)
    }

    fn write_attr(&self, name: &str, value: &str) -> Result<()> {
        let path = self.attr(name);
        trace!(path = %path.display(), value, "PWM write");
        self.fs.write(&path, value)?;
        Ok(())
    }

    fn read_u32(&self, name: &str) -> Result<u32> {
        let path = self.attr(name);
        let text = self.fs.read_to_string(&path)?;
        Ok(parse_u32(&path, &text)?)
    }

    /// Export the channel. `EBUSY` means it already is.
    pub fn export(&self) -> Result<()> {
        let path = self.chip_path.join("export");
        match self.fs.write(&path, &self.channel.to_string()) {
            Err(e) if is_errno(&e, Errno::EBUSY) => {
                debug!(channel = self.channel, "PWM already exported");
                Ok(())
            }
            other => Ok(other?),
        }
    }

    pub fn unexport(&self) -> Result<()> {
        let path = self.chip_path.join("unexport");
        self.fs.write(&path, &self.channel.to_string())?;
        Ok(())
    }

    pub fn enable(&self, enabled: bool) -> Result<()> {
        self.write_attr("enable", if enabled { "1" } else { "0" })
    }

    pub fn set_polarity(&self, polarity: Polarity) -> Result<()> {
        self.write_attr("polarity", polarity.as_sysfs())
    }

    /// Period in nanoseconds.
    pub fn period(&self) -> Result<u32> {
        self.read_u32("period")
    }

    pub fn set_period(&self, period_ns: u32) -> Result<()> {
        self.write_attr("period", &period_ns.to_string())
    }

    /// Active time per period in nanoseconds.
    pub fn duty_cycle(&self) -> Result<u32> {
        self.read_u32("duty_cycle")
    }

    pub fn set_duty_cycle(&self, duty_ns: u32) -> Result<()> {
        self.write_attr("duty_cycle", &duty_ns.to_string())
    }
}
