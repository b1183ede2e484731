//! Linux sysfs and character-device access.
//!
//! Pin handles and bus handles never touch `std::fs` directly; they go
//! through a [`Filesystem`] so that board code can be exercised against a
//! recorded fake instead of `/sys`.
//!
//! ## Kernel interfaces
//!
//! ```text
//! GPIO  <gpio>/export, <gpio>/unexport
//!       <gpio>/gpioN/direction   "in" | "out"
//!       <gpio>/gpioN/value       "0" | "1"
//! PWM   <chip>/export, <chip>/unexport
//!       <chip>/pwmN/enable       "0" | "1"
//!       <chip>/pwmN/period       nanoseconds
//!       <chip>/pwmN/duty_cycle   nanoseconds
//!       <chip>/pwmN/polarity     "normal" | "inversed"
//! I2C   /dev/i2c-N               read/write after I2C_SLAVE ioctl
//! ```

pub mod digital_pin;
pub mod i2c;
pub mod pwm_pin;

#[cfg(test)]
pub(crate) mod mock;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use nix::errno::Errno;

use crate::hw_trait::I2c;

pub use digital_pin::DigitalPin;
pub use i2c::LinuxI2cBus;
pub use pwm_pin::PwmPin;

/// File operations the pin and bus handles need.
pub trait Filesystem: Send + Sync {
    /// Read a whole attribute file.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the contents of an existing attribute file.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Open an I2C character device for read/write.
    fn open_i2c(&self, path: &Path) -> io::Result<Box<dyn I2c>>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxFilesystem;

impl Filesystem for LinuxFilesystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        // sysfs attributes always exist; never create files
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(contents.as_bytes())
    }

    fn open_i2c(&self, path: &Path) -> io::Result<Box<dyn I2c>> {
        Ok(Box::new(LinuxI2cBus::open(path)?))
    }
}

/// True when `err` carries the given errno.
pub(crate) fn is_errno(err: &io::Error, errno: Errno) -> bool {
    err.raw_os_error() == Some(errno as i32)
}

/// Parse a numeric attribute such as `period` or `duty_cycle`.
pub(crate) fn parse_u32(path: &Path, text: &str) -> io::Result<u32> {
    text.trim().parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: invalid number {:?}: {}", path.display(), text.trim(), e),
        )
    })
}
