//! Linux `/dev/i2c-N` bus.

use std::io;
use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use tracing::{debug, trace};

use crate::hw_trait::{I2c, Result};

/// Slave address selected when the adapter is opened. No device answers
/// to it; the first transfer selects its real target.
const GENERAL_CALL: u16 = 0x00;

/// An open I2C adapter character device.
///
/// The kernel binds plain `read`/`write` calls to whichever slave address
/// was last selected, so the address is reselected only when a transfer
/// targets a different device.
pub struct LinuxI2cBus {
    path: PathBuf,
    device: Option<LinuxI2CDevice>,
    selected: Option<u8>,
}

impl LinuxI2cBus {
    /// Open the adapter at `path`. Fails if the node is missing or is not
    /// an I2C adapter.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let device = LinuxI2CDevice::new(&path, GENERAL_CALL).map_err(io::Error::from)?;

        Ok(Self {
            path,
            device: Some(device),
            selected: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn device(&mut self, addr: u8) -> Result<&mut LinuxI2CDevice> {
        let device = self.device.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.path.display()),
            )
        })?;

        if self.selected != Some(addr) {
            device
                .set_slave_address(u16::from(addr))
                .map_err(io::Error::from)?;
            self.selected = Some(addr);
        }

        Ok(device)
    }
}

impl I2c for LinuxI2cBus {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        trace!(addr = format_args!("{:#04x}", addr), ?data, "I2C write");
        self.device(addr)?.write(data).map_err(io::Error::from)?;
        Ok(())
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        self.device(addr)?.read(buffer).map_err(io::Error::from)?;
        trace!(addr = format_args!("{:#04x}", addr), data = ?buffer, "I2C read");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.device.take().is_some() {
            debug!(path = %self.path.display(), "Closed I2C bus");
        }
        self.selected = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::HwError;
    use tempfile::{NamedTempFile, TempDir};

    fn closed_bus() -> LinuxI2cBus {
        LinuxI2cBus {
            path: PathBuf::from("/dev/i2c-0"),
            device: None,
            selected: None,
        }
    }

    #[test]
    fn missing_adapter_fails_to_open() {
        let dir = TempDir::new().unwrap();
        match LinuxI2cBus::open(dir.path().join("i2c-0")) {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            Ok(_) => panic!("opened a missing adapter"),
        }
    }

    #[test]
    fn regular_file_is_not_an_adapter() {
        let tmp = NamedTempFile::new().unwrap();
        assert!(LinuxI2cBus::open(tmp.path()).is_err());
    }

    #[test]
    fn transfers_after_close_are_not_connected() {
        let mut bus = closed_bus();

        match bus.read(0x40, &mut [0u8; 2]) {
            Err(HwError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotConnected),
            other => panic!("expected NotConnected, got {:?}", other),
        }
        assert!(matches!(bus.write(0x40, &[0x00]), Err(HwError::Io(_))));
        assert_eq!(bus.selected, None);
    }

    #[test]
    fn close_is_idempotent() {
        let mut bus = closed_bus();
        bus.close().unwrap();
        bus.close().unwrap();
        assert_eq!(bus.path(), Path::new("/dev/i2c-0"));
    }
}
