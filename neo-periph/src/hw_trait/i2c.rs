//! I2C hardware abstraction traits.
//!
//! [`I2c`] is a whole bus: every transfer names its target address.
//! [`Connection`] is what drivers hold: a bus handle already bound to one
//! device address. A [`Connector`] (usually a board adaptor) hands out
//! connections for a bus index and address.

use std::sync::{Arc, Mutex, PoisonError};

use super::Result;

/// I2C bus abstraction
pub trait I2c: Send {
    /// Write data to an I2C device.
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Read data from an I2C device.
    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()>;

    /// Write data then read from an I2C device.
    fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()> {
        self.write(addr, write)?;
        self.read(addr, read)
    }

    /// Release the underlying device. Further transfers fail.
    fn close(&mut self) -> Result<()>;
}

/// A bus handle shared by every connection opened on it.
pub type SharedBus = Arc<Mutex<Box<dyn I2c>>>;

/// A byte-oriented link to one device on a bus.
pub trait Connection: Send {
    /// 7-bit address of the device this connection talks to.
    fn address(&self) -> u8;

    /// Fill `buffer` from the device.
    fn read(&mut self, buffer: &mut [u8]) -> Result<()>;

    /// Send `data` to the device.
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

impl<T: Connection + ?Sized> Connection for Box<T> {
    fn address(&self) -> u8 {
        (**self).address()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        (**self).read(buffer)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }
}

/// Something that can hand out device connections, typically a board.
pub trait Connector {
    /// Connection to the device at `address` on bus number `bus`.
    fn get_connection(&self, address: u8, bus: usize) -> Result<Box<dyn Connection>>;

    /// Bus used when a driver does not ask for a specific one.
    fn default_bus(&self) -> usize;
}

/// [`Connection`] backed by a shared [`I2c`] bus.
///
/// Holds nothing but the bus handle and its address. The bus lock is taken
/// per transfer so that two connections on one bus cannot interleave their
/// address selection and data.
#[derive(Clone)]
pub struct BusConnection {
    bus: SharedBus,
    address: u8,
}

impl BusConnection {
    pub fn new(bus: SharedBus, address: u8) -> Self {
        Self { bus, address }
    }
}

impl Connection for BusConnection {
    fn address(&self) -> u8 {
        self.address
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let mut bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        bus.read(self.address, buffer)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        bus.write(self.address, data)
    }
}
