//! Test doubles for the connection traits.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use super::{Connection, Connector, HwError, Result};

#[derive(Default)]
struct RegisterFile {
    registers: HashMap<u8, u16>,
    pointer: u8,
    writes: Vec<Vec<u8>>,
    reads: usize,
    fail: Option<io::ErrorKind>,
}

/// A simulated 16-bit register device.
///
/// Follows the INA226 pointer protocol: a one-byte write selects a register,
/// a three-byte write selects and stores, a two-byte read returns the
/// selected register big-endian. Clones share state so a test can keep a
/// handle after giving one to a driver.
#[derive(Clone, Default)]
pub(crate) struct MockRegisters {
    inner: Arc<Mutex<RegisterFile>>,
    address: u8,
}

impl MockRegisters {
    pub fn new(address: u8) -> Self {
        Self {
            inner: Arc::default(),
            address,
        }
    }

    pub fn set(&self, register: u8, value: u16) {
        self.inner.lock().unwrap().registers.insert(register, value);
    }

    pub fn get(&self, register: u8) -> Option<u16> {
        self.inner.lock().unwrap().registers.get(&register).copied()
    }

    /// Every write, in order, as raw bytes.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    /// Make every following transfer fail with `kind`.
    pub fn fail_with(&self, kind: io::ErrorKind) {
        self.inner.lock().unwrap().fail = Some(kind);
    }
}

impl Connection for MockRegisters {
    fn address(&self) -> u8 {
        self.address
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(kind) = inner.fail {
            return Err(io::Error::from(kind).into());
        }
        if buffer.len() != 2 {
            return Err(HwError::InvalidParameter(format!(
                "register reads are 2 bytes, got {}",
                buffer.len()
            )));
        }
        inner.reads += 1;
        let value = inner
            .registers
            .get(&inner.pointer)
            .copied()
            .unwrap_or_default();
        buffer.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(kind) = inner.fail {
            return Err(io::Error::from(kind).into());
        }
        inner.writes.push(data.to_vec());
        match *data {
            [register] => inner.pointer = register,
            [register, hi, lo] => {
                inner.pointer = register;
                inner.registers.insert(register, u16::from_be_bytes([hi, lo]));
            }
            _ => {
                return Err(HwError::InvalidParameter(format!(
                    "unexpected write length {}",
                    data.len()
                )))
            }
        }
        Ok(())
    }
}

/// Connector that always hands out clones of one [`MockRegisters`] and
/// remembers what was asked for.
#[derive(Default)]
pub(crate) struct MockConnector {
    pub device: MockRegisters,
    pub default_bus: usize,
    pub requests: Mutex<Vec<(u8, usize)>>,
}

impl Connector for MockConnector {
    fn get_connection(&self, address: u8, bus: usize) -> Result<Box<dyn Connection>> {
        self.requests.lock().unwrap().push((address, bus));
        let mut device = self.device.clone();
        device.address = address;
        Ok(Box::new(device))
    }

    fn default_bus(&self) -> usize {
        self.default_bus
    }
}
