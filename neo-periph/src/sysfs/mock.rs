//! In-memory stand-ins for sysfs and `/dev/i2c-N`.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nix::errno::Errno;

use super::Filesystem;
use crate::hw_trait::{HwError, I2c, Result};

/// Expected write log entries from string pairs.
pub(crate) fn pairs(items: &[(&str, &str)]) -> Vec<(PathBuf, String)> {
    items
        .iter()
        .map(|(path, value)| (PathBuf::from(path), value.to_string()))
        .collect()
}

#[derive(Default)]
struct FsState {
    files: HashMap<PathBuf, String>,
    writes: Vec<(PathBuf, String)>,
    write_failures: HashMap<PathBuf, Errno>,
    value_failures: Vec<(PathBuf, String, Errno)>,
    open_failures: HashMap<PathBuf, Errno>,
    buses: HashMap<PathBuf, MockI2cBus>,
    opens: Vec<PathBuf>,
}

/// A filesystem where every attribute exists and writes are logged.
///
/// Successful writes replace the file contents, so a later read sees the
/// last value written. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct MockFilesystem {
    state: Arc<Mutex<FsState>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.into(), contents.to_string());
    }

    /// Every write to `path` fails with `errno`.
    pub fn fail_write(&self, path: impl Into<PathBuf>, errno: Errno) {
        self.state
            .lock()
            .unwrap()
            .write_failures
            .insert(path.into(), errno);
    }

    /// Writes of exactly `value` to `path` fail with `errno`.
    pub fn fail_write_value(&self, path: impl Into<PathBuf>, value: &str, errno: Errno) {
        self.state
            .lock()
            .unwrap()
            .value_failures
            .push((path.into(), value.to_string(), errno));
    }

    pub fn fail_open(&self, path: impl Into<PathBuf>, errno: Errno) {
        self.state
            .lock()
            .unwrap()
            .open_failures
            .insert(path.into(), errno);
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Device paths passed to `open_i2c`, including failed attempts.
    pub fn opens(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().opens.clone()
    }

    /// The bus handed out for `path`, if it was opened.
    pub fn bus(&self, path: impl AsRef<Path>) -> Option<MockI2cBus> {
        self.state.lock().unwrap().buses.get(path.as_ref()).cloned()
    }
}

impl Filesystem for MockFilesystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(errno) = state.write_failures.get(path) {
            return Err(io::Error::from(*errno));
        }
        if let Some((_, _, errno)) = state
            .value_failures
            .iter()
            .find(|(p, v, _)| p == path && v == contents)
        {
            return Err(io::Error::from(*errno));
        }
        state.writes.push((path.to_path_buf(), contents.to_string()));
        state.files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn open_i2c(&self, path: &Path) -> io::Result<Box<dyn I2c>> {
        let mut state = self.state.lock().unwrap();
        state.opens.push(path.to_path_buf());
        if let Some(errno) = state.open_failures.get(path) {
            return Err(io::Error::from(*errno));
        }
        let bus = state.buses.entry(path.to_path_buf()).or_default().clone();
        Ok(Box::new(bus))
    }
}

#[derive(Default)]
struct BusState {
    transfers: Vec<(u8, Vec<u8>)>,
    pending_reads: VecDeque<Vec<u8>>,
    closed: usize,
    close_failure: Option<Errno>,
}

/// Logs writes and serves queued read data. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct MockI2cBus {
    state: Arc<Mutex<BusState>>,
}

impl MockI2cBus {
    /// Writes as `(address, bytes)`.
    pub fn transfers(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().unwrap().transfers.clone()
    }

    /// Bytes returned by the next read. Unqueued reads return zeros.
    pub fn queue_read(&self, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .pending_reads
            .push_back(data.to_vec());
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn fail_close(&self, errno: Errno) {
        self.state.lock().unwrap().close_failure = Some(errno);
    }
}

impl I2c for MockI2cBus {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .transfers
            .push((addr, data.to_vec()));
        Ok(())
    }

    fn read(&mut self, _addr: u8, buffer: &mut [u8]) -> Result<()> {
        let next = self.state.lock().unwrap().pending_reads.pop_front();
        buffer.fill(0);
        if let Some(data) = next {
            let n = data.len().min(buffer.len());
            buffer[..n].copy_from_slice(&data[..n]);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closed += 1;
        match state.close_failure {
            Some(errno) => Err(HwError::Io(io::Error::from(errno))),
            None => Ok(()),
        }
    }
}
