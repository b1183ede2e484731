//! FriendlyARM NanoPi NEO adaptor.
//!
//! Maps header pin names to sysfs GPIO and PWM handles and hands out I2C
//! connections on `/dev/i2c-0` and `/dev/i2c-1`. Handles are created on first
//! use and kept until [`NanoPiNeo::finalize`].
//!
//! Lookup-or-create runs under one lock. Reads and writes on a resolved
//! handle happen after the lock is released; two connections on the same bus
//! are serialized by that bus's own lock instead.

pub mod pinmap;

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

pub use pinmap::{PinEntry, PinTable};

use crate::hw_trait::{
    BusConnection, Connection, Connector, HwError, PinDirection, PinValue, Polarity,
    ReleaseErrors, Result, SharedBus,
};
use crate::sysfs::{DigitalPin, Filesystem, LinuxFilesystem, PwmPin};

/// Number of I2C adapters on the board.
pub const BUS_COUNT: usize = 2;

/// Period every PWM channel is initialized with, in nanoseconds (100 Hz).
pub const PWM_PERIOD_NS: u32 = 10_000_000;

/// Servo pulse width at 0 degrees, in nanoseconds.
pub const SERVO_MIN_PULSE_NS: f64 = 500_000.0;

/// Servo pulse width at 180 degrees, in nanoseconds.
pub const SERVO_MAX_PULSE_NS: f64 = 2_000_000.0;

const DEFAULT_NAME: &str = "NanoPi NEO";

/// Where the adaptor finds its kernel interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptorConfig {
    pub gpio_path: PathBuf,
    pub pwm_chip_path: PathBuf,
    /// Bus `N` lives at `<prefix>N`.
    pub i2c_dev_prefix: String,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            gpio_path: PathBuf::from("/sys/class/gpio"),
            pwm_chip_path: PathBuf::from("/sys/class/pwm/pwmchip0"),
            i2c_dev_prefix: "/dev/i2c-".to_string(),
        }
    }
}

impl AdaptorConfig {
    /// Defaults, overridden by `NEO_GPIO_PATH`, `NEO_PWM_CHIP_PATH` and
    /// `NEO_I2C_DEV_PREFIX` when set and non-empty.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str| env::var(key).ok().filter(|v| !v.is_empty());

        Self {
            gpio_path: var("NEO_GPIO_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.gpio_path),
            pwm_chip_path: var("NEO_PWM_CHIP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.pwm_chip_path),
            i2c_dev_prefix: var("NEO_I2C_DEV_PREFIX").unwrap_or(defaults.i2c_dev_prefix),
        }
    }

    pub fn i2c_device_path(&self, bus: usize) -> PathBuf {
        PathBuf::from(format!("{}{}", self.i2c_dev_prefix, bus))
    }
}

#[derive(Default)]
struct State {
    digital: BTreeMap<u32, Arc<DigitalPin>>,
    pwm: BTreeMap<u32, Arc<PwmPin>>,
    buses: [Option<SharedBus>; BUS_COUNT],
}

/// NanoPi NEO board adaptor.
pub struct NanoPiNeo<'a> {
    name: String,
    pins: &'a PinTable,
    config: AdaptorConfig,
    fs: Arc<dyn Filesystem>,
    state: Mutex<State>,
}

impl<'a> NanoPiNeo<'a> {
    /// Adaptor on the real filesystem, configured from the environment.
    pub fn new(pins: &'a PinTable) -> Self {
        Self::with_filesystem(pins, AdaptorConfig::from_env(), Arc::new(LinuxFilesystem))
    }

    pub fn with_filesystem(
        pins: &'a PinTable,
        config: AdaptorConfig,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            pins,
            config,
            fs,
            state: Mutex::new(State::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn config(&self) -> &AdaptorConfig {
        &self.config
    }

    pub fn pins(&self) -> &PinTable {
        self.pins
    }

    /// Nothing to open up front; every handle is created on first use.
    pub fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, name: &str) -> Result<PinEntry> {
        self.pins
            .get(name)
            .ok_or_else(|| HwError::UnknownPin(name.to_string()))
    }

    /// Exported GPIO handle for `name`, with its direction set.
    pub fn digital_pin(&self, name: &str, direction: PinDirection) -> Result<Arc<DigitalPin>> {
        let entry = self.entry(name)?;

        let pin = {
            let mut state = self.state();
            match state.digital.get(&entry.gpio).cloned() {
                Some(pin) => pin,
                None => {
                    let pin = Arc::new(DigitalPin::new(
                        entry.gpio,
                        &self.config.gpio_path,
                        Arc::clone(&self.fs),
                    ));
                    pin.export()?;
                    debug!(pin = name, gpio = entry.gpio, "Exported GPIO");
                    state.digital.insert(entry.gpio, Arc::clone(&pin));
                    pin
                }
            }
        };

        pin.set_direction(direction)?;
        Ok(pin)
    }

    /// Initialized PWM handle for `name`.
    ///
    /// A new channel is exported, disabled, set to normal polarity, enabled
    /// and given a [`PWM_PERIOD_NS`] period. It is cached only when every
    /// step succeeds.
    pub fn pwm_pin(&self, name: &str) -> Result<Arc<PwmPin>> {
        let entry = self.entry(name)?;
        let channel = entry
            .pwm
            .ok_or_else(|| HwError::NotPwmPin(name.to_string()))?;

        let mut state = self.state();
        if let Some(pin) = state.pwm.get(&channel) {
            return Ok(Arc::clone(pin));
        }

        let pin = Arc::new(PwmPin::new(
            channel,
            &self.config.pwm_chip_path,
            Arc::clone(&self.fs),
        ));
        pin.export()?;
        pin.enable(false)?;
        pin.set_polarity(Polarity::Normal)?;
        pin.enable(true)?;
        pin.set_period(PWM_PERIOD_NS)?;
        debug!(pin = name, channel, "Initialized PWM");

        state.pwm.insert(channel, Arc::clone(&pin));
        Ok(pin)
    }

    pub fn digital_read(&self, name: &str) -> Result<PinValue> {
        self.digital_pin(name, PinDirection::In)?.read()
    }

    pub fn digital_write(&self, name: &str, value: PinValue) -> Result<()> {
        self.digital_pin(name, PinDirection::Out)?.write(value)
    }

    /// Duty cycle `value / 255` of the channel's current period.
    pub fn pwm_write(&self, name: &str, value: u8) -> Result<()> {
        let pin = self.pwm_pin(name)?;
        let period = pin.period()?;
        let duty = f64::from(period) * from_scale(f64::from(value), 0.0, 255.0);
        pin.set_duty_cycle(duty as u32)
    }

    /// Pulse width for `angle` degrees, independent of the period. Angles
    /// past 180 saturate at the maximum pulse.
    pub fn servo_write(&self, name: &str, angle: u8) -> Result<()> {
        let pin = self.pwm_pin(name)?;
        let duty = servo_pulse_ns(angle);
        pin.set_duty_cycle(duty)
    }

    /// Release every handle this adaptor created.
    ///
    /// GPIOs are unexported, PWM channels disabled and unexported, buses
    /// closed. A failure does not stop the remaining releases; all of them
    /// are returned together. The caches are empty afterwards either way.
    pub fn finalize(&self) -> Result<()> {
        let (digital, pwm, buses) = {
            let mut state = self.state();
            (
                std::mem::take(&mut state.digital),
                std::mem::take(&mut state.pwm),
                std::mem::take(&mut state.buses),
            )
        };

        let mut errors = ReleaseErrors::new();
        let mut record = |what: String, result: Result<()>| {
            if let Err(e) = result {
                warn!(handle = %what, error = %e, "Release failed");
                errors.push(what, e);
            }
        };

        for pin in digital.into_values() {
            record(format!("gpio{}", pin.pin()), pin.unexport());
        }

        for pin in pwm.into_values() {
            record(format!("pwm{}", pin.channel()), pin.enable(false));
            record(format!("pwm{}", pin.channel()), pin.unexport());
        }

        for (index, bus) in buses.into_iter().enumerate() {
            if let Some(bus) = bus {
                let mut bus = bus.lock().unwrap_or_else(PoisonError::into_inner);
                record(format!("i2c-{}", index), bus.close());
            }
        }

        errors.into_result()
    }
}

impl Connector for NanoPiNeo<'_> {
    fn get_connection(&self, address: u8, bus: usize) -> Result<Box<dyn Connection>> {
        if bus >= BUS_COUNT {
            return Err(HwError::BusOutOfRange {
                bus,
                count: BUS_COUNT,
            });
        }

        let mut state = self.state();
        let shared = match state.buses[bus].clone() {
            Some(shared) => shared,
            None => {
                let path = self.config.i2c_device_path(bus);
                let device = self.fs.open_i2c(&path)?;
                debug!(path = %path.display(), "Opened I2C bus");
                let shared: SharedBus = Arc::new(Mutex::new(device));
                state.buses[bus] = Some(Arc::clone(&shared));
                shared
            }
        };

        Ok(Box::new(BusConnection::new(shared, address)))
    }

    fn default_bus(&self) -> usize {
        0
    }
}

fn from_scale(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

fn to_scale(fraction: f64, min: f64, max: f64) -> f64 {
    (fraction * (max - min) + min).clamp(min, max)
}

fn servo_pulse_ns(angle: u8) -> u32 {
    let fraction = from_scale(f64::from(angle), 0.0, 180.0);
    to_scale(fraction, SERVO_MIN_PULSE_NS, SERVO_MAX_PULSE_NS) as u32
}
