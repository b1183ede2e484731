//! INA226 bidirectional current and power monitor driver.
//!
//! The INA226 measures the voltage across a shunt resistor and the bus
//! voltage, and computes current and power from a calibration word written
//! by the host. Every register is 16 bits, big-endian, addressed through a
//! pointer byte:
//!
//! ```text
//! write:  [reg, hi, lo]
//! read:   [reg]  then read 2 bytes -> [hi, lo]
//! ```
//!
//! Datasheet: <https://www.ti.com/product/INA226>

use bitflags::bitflags;
use strum::FromRepr;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::hw_trait::{Connection, Connector, HwError};

/// Default I2C address (A0 and A1 tied to GND)
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Texas Instruments, "TI" in ASCII.
pub const MANUFACTURER_ID: u16 = 0x5449;

/// Fixed scale factor from the calibration equation.
const CAL_SCALE: f64 = 0.00512;

/// Bus voltage LSB in millivolts.
const BUS_VOLTAGE_LSB_MV: f64 = 1.25;

/// Shunt voltage LSB in millivolts.
const SHUNT_VOLTAGE_LSB_MV: f64 = 0.0025;

/// Power LSB as a multiple of the current LSB.
const POWER_LSB_RATIO: f64 = 25.0;

/// Register addresses
pub mod regs {
    pub const CONFIGURATION: u8 = 0x00;
    pub const SHUNT_VOLTAGE: u8 = 0x01;
    pub const BUS_VOLTAGE: u8 = 0x02;
    pub const POWER: u8 = 0x03;
    pub const CURRENT: u8 = 0x04;
    pub const CALIBRATION: u8 = 0x05;
    pub const MASK_ENABLE: u8 = 0x06;
    pub const ALERT_LIMIT: u8 = 0x07;
    pub const MANUFACTURER_ID: u8 = 0xFE;
    pub const DIE_ID: u8 = 0xFF;
}

// Configuration register layout:
//
//   15  14-12  11-9   8-6      5-3     2-0
//  RST    -    AVG  VBUSCT   VSHCT   MODE

/// Operating mode flags (bits 0-2)
pub mod mode {
    pub const POWER_DOWN: u16 = 0x00;
    pub const SHUNT_TRIGGERED: u16 = 0x01;
    pub const BUS_TRIGGERED: u16 = 0x02;
    pub const SHUNT_BUS_TRIGGERED: u16 = 0x03;
    pub const ADC_OFF: u16 = 0x04;
    pub const SHUNT_CONTINUOUS: u16 = 0x05;
    pub const BUS_CONTINUOUS: u16 = 0x06;
    pub const SHUNT_BUS_CONTINUOUS: u16 = 0x07;
}

/// Shunt voltage conversion time flags (bits 3-5)
pub mod shunt_conv_time {
    pub const US_140: u16 = 0x00 << 3;
    pub const US_204: u16 = 0x01 << 3;
    pub const US_332: u16 = 0x02 << 3;
    pub const US_588: u16 = 0x03 << 3;
    pub const US_1100: u16 = 0x04 << 3;
    pub const US_2116: u16 = 0x05 << 3;
    pub const US_4156: u16 = 0x06 << 3;
    pub const US_8244: u16 = 0x07 << 3;
}

/// Bus voltage conversion time flags (bits 6-8)
pub mod bus_conv_time {
    pub const US_140: u16 = 0x00 << 6;
    pub const US_204: u16 = 0x01 << 6;
    pub const US_332: u16 = 0x02 << 6;
    pub const US_588: u16 = 0x03 << 6;
    pub const US_1100: u16 = 0x04 << 6;
    pub const US_2116: u16 = 0x05 << 6;
    pub const US_4156: u16 = 0x06 << 6;
    pub const US_8244: u16 = 0x07 << 6;
}

/// Averaging flags (bits 9-11)
pub mod averages {
    pub const X1: u16 = 0x00 << 9;
    pub const X4: u16 = 0x01 << 9;
    pub const X16: u16 = 0x02 << 9;
    pub const X64: u16 = 0x03 << 9;
    pub const X128: u16 = 0x04 << 9;
    pub const X256: u16 = 0x05 << 9;
    pub const X512: u16 = 0x06 << 9;
    pub const X1024: u16 = 0x07 << 9;
}

/// Reset bit. Written alone, it restores power-on defaults.
pub const RESET: u16 = 0x01 << 15;

const MODE_SHIFT: u16 = 0;
const SHUNT_CT_SHIFT: u16 = 3;
const BUS_CT_SHIFT: u16 = 6;
const AVG_SHIFT: u16 = 9;
const FIELD_MASK: u16 = 0x07;

#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum Mode {
    PowerDown = 0,
    ShuntTriggered = 1,
    BusTriggered = 2,
    ShuntBusTriggered = 3,
    AdcOff = 4,
    ShuntContinuous = 5,
    BusContinuous = 6,
    #[default]
    ShuntBusContinuous = 7,
}

/// ADC conversion time, shared by the shunt and bus fields.
#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum ConversionTime {
    Us140 = 0,
    Us204 = 1,
    Us332 = 2,
    Us588 = 3,
    #[default]
    Us1100 = 4,
    Us2116 = 5,
    Us4156 = 6,
    Us8244 = 7,
}

impl ConversionTime {
    pub fn micros(&self) -> u32 {
        match self {
            ConversionTime::Us140 => 140,
            ConversionTime::Us204 => 204,
            ConversionTime::Us332 => 332,
            ConversionTime::Us588 => 588,
            ConversionTime::Us1100 => 1100,
            ConversionTime::Us2116 => 2116,
            ConversionTime::Us4156 => 4156,
            ConversionTime::Us8244 => 8244,
        }
    }
}

#[derive(FromRepr, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum Averages {
    #[default]
    X1 = 0,
    X4 = 1,
    X16 = 2,
    X64 = 3,
    X128 = 4,
    X256 = 5,
    X512 = 6,
    X1024 = 7,
}

impl Averages {
    pub fn samples(&self) -> u16 {
        match self {
            Averages::X1 => 1,
            Averages::X4 => 4,
            Averages::X16 => 16,
            Averages::X64 => 64,
            Averages::X128 => 128,
            Averages::X256 => 256,
            Averages::X512 => 512,
            Averages::X1024 => 1024,
        }
    }
}

/// Typed configuration register.
///
/// Each field can only hold one value, so unlike OR-ing raw flags two
/// settings for the same field cannot collide. The default is the chip's
/// power-on state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Configuration {
    pub mode: Mode,
    pub shunt_conversion: ConversionTime,
    pub bus_conversion: ConversionTime,
    pub averages: Averages,
}

impl Configuration {
    pub fn bits(&self) -> u16 {
        (self.mode as u16) << MODE_SHIFT
            | (self.shunt_conversion as u16) << SHUNT_CT_SHIFT
            | (self.bus_conversion as u16) << BUS_CT_SHIFT
            | (self.averages as u16) << AVG_SHIFT
    }

    /// Decode a register value. Bits outside the four fields are ignored.
    pub fn from_bits(bits: u16) -> Self {
        let field = |shift: u16| (bits >> shift) & FIELD_MASK;
        // every 3-bit value has a variant
        Self {
            mode: Mode::from_repr(field(MODE_SHIFT)).unwrap_or_default(),
            shunt_conversion: ConversionTime::from_repr(field(SHUNT_CT_SHIFT))
                .unwrap_or_default(),
            bus_conversion: ConversionTime::from_repr(field(BUS_CT_SHIFT)).unwrap_or_default(),
            averages: Averages::from_repr(field(AVG_SHIFT)).unwrap_or_default(),
        }
    }
}

bitflags! {
    /// Mask/Enable register (0x06): alert source selection and status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaskEnable: u16 {
        /// Shunt voltage over limit
        const SHUNT_OVER = 1 << 15;
        /// Shunt voltage under limit
        const SHUNT_UNDER = 1 << 14;
        /// Bus voltage over limit
        const BUS_OVER = 1 << 13;
        /// Bus voltage under limit
        const BUS_UNDER = 1 << 12;
        /// Power over limit
        const POWER_OVER = 1 << 11;
        /// Alert on conversion ready
        const CONVERSION_READY = 1 << 10;
        /// Alert function flag (read-only)
        const ALERT_FUNCTION = 1 << 4;
        /// Conversion ready flag (read-only)
        const CONVERSION_READY_FLAG = 1 << 3;
        /// Math overflow flag (read-only)
        const MATH_OVERFLOW = 1 << 2;
        /// Alert pin active high
        const ALERT_POLARITY = 1 << 1;
        /// Latch the alert until Mask/Enable is read
        const ALERT_LATCH = 1 << 0;
    }
}

/// INA226 error types
#[derive(Error, Debug)]
pub enum Ina226Error {
    #[error(transparent)]
    Hw(#[from] HwError),
    #[error("Shunt resistance {0} is not valid, must be greater than 0")]
    InvalidShunt(f64),
    #[error("Maximum current {0} is not valid, must be greater than 0")]
    InvalidMaxCurrent(f64),
    #[error("Calibration register is 0, current cannot be scaled")]
    ZeroCalibration,
}

pub type Result<T> = std::result::Result<T, Ina226Error>;

/// Calibration inputs accepted by the last successful [`Ina226::calibrate`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadSet {
    /// Shunt resistance in ohms.
    pub r_shunt: f64,
    /// Maximum expected current in amps.
    pub i_max: f64,
}

/// Bus and address overrides for [`Ina226::start`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ina226Config {
    pub bus: Option<usize>,
    pub address: Option<u8>,
    pub name: Option<String>,
}

impl Ina226Config {
    pub fn with_bus(mut self, bus: usize) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bus_or(&self, default: usize) -> usize {
        self.bus.unwrap_or(default)
    }

    pub fn address_or(&self, default: u8) -> u8 {
        self.address.unwrap_or(default)
    }
}

/// Current LSB in amps for a maximum expected current `i_max`.
///
/// The exact LSB `i_max / 2^15` is rounded up to one significant digit in
/// micro-amps, e.g. 97.66 uA becomes 100 uA.
pub fn current_lsb(i_max: f64) -> f64 {
    let lsb_ua = i_max / 32768.0 * 1_000_000.0;
    let scale = 10f64.powf(lsb_ua.log10().floor());
    (lsb_ua / scale).ceil() * scale / 1_000_000.0
}

/// Calibration register value: the exact quotient with the fraction
/// dropped, keeping its low 16 bits.
pub fn calibration_value(current_lsb: f64, r_shunt: f64) -> u16 {
    let exact = (CAL_SCALE / (current_lsb * r_shunt)) as u64;
    if exact > u64::from(u16::MAX) {
        warn!(exact, "Calibration value exceeds 16 bits, truncating");
    }
    exact as u16
}

/// INA226 driver
pub struct Ina226<C> {
    conn: C,
    name: String,
    load: LoadSet,
}

impl Ina226<Box<dyn Connection>> {
    /// Connect through `connector` and write an empty configuration word.
    ///
    /// The bus defaults to the connector's default bus and the address to
    /// [`DEFAULT_ADDRESS`], unless `config` overrides them.
    pub fn start<K>(connector: &K, config: Ina226Config) -> Result<Self>
    where
        K: Connector + ?Sized,
    {
        let bus = config.bus_or(connector.default_bus());
        let address = config.address_or(DEFAULT_ADDRESS);
        let conn = connector.get_connection(address, bus)?;
        debug!(bus, address = format_args!("{:#04x}", address), "Starting INA226");

        let mut ina = Self::new(conn);
        if let Some(name) = config.name {
            ina.set_name(name);
        }
        ina.configure(&[])?;
        Ok(ina)
    }
}

impl<C: Connection> Ina226<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            name: "INA226".to_string(),
            load: LoadSet::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn address(&self) -> u8 {
        self.conn.address()
    }

    pub fn load_set(&self) -> LoadSet {
        self.load
    }

    /// Nothing runs in the background, so there is nothing to stop.
    pub fn halt(&mut self) -> Result<()> {
        Ok(())
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    fn read_register(&mut self, reg: u8) -> Result<u16> {
        self.conn.write(&[reg])?;
        let mut buf = [0u8; 2];
        self.conn.read(&mut buf)?;
        let value = u16::from_be_bytes(buf);
        trace!(
            reg = format_args!("{:#04x}", reg),
            value = format_args!("{:#06x}", value),
            "INA226 read"
        );
        Ok(value)
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<()> {
        trace!(
            reg = format_args!("{:#04x}", reg),
            value = format_args!("{:#06x}", value),
            "INA226 write"
        );
        let [hi, lo] = value.to_be_bytes();
        self.conn.write(&[reg, hi, lo])?;
        Ok(())
    }

    /// OR the raw flags together and write them to the configuration
    /// register. Flags are not checked; two values for one field merge.
    pub fn configure(&mut self, flags: &[u16]) -> Result<()> {
        let word = flags.iter().fold(0, |acc, flag| acc | flag);
        self.write_register(regs::CONFIGURATION, word)
    }

    pub fn set_configuration(&mut self, config: &Configuration) -> Result<()> {
        self.write_register(regs::CONFIGURATION, config.bits())
    }

    pub fn read_configuration(&mut self) -> Result<u16> {
        self.read_register(regs::CONFIGURATION)
    }

    pub fn read_configuration_fields(&mut self) -> Result<Configuration> {
        Ok(Configuration::from_bits(self.read_configuration()?))
    }

    /// Program the calibration register for shunt `r_shunt` (ohms) and
    /// maximum expected current `i_max` (amps).
    ///
    /// The inputs are remembered only once the register write succeeds.
    pub fn calibrate(&mut self, r_shunt: f64, i_max: f64) -> Result<()> {
        if !(r_shunt > 0.0) {
            return Err(Ina226Error::InvalidShunt(r_shunt));
        }
        if !(i_max > 0.0) {
            return Err(Ina226Error::InvalidMaxCurrent(i_max));
        }

        let lsb = current_lsb(i_max);
        let cal = calibration_value(lsb, r_shunt);
        debug!(r_shunt, i_max, current_lsb = lsb, cal, "Calibrating INA226");

        self.write_register(regs::CALIBRATION, cal)?;
        self.load = LoadSet { r_shunt, i_max };
        Ok(())
    }

    pub fn read_calibration(&mut self) -> Result<u16> {
        self.read_register(regs::CALIBRATION)
    }

    /// Write the reset bit alone. The chip clears its calibration, so the
    /// remembered inputs are dropped too.
    pub fn reset(&mut self) -> Result<()> {
        self.write_register(regs::CONFIGURATION, RESET)?;
        self.load = LoadSet::default();
        Ok(())
    }

    /// Amps per LSB of the current register, from the calibration register
    /// and the remembered shunt resistance.
    pub fn current_resolution(&mut self) -> Result<f64> {
        let r_shunt = self.load.r_shunt;
        if !(r_shunt > 0.0) {
            return Err(Ina226Error::InvalidShunt(r_shunt));
        }
        let cal = self.read_calibration()?;
        if cal == 0 {
            return Err(Ina226Error::ZeroCalibration);
        }
        Ok(CAL_SCALE / (f64::from(cal) * r_shunt))
    }

    /// Bus voltage in millivolts.
    pub fn read_bus_voltage(&mut self) -> Result<f64> {
        let raw = self.read_register(regs::BUS_VOLTAGE)?;
        Ok(f64::from(raw) * BUS_VOLTAGE_LSB_MV)
    }

    /// Shunt voltage in millivolts. Negative when current flows backwards.
    pub fn read_shunt_voltage(&mut self) -> Result<f64> {
        let raw = self.read_register(regs::SHUNT_VOLTAGE)? as i16;
        Ok(f64::from(raw) * SHUNT_VOLTAGE_LSB_MV)
    }

    pub fn read_shunt_current_register(&mut self) -> Result<i16> {
        Ok(self.read_register(regs::CURRENT)? as i16)
    }

    /// Shunt current in amps.
    pub fn read_shunt_current(&mut self) -> Result<f64> {
        let raw = self.read_shunt_current_register()?;
        let resolution = self.current_resolution()?;
        Ok(f64::from(raw) * resolution)
    }

    /// Load power in watts.
    pub fn read_power(&mut self) -> Result<f64> {
        let raw = self.read_register(regs::POWER)?;
        let resolution = self.current_resolution()?;
        Ok(f64::from(raw) * POWER_LSB_RATIO * resolution)
    }

    pub fn read_manufacturer_id(&mut self) -> Result<u16> {
        self.read_register(regs::MANUFACTURER_ID)
    }

    pub fn read_die_id(&mut self) -> Result<u16> {
        self.read_register(regs::DIE_ID)
    }

    /// Select the alert source and its threshold. The limit is written
    /// first so the alert never fires against a stale threshold.
    pub fn set_alert(&mut self, mask: MaskEnable, limit: u16) -> Result<()> {
        self.write_register(regs::ALERT_LIMIT, limit)?;
        self.write_register(regs::MASK_ENABLE, mask.bits())
    }

    /// Reading clears a latched alert.
    pub fn read_mask_enable(&mut self) -> Result<MaskEnable> {
        Ok(MaskEnable::from_bits_retain(
            self.read_register(regs::MASK_ENABLE)?,
        ))
    }

    pub fn read_alert_limit(&mut self) -> Result<u16> {
        self.read_register(regs::ALERT_LIMIT)
    }
}
