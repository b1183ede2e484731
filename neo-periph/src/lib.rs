//! Sensor and board support for Linux single-board computers.
//!
//! [`peripheral::ina226`] drives a TI INA226 current/power monitor over I2C.
//! [`board::nanopi_neo`] adapts a FriendlyARM NanoPi NEO: header pin names
//! map to sysfs GPIO and PWM handles, and bus numbers map to `/dev/i2c-N`.
//!
//! ```no_run
//! use neo_periph::board::{NanoPiNeo, PinTable};
//! use neo_periph::peripheral::{Ina226, Ina226Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pins = PinTable::nanopi_neo();
//! let neo = NanoPiNeo::new(&pins);
//!
//! let mut ina = Ina226::start(&neo, Ina226Config::default())?;
//! ina.calibrate(0.1, 2.0)?;
//! println!("{:.3} A", ina.read_shunt_current()?);
//!
//! neo.finalize()?;
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod hw_trait;
pub mod peripheral;
pub mod sysfs;
pub mod tracing;
