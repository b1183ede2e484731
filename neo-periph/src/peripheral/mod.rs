//! Peripheral device drivers.
//!
//! Drivers talk to their device through a [`Connection`](crate::hw_trait::Connection)
//! and never open buses themselves.

pub mod ina226;

pub use ina226::{Ina226, Ina226Config, Ina226Error};
