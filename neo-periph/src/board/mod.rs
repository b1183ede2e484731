//! Board adaptors.
//!
//! An adaptor owns the host side of a board: it resolves header pin names to
//! kernel handles and implements [`Connector`](crate::hw_trait::Connector)
//! so peripheral drivers can ask it for I2C connections.

pub mod nanopi_neo;

pub use nanopi_neo::{AdaptorConfig, NanoPiNeo, PinEntry, PinTable};
