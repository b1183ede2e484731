//! Header pin names to kernel line numbers.

use std::collections::BTreeMap;

/// Kernel numbering for one header pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEntry {
    /// sysfs GPIO number.
    pub gpio: u32,
    /// PWM channel on the board's PWM chip, when the pin has one.
    pub pwm: Option<u32>,
}

impl PinEntry {
    pub const fn gpio(gpio: u32) -> Self {
        Self { gpio, pwm: None }
    }

    pub const fn with_pwm(gpio: u32, channel: u32) -> Self {
        Self {
            gpio,
            pwm: Some(channel),
        }
    }
}

/// Immutable name lookup, shared by reference with the adaptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinTable {
    pins: BTreeMap<String, PinEntry>,
}

impl PinTable {
    /// The NanoPi NEO header. None of its pins are wired to a PWM channel.
    pub fn nanopi_neo() -> Self {
        [
            ("GPIOG11", 203),
            ("GPIOC0", 64),
            ("GPIOC1", 65),
            ("GPIOC2", 66),
            ("GPIOC3", 67),
            ("GPIOA6", 6),
            ("GPIOA2", 14),
            ("GPIOA3", 16),
        ]
        .into_iter()
        .map(|(name, gpio)| (name, PinEntry::gpio(gpio)))
        .collect()
    }

    pub fn get(&self, name: &str) -> Option<PinEntry> {
        self.pins.get(name).copied()
    }

    /// Pin names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pins.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PinEntry)> {
        self.pins.iter().map(|(name, entry)| (name.as_str(), *entry))
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, PinEntry)> for PinTable {
    fn from_iter<I: IntoIterator<Item = (S, PinEntry)>>(iter: I) -> Self {
        Self {
            pins: iter
                .into_iter()
                .map(|(name, entry)| (name.into(), entry))
                .collect(),
        }
    }
}
