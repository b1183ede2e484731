//! GPIO and PWM value types shared by the pin handles.

use std::fmt;

use super::{HwError, Result};

/// GPIO pin value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    Low,
    High,
}

impl PinValue {
    /// Text written to a sysfs `value` file.
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            PinValue::Low => "0",
            PinValue::High => "1",
        }
    }

    /// Parse the contents of a sysfs `value` file.
    pub fn from_sysfs(text: &str) -> Result<Self> {
        match text.trim() {
            "0" => Ok(PinValue::Low),
            "1" => Ok(PinValue::High),
            other => Err(HwError::InvalidParameter(format!(
                "unexpected GPIO value {:?}",
                other
            ))),
        }
    }
}

impl From<bool> for PinValue {
    fn from(value: bool) -> Self {
        if value {
            PinValue::High
        } else {
            PinValue::Low
        }
    }
}

impl From<PinValue> for bool {
    fn from(value: PinValue) -> Self {
        matches!(value, PinValue::High)
    }
}

impl fmt::Display for PinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sysfs())
    }
}

/// GPIO pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    In,
    Out,
}

impl PinDirection {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            PinDirection::In => "in",
            PinDirection::Out => "out",
        }
    }
}

/// PWM output polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inversed,
}

impl Polarity {
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            Polarity::Normal => "normal",
            Polarity::Inversed => "inversed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0", PinValue::Low; "low")]
    #[test_case("1\n", PinValue::High; "high with newline")]
    #[test_case(" 1 ", PinValue::High; "padded")]
    fn parse_value(text: &str, expected: PinValue) {
        assert_eq!(PinValue::from_sysfs(text).unwrap(), expected);
    }

    #[test]
    fn reject_garbage_value() {
        assert!(matches!(
            PinValue::from_sysfs("high"),
            Err(HwError::InvalidParameter(_))
        ));
    }

    #[test]
    fn bool_conversions() {
        assert_eq!(PinValue::from(true), PinValue::High);
        assert!(!bool::from(PinValue::Low));
    }
}
