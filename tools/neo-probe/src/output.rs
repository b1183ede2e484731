//! Human-readable formatting of probe results.

use std::fmt;

use neo_periph::peripheral::ina226::MANUFACTURER_ID;

/// One set of INA226 measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReport {
    pub bus_mv: f64,
    pub shunt_mv: f64,
    pub current_a: f64,
    pub power_w: f64,
}

impl fmt::Display for PowerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus {:.3} V  shunt {:.4} mV  current {:.4} A  power {:.4} W",
            self.bus_mv / 1000.0,
            self.shunt_mv,
            self.current_a,
            self.power_w
        )
    }
}

/// Identification registers with their decoded meaning.
pub fn format_id(manufacturer: u16, die: u16) -> String {
    let vendor = if manufacturer == MANUFACTURER_ID {
        " (Texas Instruments)"
    } else {
        ""
    };
    // die ID: device in bits 15-4, revision in bits 3-0
    format!(
        "manufacturer 0x{:04X}{}  die 0x{:04X} (device 0x{:03X} rev {})",
        manufacturer,
        vendor,
        die,
        die >> 4,
        die & 0x0F
    )
}

/// Pin table listing, one pin per line.
pub fn format_pin(name: &str, gpio: u32, pwm: Option<u32>) -> String {
    match pwm {
        Some(channel) => format!("{:<8} gpio {:>3}  pwm {}", name, gpio, channel),
        None => format!("{:<8} gpio {:>3}", name, gpio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_report_units() {
        let report = PowerReport {
            bus_mv: 12_000.0,
            shunt_mv: -0.25,
            current_a: -0.0251,
            power_w: 0.3012,
        };
        assert_eq!(
            report.to_string(),
            "bus 12.000 V  shunt -0.2500 mV  current -0.0251 A  power 0.3012 W"
        );
    }

    #[test]
    fn id_decoding() {
        assert_eq!(
            format_id(0x5449, 0x2260),
            "manufacturer 0x5449 (Texas Instruments)  die 0x2260 (device 0x226 rev 0)"
        );
        assert!(format_id(0x1234, 0x0001).starts_with("manufacturer 0x1234  die"));
    }

    #[test]
    fn pin_lines() {
        assert_eq!(format_pin("GPIOG11", 203, None), "GPIOG11  gpio 203");
        assert_eq!(format_pin("PWM0", 5, Some(0)), "PWM0     gpio   5  pwm 0");
    }
}
