//! Probe INA226 sensors and header pins on a NanoPi NEO.

mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neo_periph::board::{NanoPiNeo, PinTable};
use neo_periph::hw_trait::PinValue;
use neo_periph::peripheral::ina226::{Configuration, DEFAULT_ADDRESS};
use neo_periph::peripheral::{Ina226, Ina226Config};
use output::PowerReport;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

/// NanoPi NEO hardware probe
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    debug: bool,
}

/// Where to find the sensor.
#[derive(clap::Args, Debug)]
struct SensorArgs {
    /// I2C bus number (0 or 1)
    #[arg(short, long)]
    bus: Option<usize>,

    /// 7-bit device address, decimal or 0x-prefixed hex
    #[arg(short, long, value_parser = parse_address)]
    address: Option<u8>,
}

impl SensorArgs {
    fn config(&self) -> Ina226Config {
        Ina226Config {
            bus: self.bus,
            address: self.address,
            name: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calibrate the INA226 and print voltage, current and power
    Power {
        #[command(flatten)]
        sensor: SensorArgs,

        /// Shunt resistance in ohms
        #[arg(short, long, default_value_t = 0.1)]
        shunt: f64,

        /// Maximum expected current in amps
        #[arg(short = 'm', long, default_value_t = 2.0)]
        max_current: f64,

        /// Number of readings to print
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },

    /// Print the INA226 manufacturer and die IDs
    Id {
        #[command(flatten)]
        sensor: SensorArgs,
    },

    /// List header pins and their kernel numbers
    Pins,

    /// Read a GPIO pin
    GpioRead { pin: String },

    /// Drive a GPIO pin (0/1, low/high)
    GpioWrite {
        pin: String,
        #[arg(value_parser = parse_level)]
        value: PinValue,
    },

    /// Set PWM duty cycle as 0-255 of the period
    Pwm { pin: String, value: u8 },

    /// Move a servo to an angle in degrees (0-180)
    Servo {
        pin: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=180))]
        angle: u8,
    },
}

fn parse_address(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid address {:?}: {}", s, e))?;

    if parsed > 0x7F {
        return Err(format!("address 0x{:02X} is not a 7-bit address", parsed));
    }
    Ok(parsed)
}

fn parse_level(s: &str) -> std::result::Result<PinValue, String> {
    match s.to_ascii_lowercase().as_str() {
        "0" | "low" => Ok(PinValue::Low),
        "1" | "high" => Ok(PinValue::High),
        _ => Err(format!("expected 0, 1, low or high, got {:?}", s)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    neo_periph::tracing::init_journald_or_stdout(level);

    let pins = PinTable::nanopi_neo();
    let neo = NanoPiNeo::new(&pins);
    debug!(board = neo.name(), config = ?neo.config(), "Board ready");

    // Handles are released even when the command fails.
    let outcome = run(&args.command, &neo);
    let released = neo.finalize().context("Failed to release board handles");
    outcome?;
    released
}

fn run(command: &Command, neo: &NanoPiNeo<'_>) -> Result<()> {
    neo.connect()?;

    match command {
        Command::Power {
            sensor,
            shunt,
            max_current,
            count,
        } => {
            let mut ina = start_sensor(neo, sensor)?;
            ina.set_configuration(&Configuration::default())
                .context("Failed to configure INA226")?;
            ina.calibrate(*shunt, *max_current)
                .context("Failed to calibrate INA226")?;
            info!(shunt, max_current, "Calibrated");

            for _ in 0..*count {
                let report = PowerReport {
                    bus_mv: ina.read_bus_voltage()?,
                    shunt_mv: ina.read_shunt_voltage()?,
                    current_a: ina.read_shunt_current()?,
                    power_w: ina.read_power()?,
                };
                println!("{}", report);
            }
            ina.halt()?;
        }

        Command::Id { sensor } => {
            let mut ina = start_sensor(neo, sensor)?;
            let manufacturer = ina.read_manufacturer_id()?;
            let die = ina.read_die_id()?;
            println!("{}", output::format_id(manufacturer, die));
        }

        Command::Pins => {
            for (name, entry) in neo.pins().iter() {
                println!("{}", output::format_pin(name, entry.gpio, entry.pwm));
            }
        }

        Command::GpioRead { pin } => {
            let value = neo
                .digital_read(pin)
                .with_context(|| format!("Failed to read {}", pin))?;
            println!("{}", value);
        }

        Command::GpioWrite { pin, value } => {
            neo.digital_write(pin, *value)
                .with_context(|| format!("Failed to write {}", pin))?;
        }

        Command::Pwm { pin, value } => {
            neo.pwm_write(pin, *value)
                .with_context(|| format!("Failed to set PWM on {}", pin))?;
        }

        Command::Servo { pin, angle } => {
            neo.servo_write(pin, *angle)
                .with_context(|| format!("Failed to move servo on {}", pin))?;
        }
    }

    Ok(())
}

fn start_sensor(
    neo: &NanoPiNeo<'_>,
    sensor: &SensorArgs,
) -> Result<Ina226<Box<dyn neo_periph::hw_trait::Connection>>> {
    let config = sensor.config();
    Ina226::start(neo, config.clone()).with_context(|| {
        format!(
            "Failed to start INA226 at 0x{:02X} on bus {}",
            config.address_or(DEFAULT_ADDRESS),
            config.bus_or(0)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_in_hex_or_decimal() {
        assert_eq!(parse_address("0x40"), Ok(0x40));
        assert_eq!(parse_address("0X4f"), Ok(0x4F));
        assert_eq!(parse_address("64"), Ok(0x40));
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("forty").is_err());
    }

    #[test]
    fn pin_levels() {
        assert_eq!(parse_level("HIGH"), Ok(PinValue::High));
        assert_eq!(parse_level("0"), Ok(PinValue::Low));
        assert!(parse_level("2").is_err());
    }

    #[test]
    fn command_line_parses() {
        let args = Args::try_parse_from([
            "neo-probe", "power", "--bus", "1", "-a", "0x41", "--shunt", "0.01",
        ])
        .unwrap();
        match args.command {
            Command::Power { sensor, shunt, .. } => {
                assert_eq!(sensor.config().bus_or(0), 1);
                assert_eq!(sensor.config().address_or(DEFAULT_ADDRESS), 0x41);
                assert_eq!(shunt, 0.01);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Args::try_parse_from(["neo-probe", "servo", "GPIOC0", "181"]).is_err());
    }

    #[test]
    fn clap_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
