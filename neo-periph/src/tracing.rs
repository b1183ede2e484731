//! Logging setup for programs built on this crate.
//!
//! The library itself only emits events; nothing is printed until the
//! application installs a subscriber with one of the `init_*` functions.
//! Library modules use the `tracing` macros directly; applications can pull
//! them in with `use neo_periph::tracing::prelude::*`.

use std::env;
use std::io::IsTerminal;

use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Crate prefixes dropped from event targets.
const OWN_CRATES: &[&str] = &["neo_periph::", "neo_probe::"];

/// Initialize logging at `default_level` unless `RUST_LOG` says otherwise.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to journald; otherwise to
/// stderr, one line per event.
pub fn init_journald_or_stdout(default_level: LevelFilter) {
    if env::var("JOURNAL_STREAM").is_ok() {
        match tracing_journald::layer() {
            Ok(layer) => tracing_subscriber::registry()
                .with(env_filter(default_level))
                .with(layer)
                .init(),
            Err(e) => {
                use_stderr(default_level);
                warn!(error = %e, "journald unavailable, logging to stderr");
            }
        }
    } else {
        use_stderr(default_level);
    }
}

fn env_filter(default_level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy()
}

fn use_stderr(default_level: LevelFilter) {
    let color = std::io::stderr().is_terminal();
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(LineFormatter { color }),
        )
        .init();
}

/// `HH:MM:SS LEVEL target: message key=value ...`
struct LineFormatter {
    color: bool,
}

#[derive(Default)]
struct FieldCollector {
    fields: Vec<(String, String)>,
    message: Option<String>,
}

impl tracing::field::Visit for FieldCollector {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let formatted = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(formatted);
        } else {
            self.fields.push((field.name().to_string(), formatted));
        }
    }
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for LineFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        LocalTimer.format_time(&mut writer)?;

        let (color, label) = level_style(*event.metadata().level());
        if self.color {
            write!(writer, " {}{}\x1b[0m ", color, label)?;
        } else {
            write!(writer, " {} ", label)?;
        }

        write!(writer, "{}: ", short_target(event.metadata().target()))?;
        if let Some(message) = &visitor.message {
            write!(writer, "{}", message)?;
        }

        for (key, value) in &visitor.fields {
            if self.color {
                write!(writer, " \x1b[90m{}=\x1b[0m{}", key, value)?;
            } else {
                write!(writer, " {}={}", key, value)?;
            }
        }

        writeln!(writer)
    }
}

fn level_style(level: tracing::Level) -> (&'static str, &'static str) {
    match level {
        tracing::Level::ERROR => ("\x1b[31m", "ERROR"),
        tracing::Level::WARN => ("\x1b[33m", "WARN "),
        tracing::Level::INFO => ("\x1b[32m", "INFO "),
        tracing::Level::DEBUG => ("\x1b[34m", "DEBUG"),
        tracing::Level::TRACE => ("\x1b[35m", "TRACE"),
    }
}

fn short_target(target: &str) -> &str {
    OWN_CRATES
        .iter()
        .find_map(|prefix| target.strip_prefix(prefix))
        .unwrap_or(target)
}

/// Local wall-clock time to the second. Falls back to UTC when the local
/// offset cannot be determined.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let text = now
            .format(time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("neo_periph::board::nanopi_neo", "board::nanopi_neo")]
    #[test_case("neo_probe::commands", "commands")]
    #[test_case("nix::errno", "nix::errno"; "foreign crates keep their path")]
    #[test_case("neo_periph", "neo_periph"; "bare crate name")]
    fn target_shortening(target: &str, expected: &str) {
        assert_eq!(short_target(target), expected);
    }

    #[test]
    fn level_labels_are_aligned() {
        for level in [
            tracing::Level::ERROR,
            tracing::Level::WARN,
            tracing::Level::INFO,
            tracing::Level::DEBUG,
            tracing::Level::TRACE,
        ] {
            assert_eq!(level_style(level).1.len(), 5);
        }
    }
}
