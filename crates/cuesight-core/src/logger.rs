//! Minimal stderr logger.
//!
//! Lines look like `[  1.204s  INFO cuesight::keystone] message`; the target
//! is trimmed to its first two path segments. Install once at startup with
//! [`init_with_level`], or enable the `tracing` feature and use
//! `init_tracing` for span timings filtered through [`LOG_ENV`].

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

fn short_target(target: &str) -> &str {
    match target.match_indices("::").nth(1) {
        Some((idx, _)) => &target[..idx],
        None => target,
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs anything; later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Environment variable holding `tracing` filter directives, e.g.
/// `cuesight_table=debug,info`.
pub const LOG_ENV: &str = "CUESIGHT_LOG";

/// Filter directive for `level` across every target.
#[cfg(any(feature = "tracing", test))]
fn level_directive(level: LevelFilter) -> String {
    level.as_str().to_ascii_lowercase()
}

/// Install a `tracing` subscriber that also reports span durations.
///
/// Directives in [`LOG_ENV`] win over `level`. With `json` every event is
/// one flattened JSON object per line.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(level_directive(level)));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.with_timer(fmt::time::Uptime::default()).finish().try_init()
    };
    if installed.is_err() {
        log::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_trimmed_to_two_segments() {
        assert_eq!(short_target("cuesight"), "cuesight");
        assert_eq!(short_target("cuesight::keystone"), "cuesight::keystone");
        assert_eq!(
            short_target("cuesight_table::circles::hough"),
            "cuesight_table::circles"
        );
    }

    #[test]
    fn directive_names_the_level() {
        assert_eq!(level_directive(LevelFilter::Info), "info");
        assert_eq!(level_directive(LevelFilter::Off), "off");
        assert_eq!(level_directive(LevelFilter::Trace), "trace");
    }
}
