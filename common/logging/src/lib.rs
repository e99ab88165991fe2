#[macro_use]
extern crate lazy_static;

use metrics::{inc_counter, try_create_int_counter, IntCounter, Result as MetricsResult};
use serde::{Deserialize, Serialize};
use slog::{o, Drain, Logger};
use slog_term::Decorator;
use std::io::{Result, Write};
use std::str::FromStr;

pub const MAX_MESSAGE_WIDTH: usize = 40;

lazy_static! {
    pub static ref INFOS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("info_total", "Count of infos logged");
    pub static ref WARNS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("warn_total", "Count of warns logged");
    pub static ref ERRORS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("error_total", "Count of errors logged");
    pub static ref CRITS_TOTAL: MetricsResult<IntCounter> =
        try_create_int_counter("crit_total", "Count of crits logged");
}

/// Configuration for the process-wide logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error` or `crit`.
    pub debug_level: String,
    /// Emit one JSON object per record instead of aligned terminal output.
    pub json: bool,
    /// Width the message column is padded to in terminal output.
    pub max_message_width: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            debug_level: "info".to_string(),
            json: false,
            max_message_width: MAX_MESSAGE_WIDTH,
        }
    }
}

fn parse_level(level: &str) -> std::result::Result<slog::Level, String> {
    slog::Level::from_str(level).map_err(|_| format!("unknown log level: {}", level))
}

/// Build the root logger described by `config`, writing to stderr.
///
/// Terminal output is aligned with `AlignedTermDecorator` and drained asynchronously.
pub fn build_logger(config: &LoggerConfig) -> std::result::Result<Logger, String> {
    let level = parse_level(&config.debug_level)?;

    if config.json {
        use sloggers::Build;

        let severity = match level {
            slog::Level::Critical => sloggers::types::Severity::Critical,
            slog::Level::Error => sloggers::types::Severity::Error,
            slog::Level::Warning => sloggers::types::Severity::Warning,
            slog::Level::Info => sloggers::types::Severity::Info,
            slog::Level::Debug => sloggers::types::Severity::Debug,
            slog::Level::Trace => sloggers::types::Severity::Trace,
        };
        return sloggers::terminal::TerminalLoggerBuilder::new()
            .level(severity)
            .format(sloggers::types::Format::Json)
            .destination(sloggers::terminal::Destination::Stderr)
            .build()
            .map_err(|e| format!("unable to build json logger: {:?}", e));
    }

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let decorator = AlignedTermDecorator::new(decorator, config.max_message_width);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain)
        .chan_size(2048)
        .build()
        .filter_level(level)
        .fuse();

    Ok(Logger::root(drain, o!()))
}

pub struct AlignedTermDecorator<D: Decorator> {
    wrapped: D,
    message_width: usize,
}

impl<D: Decorator> AlignedTermDecorator<D> {
    pub fn new(decorator: D, message_width: usize) -> Self {
        AlignedTermDecorator {
            wrapped: decorator,
            message_width,
        }
    }
}

impl<D: Decorator> Decorator for AlignedTermDecorator<D> {
    fn with_record<F>(
        &self,
        record: &slog::Record,
        _logger_values: &slog::OwnedKVList,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut dyn slog_term::RecordDecorator) -> std::io::Result<()>,
    {
        match record.level() {
            slog::Level::Info => inc_counter(&INFOS_TOTAL),
            slog::Level::Warning => inc_counter(&WARNS_TOTAL),
            slog::Level::Error => inc_counter(&ERRORS_TOTAL),
            slog::Level::Critical => inc_counter(&CRITS_TOTAL),
            _ => (),
        }

        self.wrapped.with_record(record, _logger_values, |deco| {
            f(&mut AlignedRecordDecorator::new(deco, self.message_width))
        })
    }
}

struct AlignedRecordDecorator<'a> {
    wrapped: &'a mut dyn slog_term::RecordDecorator,
    message_count: usize,
    message_active: bool,
    ignore_comma: bool,
    message_width: usize,
}

impl<'a> AlignedRecordDecorator<'a> {
    fn new(
        decorator: &'a mut dyn slog_term::RecordDecorator,
        message_width: usize,
    ) -> AlignedRecordDecorator<'a> {
        AlignedRecordDecorator {
            wrapped: decorator,
            message_count: 0,
            ignore_comma: false,
            message_active: false,
            message_width,
        }
    }
}

impl<'a> Write for AlignedRecordDecorator<'a> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.ignore_comma {
            //don't write comma
            self.ignore_comma = false;
            Ok(buf.len())
        } else if self.message_active {
            self.wrapped.write(buf).map(|n| {
                self.message_count += n;
                n
            })
        } else {
            self.wrapped.write(buf)
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.wrapped.flush()
    }
}

impl<'a> slog_term::RecordDecorator for AlignedRecordDecorator<'a> {
    fn reset(&mut self) -> Result<()> {
        self.message_active = false;
        self.message_count = 0;
        self.ignore_comma = false;
        self.wrapped.reset()
    }

    fn start_whitespace(&mut self) -> Result<()> {
        self.wrapped.start_whitespace()
    }

    fn start_msg(&mut self) -> Result<()> {
        self.message_active = true;
        self.ignore_comma = false;
        self.wrapped.start_msg()
    }

    fn start_timestamp(&mut self) -> Result<()> {
        self.wrapped.start_timestamp()
    }

    fn start_level(&mut self) -> Result<()> {
        self.wrapped.start_level()
    }

    fn start_comma(&mut self) -> Result<()> {
        if self.message_active && self.message_count + 1 < self.message_width {
            self.ignore_comma = true;
        }
        self.wrapped.start_comma()
    }

    fn start_key(&mut self) -> Result<()> {
        if self.message_active && self.message_count + 1 < self.message_width {
            write!(
                self,
                "{}",
                " ".repeat(self.message_width - self.message_count)
            )?;
            self.message_active = false;
            self.message_count = 0;
            self.ignore_comma = false;
        }
        self.wrapped.start_key()
    }

    fn start_value(&mut self) -> Result<()> {
        self.wrapped.start_value()
    }

    fn start_separator(&mut self) -> Result<()> {
        self.wrapped.start_separator()
    }
}

/// Return a logger suitable for test usage.
///
/// By default no logs will be printed, but they can be enabled via the `test_logger` feature.
/// By importing `use logging::test_logger;` and then using it to create the logger the developer
/// can pass `--features 'logging/test_logger'` when running the tests and the logs are visible.
pub fn test_logger() -> Logger {
    use sloggers::Build;

    let built = if cfg!(feature = "test_logger") {
        sloggers::terminal::TerminalLoggerBuilder::new()
            .level(sloggers::types::Severity::Debug)
            .build()
    } else {
        sloggers::null::NullLoggerBuilder.build()
    };

    // Neither builder performs I/O during construction.
    built.unwrap_or_else(|_| Logger::root(slog::Discard, o!()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        assert!(build_logger(&LoggerConfig::default()).is_ok());
    }

    #[test]
    fn json_config_builds() {
        let config = LoggerConfig {
            json: true,
            debug_level: "debug".into(),
            ..LoggerConfig::default()
        };
        assert!(build_logger(&config).is_ok());
    }

    #[test]
    fn unknown_level_is_rejected() {
        let config = LoggerConfig {
            debug_level: "loud".into(),
            ..LoggerConfig::default()
        };
        assert!(build_logger(&config).is_err());
    }

    #[test]
    fn test_logger_accepts_records() {
        let log = test_logger();
        slog::info!(log, "Test message"; "key" => 1);
    }
}
