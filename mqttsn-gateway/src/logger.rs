//! Custom `log::Log` implementation, grounded on the teacher's
//! `mqtt-broker/src/logger.rs` — colored level strings, optional file sink
//! alongside console, UTC timestamps.

use std::fs::{self, OpenOptions};
use std::io::Write;

use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use time::format_description::FormatItem;
use time::OffsetDateTime;

use crate::config::GatewayConfig;

const TIMESTAMP_FORMAT_UTC: &[FormatItem] =
    time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

pub struct GatewayLogger {
    write_file: bool,
    write_console: bool,
    level: LevelFilter,
}

impl GatewayLogger {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            write_file: config.should_log_file(),
            write_console: config.should_log_console(),
            level: config.log_level(),
        }
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl log::Log for GatewayLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(TIMESTAMP_FORMAT_UTC)
            .unwrap_or_else(|_| "unknown-time".to_string());

        let colorized_level = match record.level() {
            Level::Error => format!("{:<5}", record.level()).red().to_string(),
            Level::Warn => format!("{:<5}", record.level()).yellow().to_string(),
            Level::Info => format!("{:<5}", record.level()).cyan().to_string(),
            Level::Debug => format!("{:<5}", record.level()).purple().to_string(),
            Level::Trace => format!("{:<5}", record.level()).normal().to_string(),
        };

        if self.write_console {
            println!("{timestamp} {colorized_level} {}", record.args());
        }

        if self.write_file {
            self.log_file(record, &timestamp);
        }
    }

    fn flush(&self) {}
}

impl GatewayLogger {
    fn log_file(&self, record: &Record, timestamp: &str) {
        let _ = fs::create_dir_all("logs");
        let path = match record.level() {
            Level::Error => "logs/error.log",
            Level::Debug | Level::Trace => "logs/debug.log",
            Level::Warn | Level::Info => "logs/main.log",
        };
        let line = format!("{};{};{timestamp}\n", record.level(), record.args());
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = file.write_all(line.as_bytes());
        }
    }
}
