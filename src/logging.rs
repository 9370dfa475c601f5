//! Logging destination selection (§6.3): `simple_logger` to stdout by
//! default, or a plain append-only file sink when `--logfile` is given.
//! `simple_logger` has no file-output mode of its own, so the file case is
//! a small hand-rolled `log::Log` impl rather than a second crate.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Mutex,
};

use log::{Level, LevelFilter, Log, Metadata, Record};

struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Initializes the global logger for the level `--verbose` selected, either
/// to stdout or to `logfile` if one was given.
pub fn init(level: LevelFilter, logfile: Option<&Path>) -> anyhow::Result<()> {
    match logfile {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            log::set_boxed_logger(Box::new(FileLogger { level, file: Mutex::new(file) }))?;
            log::set_max_level(level);
        }
        None => {
            simple_logger::init_with_level(level.to_level().unwrap_or(Level::Info))?;
        }
    }

    Ok(())
}
