use std::{fs::File, io::Write, thread};

use env_logger::{Builder, Target, WriteStyle, fmt::Formatter};
use log::{Level, Record};

use crate::options::{LogFormat, SolverOptions};
use crate::{Error, Result};

/// Installs the global logger described by `options`.
pub fn init_logger(options: &SolverOptions) -> Result<()> {
    build_logger(options)?
        .try_init()
        .map_err(|e| Error::other(format!("logger init failed: {e}")))
}

fn build_logger(options: &SolverOptions) -> Result<Builder> {
    let log_format = options.log_format;
    let log_timestamp = options.log_timestamp;

    let mut builder = Builder::new();
    builder
        .filter_level(options.log_level.to_filter())
        .write_style(WriteStyle::Never)
        .format(move |buf: &mut Formatter, record| {
            if log_timestamp {
                write!(buf, "{} ", buf.timestamp_millis())?;
            }
            write_record(buf, log_format, record)
        });

    match options.log_output_path() {
        Some(log_path) => {
            let log_file = File::create(log_path).map_err(|e| {
                Error::other(format!(
                    "failed to create log output file {}: {e}",
                    log_path.display()
                ))
            })?;
            builder.target(Target::Pipe(Box::new(log_file)));
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    Ok(builder)
}

fn write_record(out: &mut impl Write, format: LogFormat, record: &Record) -> std::io::Result<()> {
    let tag = level_tag(record.level());
    match format {
        LogFormat::Compact => writeln!(out, "{tag} {}", record.args()),
        // Batch workers are named threads, so the name tells instances apart.
        LogFormat::Pretty => match thread::current().name() {
            Some(name) => writeln!(out, "{tag} [{}] ({name}) {}", record.target(), record.args()),
            None => writeln!(out, "{tag} [{}] {}", record.target(), record.args()),
        },
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}
