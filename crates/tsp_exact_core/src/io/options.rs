use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use log::LevelFilter;
use milp::backend::SolveLimits;

use crate::{Error, Result};

const DEFAULT_INPUT: &str = "10_instancias";
const DEFAULT_OUTPUT_FILE: &str = "mejores_soluciones.csv";
const DEFAULT_EXTENSION: &str = "tsp";

/// Runtime options for a batch of exact solves.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOptions {
    /// Instance file, or a directory scanned for instance files.
    pub input: String,
    /// CSV output path. Empty means `<input dir>/mejores_soluciones.csv`.
    pub output: String,
    /// Extension (without the dot) of instance files inside a directory.
    pub extension: String,
    /// Per-instance wall-clock budget in seconds. `0` means unlimited.
    pub time_limit: f64,
    /// Per-instance branch-and-bound node budget. `0` means unlimited.
    pub node_limit: usize,
    /// Relative optimality gap at which a solve may stop early.
    pub mip_gap: f64,
    /// Number of instances solved concurrently.
    pub jobs: usize,
    /// Directory receiving one `<name>.lp` model dump per instance. Empty disables it.
    pub write_lp: String,
    /// Structured logging level.
    pub log_level: LogLevel,
    /// Logging output format.
    pub log_format: LogFormat,
    /// Include timestamps in log lines.
    pub log_timestamp: bool,
    /// Optional output file path for logs. Empty means stderr.
    pub log_output: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
            Self::Off => LevelFilter::Off,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "off" => Ok(Self::Off),
            _ => Err(Error::invalid_input(format!(
                "Invalid value for --log-level: {value} (expected error|warn|info|debug|trace|off)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            _ => Err(Error::invalid_input(format!(
                "Invalid value for --log-format: {value} (expected compact|pretty)"
            ))),
        }
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.to_string(),
            output: String::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            time_limit: 0.0,
            node_limit: 0,
            mip_gap: 0.0,
            jobs: 1,
            write_lp: String::new(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Compact,
            log_timestamp: true,
            log_output: String::new(),
        }
    }
}

impl SolverOptions {
    pub fn from_args() -> Result<Self> {
        Self::parse_from_iter(env::args().skip(1))
    }

    pub fn parse_from_iter<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter().map(|arg| arg.as_ref().to_owned());

        while let Some(arg) = args.next() {
            if arg == "--help" || arg == "-h" {
                return Err(Error::invalid_input(Self::usage()));
            }

            let Some(raw_name) = arg.strip_prefix("--") else {
                return Err(Error::invalid_input(format!(
                    "Unexpected argument: {arg}\n\n{}",
                    Self::usage()
                )));
            };

            if raw_name.is_empty() {
                return Err(Error::invalid_input(format!(
                    "Invalid option name: {arg}\n\n{}",
                    Self::usage()
                )));
            }

            let (name, inline_value) = match raw_name.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (raw_name.to_string(), None),
            };

            match name.as_str() {
                "log-timestamp" => {
                    options.log_timestamp = match inline_value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                    continue;
                }
                "no-log-timestamp" => {
                    reject_value(&name, inline_value.as_deref())?;
                    options.log_timestamp = false;
                    continue;
                }
                _ => {}
            }

            let value = match inline_value {
                Some(value) => value,
                None => args
                    .next()
                    .ok_or_else(|| Error::invalid_input(format!("Missing value for --{name}")))?,
            };

            match name.as_str() {
                "input" => options.input = value,
                "output" => options.output = value,
                "extension" => options.extension = value.trim_start_matches('.').to_string(),
                "time-limit" => options.time_limit = parse_number(&name, &value)?,
                "node-limit" => options.node_limit = parse_number(&name, &value)?,
                "mip-gap" => options.mip_gap = parse_number(&name, &value)?,
                "jobs" => options.jobs = parse_number(&name, &value)?,
                "write-lp" => options.write_lp = value,
                "log-level" => options.log_level = LogLevel::parse(&value)?,
                "log-format" => options.log_format = LogFormat::parse(&value)?,
                "log-output" => options.log_output = value,
                _ => {
                    return Err(Error::invalid_input(format!(
                        "Unknown option: --{name}\n\n{}",
                        Self::usage()
                    )));
                }
            }
        }

        options.validate()?;
        Ok(options)
    }

    pub fn usage() -> &'static str {
        concat!(
            "Usage:\n",
            "  tsp-exact [options] [--input <dir|file.tsp>]\n\n",
            "Options:\n",
            "  --input <path>        instance file or directory (default 10_instancias)\n",
            "  --output <path>       CSV file (default <dir>/mejores_soluciones.csv)\n",
            "  --extension <ext>     instance file extension (default tsp)\n",
            "  --time-limit <secs>   per-instance time budget, 0 = unlimited\n",
            "  --node-limit <usize>  per-instance node budget, 0 = unlimited\n",
            "  --mip-gap <f64>       relative optimality gap (default 0)\n",
            "  --jobs <usize>        instances solved concurrently (default 1)\n",
            "  --write-lp <dir>      write each MTZ model as <name>.lp\n",
            "  --log-level <error|warn|info|debug|trace|off>\n",
            "  --log-format <compact|pretty>\n",
            "  --log-timestamp[=<bool>]\n",
            "  --no-log-timestamp\n",
            "  --log-output <path>\n",
            "  --help\n",
            "\n",
            "Examples:\n",
            "  tsp-exact --input 10_instancias\n",
            "  tsp-exact --input berlin8.tsp --log-level=debug\n",
            "  tsp-exact --input instances --jobs 4 --time-limit 60 --output best.csv\n",
        )
    }

    pub fn input_path(&self) -> &Path {
        Path::new(self.input.trim())
    }

    /// CSV path; defaults to `mejores_soluciones.csv` next to the instances.
    pub fn output_path(&self) -> PathBuf {
        let output = self.output.trim();
        if !output.is_empty() {
            return PathBuf::from(output);
        }

        let input = self.input_path();
        let dir = if input.is_dir() {
            input
        } else {
            input.parent().unwrap_or(Path::new("."))
        };
        dir.join(DEFAULT_OUTPUT_FILE)
    }

    pub fn log_output_path(&self) -> Option<&Path> {
        non_empty_path(&self.log_output)
    }

    pub fn write_lp_dir(&self) -> Option<&Path> {
        non_empty_path(&self.write_lp)
    }

    pub fn solve_limits(&self) -> SolveLimits {
        let mut limits = SolveLimits::unlimited().with_relative_gap(self.mip_gap);
        if self.time_limit > 0.0 {
            limits = limits.with_time_limit(Duration::from_secs_f64(self.time_limit));
        }
        if self.node_limit > 0 {
            limits = limits.with_node_limit(self.node_limit);
        }
        limits
    }

    fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(Error::invalid_input("--input must not be empty"));
        }
        if !self.time_limit.is_finite() || self.time_limit < 0.0 {
            return Err(Error::invalid_input("--time-limit must be >= 0"));
        }
        if !self.mip_gap.is_finite() || self.mip_gap < 0.0 {
            return Err(Error::invalid_input("--mip-gap must be >= 0"));
        }
        if self.jobs == 0 {
            return Err(Error::invalid_input("--jobs must be >= 1"));
        }
        Ok(())
    }
}

fn non_empty_path(value: &str) -> Option<&Path> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(Path::new(value))
    }
}

fn reject_value(name: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(_) => Err(Error::invalid_input(format!(
            "Flag --{name} does not take a value"
        ))),
        None => Ok(()),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_input(format!("Invalid value for --{name}: {value} ({e})")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "on" | "ON" => Ok(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" | "off" | "OFF" => Ok(false),
        _ => Err(Error::invalid_input(format!(
            "Invalid boolean for --{name}: {value} (expected true/false)"
        ))),
    }
}
