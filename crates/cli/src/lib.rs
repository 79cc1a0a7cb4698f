//! Sensor Registry Command Line
//!
//! Line-oriented front end: each stdin line is one command such as
//! `addSensor id=s1 sensorTypeId=t1 min=10 max=90` or
//! `findSensorReadings {"sensorId": "s1", "minTimestamp": 100}`.
//! Results are printed as JSON; failures as `{"kind", "message"}` reports.

mod command;

pub use command::{execute, Command, Request};

use data_validator::ValidationConfig;
use registry::{load_config, ErrorKind, ErrorReport, RegistryConfig, RegistryError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Help text for `-h` and the `help` command
pub const USAGE: &str = "\
usage: sensors [--config FILE] [SEED.json ...]

commands (one per line, arguments as name=value pairs or one JSON object):
  addSensorType id=.. manufacturer=.. modelNumber=.. quantity=.. min=.. max=..
  addSensor id=.. sensorTypeId=.. min=.. max=..
  addSensorReading sensorId=.. timestamp=.. value=..
  findSensorTypes [id=..] [manufacturer=..] [modelNumber=..] [quantity=..]
  findSensors [id=..] [sensorTypeId=..]
  findSensorReadings sensorId=.. [minTimestamp=..] [maxTimestamp=..] [minValue=..] [maxValue=..]
  clear
  help
  quit";

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Bad argument: {0}")]
    BadArgument(String),

    #[error("{0}")]
    Usage(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl CliError {
    /// Report printed for a failed command
    pub fn report(&self) -> ErrorReport {
        match self {
            CliError::Registry(err) => err.report(),
            other => ErrorReport {
                kind: ErrorKind::BadVal,
                message: other.to_string(),
                field: None,
            },
        }
    }
}

/// Parsed command-line arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub seeds: Vec<PathBuf>,
    pub help: bool,
}

impl Args {
    /// Parse arguments, excluding the program name
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Args::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "-c" | "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| CliError::Usage(format!("{} requires a file\n{}", arg, USAGE)))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                flag if flag.starts_with('-') => {
                    return Err(CliError::Usage(format!("unknown option {}\n{}", flag, USAGE)));
                }
                _ => parsed.seeds.push(PathBuf::from(arg)),
            }
        }
        Ok(parsed)
    }
}

/// CLI configuration: registry and validation settings plus the log level
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,
    #[serde(flatten)]
    pub registry: RegistryConfig,
    #[serde(flatten)]
    pub validation: ValidationConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            registry: RegistryConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from an optional file overlaid with `SENSORS_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        Ok(load_config(path)?)
    }

    pub fn level(&self) -> Result<Level, CliError> {
        self.log_level
            .parse()
            .map_err(|_| CliError::BadArgument(format!("log level {}", self.log_level)))
    }
}

/// Initialize logging to stderr, keeping stdout for command output
pub fn init_logging(level: Level) -> Result<(), CliError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| CliError::Logging(e.to_string()))
}
