use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_COMPLETION_PROBABILITY: f64 = 0.5;

/// Simulation parameters. Fixed once the driver starts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub process_count: usize,
    pub device_count: usize,
    pub time_slice_ms: u64,
    /// Duration of one workload step, i.e. one program counter increment.
    pub step_ms: u64,
    pub io_request_probability: f64,
    pub device_poll_interval_ms: u64,
    /// Per-device completion probability. Empty means the default for every
    /// device.
    pub completion_probabilities: Vec<f64>,
    pub max_program_counter: u64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_count: 3,
            device_count: 2,
            time_slice_ms: 3000,
            step_ms: 1000,
            io_request_probability: 0.15,
            device_poll_interval_ms: 2000,
            completion_probabilities: Vec::new(),
            max_program_counter: 30,
            seed: None,
        }
    }
}

/// Start-up errors. These are the only fatal errors of the simulation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one process is required")]
    NoProcesses,

    #[error("at least one device is required")]
    NoDevices,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name} must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },

    #[error("expected {expected} completion probabilities, one per device, got {found}")]
    ProbabilityCount { expected: usize, found: usize },

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Reads a TOML config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Config::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_count == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if self.device_count == 0 {
            return Err(ConfigError::NoDevices);
        }
        if self.time_slice_ms == 0 {
            return Err(ConfigError::Zero("time_slice_ms"));
        }
        if self.step_ms == 0 {
            return Err(ConfigError::Zero("step_ms"));
        }
        if self.device_poll_interval_ms == 0 {
            return Err(ConfigError::Zero("device_poll_interval_ms"));
        }
        if self.max_program_counter == 0 {
            return Err(ConfigError::Zero("max_program_counter"));
        }

        check_probability("io_request_probability", self.io_request_probability)?;

        if !self.completion_probabilities.is_empty()
            && self.completion_probabilities.len() != self.device_count
        {
            return Err(ConfigError::ProbabilityCount {
                expected: self.device_count,
                found: self.completion_probabilities.len(),
            });
        }
        for &value in &self.completion_probabilities {
            check_probability("completion_probabilities", value)?;
        }

        Ok(())
    }

    pub fn time_slice(&self) -> Duration {
        Duration::from_millis(self.time_slice_ms)
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn device_poll_interval(&self) -> Duration {
        Duration::from_millis(self.device_poll_interval_ms)
    }

    /// One probability per device.
    pub fn completion_probabilities(&self) -> Vec<f64> {
        if self.completion_probabilities.is_empty() {
            vec![DEFAULT_COMPLETION_PROBABILITY; self.device_count]
        } else {
            self.completion_probabilities.clone()
        }
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}
