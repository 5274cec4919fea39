// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    limits,
};
use ::std::{
    fs,
    ops::Index,
    path::Path,
    str::FromStr,
    time::Duration,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Scheduler options. Each one may be overridden by the environment variable of the same name in upper case.
mod mlfq_config {
    pub const SECTION_NAME: &str = "mlfq";
    // Base quantum in milliseconds.
    pub const TIME_SLICE_MILLIS: &str = "time_slice_millis";
    // Capacity of the identifier pool.
    pub const MAX_THREADS: &str = "max_threads";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Scheduler configuration. Fixed once the scheduler is constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    time_slice: Duration,
    max_threads: usize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Creates a configuration with the given quantum and identifier capacity.
    pub fn new(time_slice: Duration, max_threads: usize) -> Result<Self, Fail> {
        if max_threads == 0 {
            let cause: &str = "identifier capacity must be positive";
            error!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, cause));
        }
        Ok(Self {
            time_slice,
            max_threads,
        })
    }

    /// Creates a configuration with the given quantum and the default identifier capacity.
    pub fn with_quantum(time_slice: Duration) -> Self {
        Self {
            time_slice,
            max_threads: limits::DEFAULT_MAX_THREADS,
        }
    }

    /// Reads a configuration file into a [Config] object.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, Fail> {
        let config_s: String = fs::read_to_string(config_path.as_ref())?;
        Self::from_yaml_str(&config_s)
    }

    /// Parses a YAML document into a [Config] object. Options that are absent keep their default values.
    pub fn from_yaml_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("malformed configuration: {:?}", e);
                error!("from_yaml_str(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        let config_obj: &Yaml = match &config[..] {
            [c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };
        let section_yaml: &Yaml = config_obj.index(mlfq_config::SECTION_NAME);
        let section: Option<&Yaml> = match section_yaml {
            Yaml::BadValue => None,
            Yaml::Hash(_) => Some(section_yaml),
            _ => {
                let cause: String = format!("parameter \"{}\" has unexpected type", mlfq_config::SECTION_NAME);
                error!("from_yaml_str(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };

        let time_slice: Duration = Duration::from_millis(Self::read_option(
            section,
            mlfq_config::TIME_SLICE_MILLIS,
            limits::DEFAULT_TIME_SLICE.as_millis() as u64,
        )?);
        let max_threads: usize = Self::read_option(section, mlfq_config::MAX_THREADS, limits::DEFAULT_MAX_THREADS)?;

        Self::new(time_slice, max_threads)
    }

    /// Base quantum.
    pub fn time_slice(&self) -> Duration {
        self.time_slice
    }

    /// Capacity of the identifier pool.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    //==================================================================================================================
    // Static Functions
    //==================================================================================================================

    /// Reads an integer option. The environment overrides the file, and the file overrides `default`.
    fn read_option<T: FromStr + TryFrom<i64>>(section: Option<&Yaml>, index: &str, default: T) -> Result<T, Fail> {
        if let Some(value) = Self::get_typed_env_option(index)? {
            return Ok(value);
        }
        match section {
            Some(section) => match section.index(index) {
                Yaml::BadValue => Ok(default),
                _ => Self::get_int_option(section, index),
            },
            None => Ok(default),
        }
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Index `yaml` to find the value at `index` as an i64, and verify that the destination type may hold it.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = match yaml.index(index).as_i64() {
            Some(val) => val,
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            },
        };
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Config {
    fn default() -> Self {
        Self {
            time_slice: limits::DEFAULT_TIME_SLICE,
            max_threads: limits::DEFAULT_MAX_THREADS,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
