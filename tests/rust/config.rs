// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::mlfq::{
    Config,
    SharedScheduler,
};
use ::std::{
    env,
    fs,
    path::PathBuf,
    process,
    time::Duration,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const CONFIG_YAML: &str = "
mlfq:
  time_slice_millis: 250
  max_threads: 64
";

//======================================================================================================================
// Tests
//======================================================================================================================

/// Loads a configuration file and applies environment overrides on top of it.
///
/// Everything runs in a single test because the environment is shared by all threads of the test binary.
#[test]
fn load_file_with_environment_overrides() -> Result<()> {
    let path: PathBuf = env::temp_dir().join(format!("mlfq-config-{}.yaml", process::id()));
    fs::write(&path, CONFIG_YAML)?;

    let result: Result<()> = check_overrides(&path);

    env::remove_var("TIME_SLICE_MILLIS");
    env::remove_var("MAX_THREADS");
    fs::remove_file(&path)?;
    result
}

fn check_overrides(path: &PathBuf) -> Result<()> {
    // File values.
    let config: Config = Config::from_file(path)?;
    mlfq::ensure_eq!(config.time_slice(), Duration::from_millis(250));
    mlfq::ensure_eq!(config.max_threads(), 64);

    // The scheduler picks up the configured capacity.
    let scheduler: SharedScheduler = SharedScheduler::new(config);
    mlfq::ensure_eq!(scheduler.capacity(), 64);
    mlfq::ensure_eq!(scheduler.get_config().time_slice(), Duration::from_millis(250));

    // Environment overrides the file.
    env::set_var("TIME_SLICE_MILLIS", "40");
    let config: Config = Config::from_file(path)?;
    mlfq::ensure_eq!(config.time_slice(), Duration::from_millis(40));
    mlfq::ensure_eq!(config.max_threads(), 64);

    // Environment values are checked too.
    env::set_var("MAX_THREADS", "many");
    match Config::from_file(path) {
        Ok(config) => anyhow::bail!("from_file() should reject the override (config={:?})", config),
        Err(e) => mlfq::ensure_eq!(e.errno, libc::EINVAL),
    }
    env::set_var("MAX_THREADS", "0");
    match Config::from_file(path) {
        Ok(config) => anyhow::bail!("from_file() should reject a zero capacity (config={:?})", config),
        Err(e) => mlfq::ensure_eq!(e.errno, libc::EINVAL),
    }
    env::remove_var("MAX_THREADS");

    // Missing files are reported as such.
    match Config::from_file(path.with_extension("missing")) {
        Ok(config) => anyhow::bail!("from_file() should fail for a missing file (config={:?})", config),
        Err(e) => mlfq::ensure_eq!(e.errno, libc::ENOENT),
    }
    Ok(())
}
