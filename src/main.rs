mod config;
mod io;
mod kernel;
mod workload;

use std::path::PathBuf;

use anyhow::Context;

use config::Config;
use kernel::Driver;
use workload::{RandomWorkload, Workload};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("invalid config file {}", path.display()))?,
        None => Config::default(),
    };

    let driver = Driver::new(config.clone()).context("invalid configuration")?;

    let stop = driver.stop_handle();
    ctrlc::set_handler(move || stop.stop()).context("failed to install the stop handler")?;

    let reports =
        driver.start(|pid| Box::new(RandomWorkload::new(pid, &config)) as Box<dyn Workload>);

    io::print_report(&reports);
    Ok(())
}
