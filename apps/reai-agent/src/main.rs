//! ReEnvision AI tray agent entry point.

mod app;
mod desktop;
mod dialog;
mod instance;
mod logging;
mod paths;

use std::sync::Arc;

use reai_config::{ConfigLoader, FileConfigLoader};

fn main() -> anyhow::Result<()> {
    let paths = match paths::AppPaths::resolve() {
        Ok(paths) => paths,
        Err(e) => fatal(&format!("Failed to prepare the data directory: {e:#}")),
    };
    if let Err(e) = logging::init(&paths.log_file) {
        eprintln!("failed to initialise logging: {e:#}");
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %paths.data_dir.display(),
        "starting ReEnvision AI agent"
    );
    paths::ensure_exe_dir_on_path();

    let Some(_guard) = instance::acquire()? else {
        tracing::info!(name = instance::MUTEX_NAME, "another instance is already running");
        return Ok(());
    };

    // Missing configuration or credentials are fatal; later loads happen
    // on every start attempt.
    let config_path = match reai_config::default_config_path() {
        Ok(path) => path,
        Err(e) => fatal(&format!("Failed to locate the configuration: {e}")),
    };
    let loader = FileConfigLoader::new(config_path);
    match loader.load() {
        Ok(config) => tracing::info!(?config, "configuration loaded"),
        Err(e) => fatal(&format!("Failed to load the configuration: {e}")),
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(paths, Arc::new(loader)))?;

    tracing::info!("ReEnvision AI agent exiting");
    Ok(())
}

fn fatal(message: &str) -> ! {
    dialog::show_fatal(message);
    std::process::exit(1);
}
