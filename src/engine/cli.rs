//! CLI command handler: resolve layered config, wire observers and Ctrl+C, run the scan.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::arg_parser::Cli;
use crate::engine::progress::ProgressObserver;
use crate::engine::tools::{resolve_root, running_as_root};
use crate::pipeline::{LogObserver, ObserverSet};
use crate::utils::{
    apply_file_to_config, broker_password_from_env, load_config_file, load_default_config,
    setup_logging,
};
use crate::{ProducerConfig, ScanStatistics};

/// Overwrite config field from a CLI flag when given.
macro_rules! apply_cli_opt {
    ($cli:expr, $field:ident => $($target:ident).+ on $config:expr) => {
        if let Some(v) = $cli.$field.clone() {
            $config.$($target).+ = v;
        }
    };
}

fn apply_cli_to_config(cli: &Cli, config: &mut ProducerConfig) {
    apply_cli_opt!(cli, rabbitmq_host => broker.host on config);
    apply_cli_opt!(cli, rabbitmq_port => broker.port on config);
    apply_cli_opt!(cli, rabbitmq_user => broker.username on config);
    apply_cli_opt!(cli, rabbitmq_password => broker.password on config);
    apply_cli_opt!(cli, queue_name => broker.queue on config);
    apply_cli_opt!(cli, max_retries => broker.retry.max_attempts on config);
    apply_cli_opt!(cli, calculate_hash => scan.with_hash on config);
    if !cli.input_dirs.is_empty() {
        config.scan.roots = cli.input_dirs.clone();
    }
    if cli.extensions.is_some() {
        config.scan.extensions = cli.extensions.clone();
    }
}

/// Defaults ← config file ← environment ← flags. Roots are made absolute against `cwd`.
pub fn resolve_config(cli: &Cli, cwd: &Path) -> Result<ProducerConfig> {
    let mut config = ProducerConfig::default();
    let file = match &cli.config {
        Some(path) => Some(load_config_file(&cwd.join(path))?),
        None => load_default_config(cwd),
    };
    if let Some(file) = &file {
        apply_file_to_config(file, &mut config);
    }
    if let Some(password) = broker_password_from_env(cwd) {
        config.broker.password = password;
    }
    apply_cli_to_config(cli, &mut config);

    if config.scan.roots.is_empty() {
        bail!("no input directories: pass --input-dirs or set scan.input_dirs in the config file");
    }
    if config.broker.retry.max_attempts == 0 {
        bail!("max_retries must be at least 1");
    }
    if config.broker.queue.trim().is_empty() {
        bail!("queue name must not be empty");
    }
    config.scan.roots = config
        .scan
        .roots
        .iter()
        .map(|root| resolve_root(&cwd.join(root)))
        .collect::<Result<_>>()?;
    Ok(config)
}

/// Run one scan over every configured root. Errors only when the broker is unreachable at start
/// or the configuration is invalid; per-file problems are reported in the returned counters.
pub fn handle_run(cli: &Cli) -> Result<ScanStatistics> {
    setup_logging(cli.verbose.unwrap_or(false));
    let cwd = std::env::current_dir().context("read current directory")?;
    let config = resolve_config(cli, &cwd)?;
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        config
    );
    if running_as_root() {
        info!("Running as root: permission-denied subtrees will not be observed.");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let mut observers = ObserverSet::new().with(Arc::new(LogObserver));
    if cli.progress.unwrap_or(false) {
        observers = observers.with(Arc::new(ProgressObserver::new()));
    }

    for root in &config.scan.roots {
        info!("Starting scan of: {}", root.display());
    }
    crate::scan_to_broker(&config, Some(stop), Arc::new(observers))
}
