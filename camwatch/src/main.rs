//! camwatch - Entry Point
//!
//! Watches V4L2 camera devices and logs connect, disconnect and status events.

use std::collections::HashMap;
use std::env;

use camwatch::app::run::run;
use camwatch::diagnostic::run_diagnostic;
use camwatch::filesys::file::File;
use camwatch::logs::init_logging;
use camwatch::storage::settings::{Settings, DEFAULT_SETTINGS_PATH};
use camwatch::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize version info: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("settings")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let settings = match Settings::load(&File::new(&settings_path)).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file {settings_path}: {e}");
            std::process::exit(2);
        }
    };
    let options = match settings.to_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Invalid settings in {settings_path}: {e}");
            std::process::exit(2);
        }
    };

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        if let Err(e) = run_diagnostic(&options.monitor).await {
            eprintln!("Diagnostic failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    // Initialize logging; the guard flushes file output on exit
    let _log_guard = match init_logging(options.logging.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    info!("Running camwatch {} with options: {:?}", version.version, options.monitor);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the monitor: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Unable to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
