use clap::Parser;
use log::{error, info, warn};
use magpie::config::Config;
use magpie::pipeline::Pipeline;
use std::path::PathBuf;

/// Command-line arguments for the Magpie collection agent
#[derive(Parser)]
#[command(
    name = "magpie",
    about = "Magpie - cross-platform forensic log collector",
    long_about = "A log/event collection agent that reads events from heterogeneous \
                  system sources (event logs, syslog, the system journal, tailed files, \
                  periodic command output, registry values), normalizes them into a \
                  single event shape, and forwards them to configurable output sinks."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        help = "Configuration file path (YAML format)"
    )]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    // Load configuration; any failure here is fatal before any resource opens
    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let config_path = cli.config.display().to_string();
    let pipeline = match Pipeline::from_config(&config, &config_path) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Magpie starting... {} collectors, {} sinks",
        pipeline.collector_count(),
        pipeline.sink_count()
    );

    // Interrupt/terminate signals trigger the shared cancellation flag;
    // collectors observe it at their suspension points. Where interception
    // is unsupported, an uncaught interrupt still terminates the process.
    let shutdown = pipeline.shutdown_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping Magpie...");
        shutdown.trigger();
    }) {
        warn!("Could not install signal handler: {}", e);
    }

    if let Err(e) = pipeline.run() {
        error!("Pipeline failed to start: {}", e);
        std::process::exit(1);
    }

    info!("Magpie stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::parse_from(["magpie"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_custom_config_path() {
        let cli = Cli::parse_from(["magpie", "-c", "/etc/magpie/agent.yaml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/magpie/agent.yaml"));
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["magpie", "--verbose"]);
        assert!(cli.verbose);
    }
}
