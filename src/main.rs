//! cofsync CLI entry point.

use clap::Parser;

use cofsync::cli::{Cli, Commands};
use cofsync::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.load_config();

    let mut log_config = config
        .as_ref()
        .map(|c| LogConfig::from(&c.logging))
        .unwrap_or_default();
    log_config.enable_stdout = cli.verbose;
    let _logger = if log_config.enable_stdout || log_config.log_dir.is_some() {
        match LoggerImpl::init(&log_config) {
            Ok(logger) => Some(logger),
            Err(err) => {
                eprintln!("Warning: logging disabled: {err:#}");
                None
            }
        }
    } else {
        None
    };

    let result = match cli.command {
        Commands::Config(ref args) => cofsync::cli::commands::config::execute(args, config, cli.json),
        Commands::Simulate(args) => match config {
            Ok(config) => cofsync::cli::commands::simulate::execute(args, config, cli.json).await,
            Err(err) => Err(err),
        },
    };

    if let Err(err) = result {
        cofsync::cli::handle_error(&err, cli.json);
    }
}
