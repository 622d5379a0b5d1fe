use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use alert_dialer::{
    config::Config,
    dispatch::{log_reports, CommandDispatcher},
    logging,
    server::Server,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Read settings from this dotenv file instead of `./.env`
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Validate and print the configuration, then exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.env_file {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("invalid configuration")?;

    if args.check_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        println!("Configuration validated.");
        return Ok(());
    }

    logging::init(&config.logging).context("failed to set up logging")?;

    info!(
        target: logging::ACCESS_TARGET,
        "Starting webhook server on {}",
        config.server.addr()
    );
    info!(
        "Server configured to listen on {}, webhook logs in {}",
        config.server.addr(),
        config.logging.webhook_log.display()
    );
    info!("Log full JSON body: {}", config.logging.log_json_body);
    info!(
        "System command configured: {:?} with args order: {:?}",
        config.command.base, config.command.args_order
    );
    info!(
        workers = config.command.workers,
        queue_capacity = config.command.queue_capacity,
        blacklisted = config.blacklist.numbers.len(),
        "Dispatch pool configured"
    );
    for name in config.unknown_argument_names() {
        warn!(
            "Argument '{}' in SYSTEM_COMMAND_ARGS_ORDER is not one of phoneNumbers, message and will be skipped",
            name
        );
    }

    let (dispatcher, reports) = CommandDispatcher::from_config(&config.command);
    tokio::spawn(log_reports(reports));

    let server = Server::new(&config, Arc::new(dispatcher));
    server.start(&config.server.addr()).await?;

    Ok(())
}
