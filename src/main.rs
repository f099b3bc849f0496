mod commands;

use clap::Parser;
use commands::Cli;
use memmer::config::{LoggingSettings, Settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize logging
///
/// `LOG_LEVEL` and `LOG_FORMAT` take precedence over the configuration.
fn init_logging(logging: &LoggingSettings, verbose: bool) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if verbose {
            "debug".to_string()
        } else {
            logging.level.clone()
        }
    });
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_new(format!("memmer={},warn", log_level))
        .unwrap_or_else(|_| EnvFilter::new("memmer=info,warn"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    match log_format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Configuration errors are reported before logging is set up
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&settings.logging, cli.verbose);
    info!("memmer {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = commands::run(cli, settings).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
