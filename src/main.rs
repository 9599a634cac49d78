use std::path::PathBuf;
use clap::Parser;
use colored::Colorize;
use log::{info, warn};
use announcebot::config::{Config, Overrides};
use announcebot::logging::{setup_logging, LogLevel};
use announcebot::{install_panic_hook, run};

#[derive(Parser, Debug)]
#[command(name = "announcebot", version, about = "Discord announcement bot with a web admin panel")]
struct Cli {
    /// Optional TOML config file (environment variables still apply)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where announcements, channels and templates are stored
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Port for the web panel
    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = Config::load(&Overrides {
        config_path: cli.config,
        data_file: cli.data_file,
        port: cli.port,
        log_level: cli.log_level,
    })?;

    setup_logging(config.log_level)?;
    install_panic_hook();

    println!("{}", format!("📢 announcebot v{}", env!("CARGO_PKG_VERSION")).bright_magenta().bold());
    info!("Environment: {}", config.environment);
    info!("Web panel: http://{}:{}", config.host, config.port);
    if config.uses_default_password() {
        warn!("{}", "Using the default admin password. Set ADMIN_PASSWORD before exposing the panel.".yellow());
    }

    run(config).await
}
