pub mod auth;
pub mod bot_status;
pub mod config;
pub mod discord;
pub mod keep_alive;
pub mod logging;
pub mod storage;
pub mod web_ui;

use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};
use tokio::sync::watch;
use crate::auth::AuthService;
use crate::bot_status::BotStatus;
use crate::config::Config;
use crate::discord::{AnnouncementDispatcher, ChatPlatform, DiscordClient, SerenityPlatform};
use crate::storage::StorageClient;
use crate::web_ui::{ApiState, WebUI, WebUIConfig};

pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Arc::new(config);
    let storage = Arc::new(StorageClient::open(&config.data_file).await?);
    let auth = Arc::new(AuthService::from_config(&config)?);
    let bot_status = BotStatus::new();
    let platform = Arc::new(SerenityPlatform::new(config.guild_id));
    let dispatcher = Arc::new(AnnouncementDispatcher::new(platform.clone(), storage.clone()));

    let discord_client = match &config.discord_token {
        Some(token) => match DiscordClient::new(token, platform.clone(), storage.clone(), bot_status.clone()).await {
            Ok(client) => {
                let client = Arc::new(client);
                let runner = client.clone();
                tokio::spawn(async move {
                    info!("Connecting to Discord...");
                    if let Err(e) = runner.start().await {
                        error!("Discord client error: {}. The web panel keeps running.", e);
                    }
                });
                Some(client)
            }
            Err(e) => {
                error!("Failed to create Discord client: {}. Running the web panel only.", e);
                None
            }
        },
        None => {
            warn!("DISCORD_TOKEN is not set. Running the web panel only.");
            None
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = vec![tokio::spawn(run_periodic_flush(
        storage.clone(),
        FLUSH_INTERVAL,
        shutdown_rx.clone(),
    ))];

    if config.environment.is_production() {
        match keep_alive::health_url(config.keep_alive_host.as_deref()) {
            Some(url) => handles.push(tokio::spawn(keep_alive::run_keep_alive(
                url,
                keep_alive::KEEP_ALIVE_INTERVAL,
                shutdown_rx,
            ))),
            None => warn!("Keep-alive disabled: set KEEP_ALIVE_HOST or RENDER_EXTERNAL_HOSTNAME"),
        }
    }

    let state = ApiState {
        config: config.clone(),
        storage: storage.clone(),
        platform: platform.clone() as Arc<dyn ChatPlatform>,
        dispatcher,
        auth,
        bot_status,
    };
    let web_ui = WebUI::new(state, WebUIConfig::from_config(&config));
    let served = web_ui.run(shutdown_signal()).await;

    info!("Shutting down...");
    if shutdown_tx.send(true).is_err() {
        warn!("Background tasks already stopped");
    }
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    if let Err(e) = storage.flush().await {
        error!("Final save failed: {}", e);
    }
    if let Some(client) = discord_client {
        client.shutdown().await;
    }

    info!("Bot has shut down.");
    served
}

/// Persist the store every `interval` until `shutdown` flips to `true`.
pub async fn run_periodic_flush(storage: Arc<StorageClient>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = storage.flush().await {
                    error!("Periodic save failed: {}", e);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Route panics through the logger so they land next to everything else.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {}", panic_info);
        default_hook(panic_info);
    }));
}
