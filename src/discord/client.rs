// src/discord/client.rs

use serenity::gateway::{GatewayError, ShardManager};
use serenity::prelude::*;
use crate::bot_status::BotStatus;
use crate::discord::gateway::SerenityPlatform;
use crate::storage::StorageClient;
use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};
use tokio::sync::Mutex;

use super::events::EventHandler;

/// Intents that need no developer portal switch.
pub const BASE_INTENTS: GatewayIntents = GatewayIntents::GUILDS.union(GatewayIntents::GUILD_MESSAGES);

/// Adds the privileged member and message content intents used by the text commands.
pub const FULL_INTENTS: GatewayIntents = BASE_INTENTS
    .union(GatewayIntents::GUILD_MEMBERS)
    .union(GatewayIntents::MESSAGE_CONTENT);

pub struct DiscordClient {
    token: String,
    client: Mutex<Option<Client>>,
    shard_manager: parking_lot::Mutex<Arc<ShardManager>>,
    platform: Arc<SerenityPlatform>,
    storage: Arc<StorageClient>,
    bot_status: Arc<parking_lot::RwLock<BotStatus>>,
}

impl DiscordClient {
    pub async fn new(
        token: &str,
        platform: Arc<SerenityPlatform>,
        storage: Arc<StorageClient>,
        bot_status: Arc<parking_lot::RwLock<BotStatus>>,
    ) -> Result<Self, serenity::Error> {
        let client = build_client(token, FULL_INTENTS, &platform, &storage, &bot_status).await?;

        Ok(Self {
            token: token.to_string(),
            shard_manager: parking_lot::Mutex::new(client.shard_manager.clone()),
            client: Mutex::new(Some(client)),
            platform,
            storage,
            bot_status,
        })
    }

    /// Run the gateway connection until it ends or is shut down. If Discord
    /// refuses the privileged intents, reconnect once with [`BASE_INTENTS`].
    pub async fn start(&self) -> Result<(), serenity::Error> {
        let client = self.client.lock().await.take();
        let Some(mut client) = client else {
            return Err(serenity::Error::Other("Discord client has already been started"));
        };

        match client.start().await {
            Err(e) if is_disallowed_intents(&e) => {
                log_intents_help();
                warn!("Reconnecting without privileged intents; !ping and !status may not see message text");
                let mut fallback =
                    build_client(&self.token, BASE_INTENTS, &self.platform, &self.storage, &self.bot_status).await?;
                *self.shard_manager.lock() = fallback.shard_manager.clone();
                fallback.start().await
            }
            other => other,
        }
    }

    pub async fn shutdown(&self) {
        info!("Shutting down DiscordClient...");
        self.platform.detach();
        let shard_manager = self.shard_manager.lock().clone();
        match tokio::time::timeout(Duration::from_secs(10), shard_manager.shutdown_all()).await {
            Ok(_) => info!("Discord shards shut down successfully"),
            Err(_) => warn!("Timed out while shutting down Discord shards"),
        }
        info!("DiscordClient shutdown complete.");
    }
}

async fn build_client(
    token: &str,
    intents: GatewayIntents,
    platform: &Arc<SerenityPlatform>,
    storage: &Arc<StorageClient>,
    bot_status: &Arc<parking_lot::RwLock<BotStatus>>,
) -> Result<Client, serenity::Error> {
    Client::builder(token, intents)
        .event_handler(EventHandler::new(platform.clone(), storage.clone(), bot_status.clone()))
        .await
}

pub fn is_disallowed_intents(err: &serenity::Error) -> bool {
    matches!(err, serenity::Error::Gateway(GatewayError::DisallowedGatewayIntents))
}

fn log_intents_help() {
    error!("Discord rejected the requested gateway intents (disallowed intents).");
    error!("To enable them:");
    error!("  1. Open https://discord.com/developers/applications");
    error!("  2. Select the application and open the \"Bot\" tab");
    error!("  3. Under \"Privileged Gateway Intents\" enable Message Content Intent and Server Members Intent");
    error!("  4. Save and restart the bot");
    warn!("The web panel keeps working while the bot is offline.");
}
