use serenity::async_trait;
use serenity::gateway::{ActivityData, ConnectionStage, ShardStageUpdateEvent};
use serenity::model::prelude::*;
use serenity::prelude::*;
use crate::bot_status::BotStatus;
use crate::discord::channel_sync::sync_channels;
use crate::discord::commands::{ping, status, TextCommand};
use crate::discord::embeds::StatusSnapshot;
use crate::discord::gateway::{ChatPlatform, DiscordSession, SerenityPlatform};
use crate::storage::StorageClient;
use std::sync::Arc;
use log::{debug, error, info};

pub struct EventHandler {
    platform: Arc<SerenityPlatform>,
    storage: Arc<StorageClient>,
    bot_status: Arc<parking_lot::RwLock<BotStatus>>,
}

impl EventHandler {
    pub fn new(
        platform: Arc<SerenityPlatform>,
        storage: Arc<StorageClient>,
        bot_status: Arc<parking_lot::RwLock<BotStatus>>,
    ) -> Self {
        Self { platform, storage, bot_status }
    }

    async fn resync(&self, reason: &str) {
        debug!("Rebuilding channel list ({})", reason);
        sync_channels(self.platform.as_ref(), &self.storage).await;
    }

    async fn status_snapshot(&self) -> StatusSnapshot {
        let uptime = self.bot_status.read().uptime_string();
        StatusSnapshot {
            online: self.platform.is_ready(),
            channels: self.storage.channel_count().await,
            announcements: self.storage.stats().await.total_announcements,
            guilds: self.platform.guild_count(),
            uptime,
        }
    }
}

#[async_trait]
impl serenity::client::EventHandler for EventHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 Bot connected as {}", ready.user.tag());
        info!("📊 Connected to {} servers", ready.guilds.len());

        self.platform.attach(DiscordSession {
            cache: ctx.cache.clone(),
            http: ctx.http.clone(),
            bot_id: ready.user.id,
            bot_tag: ready.user.tag(),
            avatar_url: ready.user.face(),
        });
        self.bot_status.write().set_online(true);

        ctx.set_activity(Some(ActivityData::watching("announcements 📢")));
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        info!("Gateway cache ready with {} guilds", guilds.len());
        self.resync("cache ready").await;
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            info!("➕ Bot added to server: {}", guild.name);
        }
        self.resync("guild create").await;
    }

    async fn channel_create(&self, _ctx: Context, channel: GuildChannel) {
        if channel.kind == ChannelType::Text {
            info!("📢 New channel created: #{}", channel.name);
            self.resync("channel create").await;
        }
    }

    async fn channel_delete(&self, _ctx: Context, channel: GuildChannel, _messages: Option<Vec<Message>>) {
        if channel.kind == ChannelType::Text {
            info!("🗑️ Channel removed: #{}", channel.name);
            self.resync("channel delete").await;
        }
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        let connected = event.new == ConnectionStage::Connected;
        debug!("Shard {} stage {:?} -> {:?}", event.shard_id, event.old, event.new);
        self.platform.set_connected(connected);
        self.bot_status.write().set_online(connected);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(command) = TextCommand::parse(&msg.content) else {
            return;
        };

        let result = match command {
            TextCommand::Ping => ping::run(&ctx, &msg).await,
            TextCommand::Status => {
                let snapshot = self.status_snapshot().await;
                status::run(&ctx, &msg, snapshot).await
            }
        };

        if let Err(why) = result {
            error!("Cannot respond to {:?} command: {}", command, why);
        }
    }
}
