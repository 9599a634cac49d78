// src/discord/gateway.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serenity::all::{
    Cache, ChannelId, ChannelType, CreateChannel, CreateMessage, GuildChannel, GuildId, Http,
    Permissions, UserId,
};
use log::warn;
use thiserror::Error;
use crate::discord::embeds::EmbedSpec;
use crate::storage::models::{Channel, NO_CATEGORY};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Discord bot is not connected")]
    NotConnected,

    #[error("No guild available")]
    NoGuild,

    #[error("Discord API error: {0}")]
    Discord(#[from] Box<serenity::Error>),

    #[error("{0}")]
    Rejected(String),
}

impl From<serenity::Error> for PlatformError {
    fn from(err: serenity::Error) -> Self {
        PlatformError::Discord(Box::new(err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Other,
}

/// What the dispatcher needs to know about a target channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTarget {
    pub id: String,
    pub name: String,
    pub guild_name: String,
    pub kind: ChannelKind,
    /// Bot holds both SEND_MESSAGES and EMBED_LINKS in the channel.
    pub can_announce: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub position: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub name: String,
    pub category_id: Option<String>,
    pub voice: bool,
}

/// The slice of the chat platform the bot and the panel depend on.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    fn is_ready(&self) -> bool;
    fn bot_tag(&self) -> Option<String>;
    fn bot_avatar_url(&self) -> Option<String>;
    fn guild_count(&self) -> usize;
    /// Every guild text channel currently known to the gateway cache.
    fn text_channels(&self) -> Vec<Channel>;
    fn roles(&self) -> Result<Vec<RoleSummary>, PlatformError>;
    fn categories(&self) -> Result<Vec<CategorySummary>, PlatformError>;
    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelTarget>, PlatformError>;
    async fn send_embed(&self, channel_id: &str, embed: EmbedSpec) -> Result<(), PlatformError>;
    async fn create_channel(&self, request: NewChannel) -> Result<String, PlatformError>;
}

/// Live handles captured once the gateway reports ready.
#[derive(Clone)]
pub struct DiscordSession {
    pub cache: Arc<Cache>,
    pub http: Arc<Http>,
    pub bot_id: UserId,
    pub bot_tag: String,
    pub avatar_url: String,
}

/// [`ChatPlatform`] backed by serenity's cache and HTTP client.
#[derive(Default)]
pub struct SerenityPlatform {
    session: RwLock<Option<DiscordSession>>,
    connected: AtomicBool,
    preferred_guild: Option<GuildId>,
}

impl SerenityPlatform {
    pub fn new(preferred_guild: Option<GuildId>) -> Self {
        Self {
            session: RwLock::new(None),
            connected: AtomicBool::new(false),
            preferred_guild,
        }
    }

    pub fn attach(&self, session: DiscordSession) {
        *self.session.write() = Some(session);
        self.set_connected(true);
    }

    pub fn detach(&self) {
        self.set_connected(false);
        *self.session.write() = None;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn session(&self) -> Result<DiscordSession, PlatformError> {
        self.session.read().clone().ok_or(PlatformError::NotConnected)
    }

    /// The configured guild, else the lowest-id guild in the cache.
    fn target_guild(&self, session: &DiscordSession) -> Result<GuildId, PlatformError> {
        let guilds = session.cache.guilds();
        if let Some(id) = self.preferred_guild.filter(|id| !guilds.contains(id)) {
            warn!("GUILD_ID {} is not in the cache; using the lowest-id guild instead", id);
        }
        pick_guild(self.preferred_guild, &guilds).ok_or(PlatformError::NoGuild)
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.session.read().is_some()
    }

    fn bot_tag(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.bot_tag.clone())
    }

    fn bot_avatar_url(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.avatar_url.clone())
    }

    fn guild_count(&self) -> usize {
        self.session.read().as_ref().map(|s| s.cache.guild_count()).unwrap_or(0)
    }

    fn text_channels(&self) -> Vec<Channel> {
        let Ok(session) = self.session() else {
            return Vec::new();
        };

        let mut collected: Vec<(u16, Channel)> = Vec::new();
        for guild_id in session.cache.guilds() {
            let Some(guild) = session.cache.guild(guild_id) else {
                continue;
            };
            for channel in guild.channels.values().filter(|c| c.kind == ChannelType::Text) {
                let category = channel
                    .parent_id
                    .and_then(|parent| guild.channels.get(&parent))
                    .map(|parent| parent.name.clone())
                    .unwrap_or_else(|| NO_CATEGORY.to_string());
                collected.push((
                    channel.position,
                    Channel {
                        id: channel.id.to_string(),
                        name: channel.name.clone(),
                        guild: guild.name.clone(),
                        guild_id: guild.id.to_string(),
                        category,
                    },
                ));
            }
        }

        collected.sort_by(|(pa, a), (pb, b)| (&a.guild, pa, &a.name).cmp(&(&b.guild, pb, &b.name)));
        collected.into_iter().map(|(_, channel)| channel).collect()
    }

    fn roles(&self) -> Result<Vec<RoleSummary>, PlatformError> {
        let session = self.session()?;
        let guild_id = self.target_guild(&session)?;
        let guild = session.cache.guild(guild_id).ok_or(PlatformError::NoGuild)?;

        let mut roles: Vec<_> = guild
            .roles
            .values()
            .filter(|role| role.id.get() != guild_id.get() && role.name != "@everyone")
            .map(|role| RoleSummary {
                id: role.id.to_string(),
                name: role.name.clone(),
                color: role.colour.0,
                hoist: role.hoist,
            })
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    fn categories(&self) -> Result<Vec<CategorySummary>, PlatformError> {
        let session = self.session()?;
        let guild_id = self.target_guild(&session)?;
        let guild = session.cache.guild(guild_id).ok_or(PlatformError::NoGuild)?;

        let mut categories: Vec<_> = guild
            .channels
            .values()
            .filter(|c| c.kind == ChannelType::Category)
            .map(|c| CategorySummary {
                id: c.id.to_string(),
                name: c.name.clone(),
                position: c.position,
            })
            .collect();
        categories.sort_by_key(|c| c.position);
        Ok(categories)
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelTarget>, PlatformError> {
        let session = self.session()?;
        let Some(channel_id) = parse_channel_id(channel_id) else {
            return Ok(None);
        };

        // Cache guards are not Send; copy out what we need before awaiting.
        let Some(channel) = session.cache.channel(channel_id).map(|c| GuildChannel::clone(&c)) else {
            return Ok(None);
        };
        let (guild_name, cached_member) = match session.cache.guild(channel.guild_id) {
            Some(guild) => (guild.name.clone(), guild.members.get(&session.bot_id).cloned()),
            None => return Ok(None),
        };

        let mut target = ChannelTarget {
            id: channel.id.to_string(),
            name: channel.name.clone(),
            guild_name,
            kind: if channel.kind == ChannelType::Text { ChannelKind::Text } else { ChannelKind::Other },
            can_announce: false,
        };
        if target.kind != ChannelKind::Text {
            return Ok(Some(target));
        }

        let member = match cached_member {
            Some(member) => member,
            None => channel.guild_id.member(&*session.http, session.bot_id).await?,
        };
        let permissions = session
            .cache
            .guild(channel.guild_id)
            .map(|guild| guild.user_permissions_in(&channel, &member))
            .unwrap_or_else(Permissions::empty);

        target.can_announce = permissions.contains(Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS);
        Ok(Some(target))
    }

    async fn send_embed(&self, channel_id: &str, embed: EmbedSpec) -> Result<(), PlatformError> {
        let session = self.session()?;
        let channel_id = parse_channel_id(channel_id)
            .ok_or_else(|| PlatformError::Rejected(format!("invalid channel id '{}'", channel_id)))?;

        channel_id
            .send_message(&*session.http, CreateMessage::new().embed(embed.into_create_embed()))
            .await?;
        Ok(())
    }

    async fn create_channel(&self, request: NewChannel) -> Result<String, PlatformError> {
        let session = self.session()?;
        let guild_id = self.target_guild(&session)?;

        let kind = if request.voice { ChannelType::Voice } else { ChannelType::Text };
        let mut builder = CreateChannel::new(request.name).kind(kind);
        if let Some(category) = request.category_id.as_deref().and_then(parse_channel_id) {
            builder = builder.category(category);
        }

        let channel = guild_id.create_channel(&*session.http, builder).await?;
        Ok(channel.id.to_string())
    }
}

fn pick_guild(preferred: Option<GuildId>, guilds: &[GuildId]) -> Option<GuildId> {
    match preferred {
        Some(id) if guilds.contains(&id) => Some(id),
        _ => guilds.iter().min().copied(),
    }
}

pub fn parse_channel_id(raw: &str) -> Option<ChannelId> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Some(ChannelId::new(id)),
        _ => None,
    }
}
