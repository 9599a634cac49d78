use chrono::{DateTime, Utc};
use serenity::all::{CreateEmbed, CreateEmbedFooter, Timestamp};

/// Discord blurple, used for every embed the bot posts.
pub const ANNOUNCEMENT_COLOR: u32 = 0x5865F2;

/// Platform-neutral description of an embed; converted to serenity's
/// builder only at the send boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedSpec {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<(String, String, bool)>,
    pub footer: Option<String>,
    pub footer_icon: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EmbedSpec {
    fn base(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            color: ANNOUNCEMENT_COLOR,
            fields: Vec::new(),
            footer: None,
            footer_icon: None,
            timestamp: Utc::now(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push((name.into(), value.into(), inline));
        self
    }

    pub fn into_create_embed(self) -> CreateEmbed {
        let mut embed = CreateEmbed::new().title(self.title).color(self.color);
        if let Some(description) = self.description {
            embed = embed.description(description);
        }
        for (name, value, inline) in self.fields {
            embed = embed.field(name, value, inline);
        }
        if let Some(text) = self.footer {
            let mut footer = CreateEmbedFooter::new(text);
            if let Some(icon) = self.footer_icon {
                footer = footer.icon_url(icon);
            }
            embed = embed.footer(footer);
        }
        match Timestamp::from_unix_timestamp(self.timestamp.timestamp()) {
            Ok(ts) => embed.timestamp(ts),
            Err(_) => embed.timestamp(Timestamp::now()),
        }
    }
}

pub fn announcement_embed(content: &str, author_tag: &str, bot_avatar: Option<String>) -> EmbedSpec {
    let mut embed = EmbedSpec::base("📢 Announcement");
    embed.description = Some(content.to_string());
    embed.footer = Some(format!("Announcement System • By {}", author_tag));
    embed.footer_icon = bot_avatar;
    embed
}

pub struct StatusSnapshot {
    pub online: bool,
    pub channels: usize,
    pub announcements: u64,
    pub guilds: usize,
    pub uptime: String,
}

pub fn status_embed(status: &StatusSnapshot) -> EmbedSpec {
    EmbedSpec::base("📊 Bot Status")
        .field("🔧 Status", if status.online { "Online" } else { "Offline" }, true)
        .field("📺 Channels", status.channels.to_string(), true)
        .field("📢 Announcements", status.announcements.to_string(), true)
        .field("🏛️ Servers", status.guilds.to_string(), true)
        .field("⏱️ Uptime", status.uptime.clone(), true)
}
