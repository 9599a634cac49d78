//! In-memory [`ChatPlatform`] used by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use crate::discord::embeds::EmbedSpec;
use crate::discord::gateway::{
    CategorySummary, ChannelKind, ChannelTarget, ChatPlatform, NewChannel, PlatformError, RoleSummary,
};
use crate::storage::models::Channel;

#[derive(Default)]
pub struct FakePlatform {
    pub ready: AtomicBool,
    pub channels: Mutex<Vec<(Channel, ChannelKind, bool)>>,
    pub sent: Mutex<Vec<(String, EmbedSpec)>>,
    pub created: Mutex<Vec<NewChannel>>,
    pub fail_sends: AtomicBool,
}

impl FakePlatform {
    pub fn online() -> Self {
        let platform = Self::default();
        platform.ready.store(true, Ordering::SeqCst);
        platform
    }

    pub fn with_channel(self, id: &str, name: &str, kind: ChannelKind, can_announce: bool) -> Self {
        self.channels.lock().push((
            Channel {
                id: id.to_string(),
                name: name.to_string(),
                guild: "Test Guild".to_string(),
                guild_id: "1".to_string(),
                category: "No category".to_string(),
            },
            kind,
            can_announce,
        ));
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn bot_tag(&self) -> Option<String> {
        self.is_ready().then(|| "Announcer#0001".to_string())
    }

    fn bot_avatar_url(&self) -> Option<String> {
        None
    }

    fn guild_count(&self) -> usize {
        usize::from(self.is_ready())
    }

    fn text_channels(&self) -> Vec<Channel> {
        self.channels
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == ChannelKind::Text)
            .map(|(channel, _, _)| channel.clone())
            .collect()
    }

    fn roles(&self) -> Result<Vec<RoleSummary>, PlatformError> {
        if !self.is_ready() {
            return Err(PlatformError::NoGuild);
        }
        Ok(vec![RoleSummary {
            id: "10".into(),
            name: "Moderator".into(),
            color: 0x00FF00,
            hoist: true,
        }])
    }

    fn categories(&self) -> Result<Vec<CategorySummary>, PlatformError> {
        if !self.is_ready() {
            return Err(PlatformError::NoGuild);
        }
        Ok(vec![CategorySummary {
            id: "20".into(),
            name: "Info".into(),
            position: 0,
        }])
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelTarget>, PlatformError> {
        if !self.is_ready() {
            return Err(PlatformError::NotConnected);
        }
        Ok(self
            .channels
            .lock()
            .iter()
            .find(|(channel, _, _)| channel.id == channel_id)
            .map(|(channel, kind, can_announce)| ChannelTarget {
                id: channel.id.clone(),
                name: channel.name.clone(),
                guild_name: channel.guild.clone(),
                kind: *kind,
                can_announce: *can_announce,
            }))
    }

    async fn send_embed(&self, channel_id: &str, embed: EmbedSpec) -> Result<(), PlatformError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected("Missing Access".into()));
        }
        self.sent.lock().push((channel_id.to_string(), embed));
        Ok(())
    }

    async fn create_channel(&self, request: NewChannel) -> Result<String, PlatformError> {
        if !self.is_ready() {
            return Err(PlatformError::NotConnected);
        }
        let mut created = self.created.lock();
        created.push(request);
        Ok(format!("{}", 900 + created.len()))
    }
}
