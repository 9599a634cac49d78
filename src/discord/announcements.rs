use std::sync::Arc;
use log::{error, info, warn};
use thiserror::Error;
use crate::discord::embeds::announcement_embed;
use crate::discord::gateway::{ChannelKind, ChatPlatform, PlatformError};
use crate::storage::models::{Announcement, NewAnnouncement};
use crate::storage::StorageClient;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Discord bot is not connected")]
    NotConnected,

    #[error("Channel not found")]
    ChannelNotFound,

    #[error("Channel must be a text channel")]
    NotTextChannel,

    #[error("Bot lacks the required permissions in this channel")]
    MissingPermissions,

    #[error("{0}")]
    Platform(#[from] PlatformError),
}

/// Who an announcement is attributed to in the footer and the history.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: Option<String>,
    pub tag: String,
}

impl Author {
    pub fn web_panel() -> Self {
        Self {
            id: Some("web-panel".to_string()),
            tag: "Web Panel".to_string(),
        }
    }
}

pub struct AnnouncementDispatcher {
    platform: Arc<dyn ChatPlatform>,
    storage: Arc<StorageClient>,
}

impl AnnouncementDispatcher {
    pub fn new(platform: Arc<dyn ChatPlatform>, storage: Arc<StorageClient>) -> Self {
        Self { platform, storage }
    }

    /// Validate the target, post the embed, then record it in the history.
    /// History and stats are only touched after a successful send.
    pub async fn send_announcement(
        &self,
        channel_id: &str,
        content: &str,
        author: &Author,
    ) -> Result<Announcement, DispatchError> {
        if !self.platform.is_ready() {
            return Err(DispatchError::NotConnected);
        }

        let target = self
            .platform
            .resolve_channel(channel_id)
            .await?
            .ok_or(DispatchError::ChannelNotFound)?;

        if target.kind != ChannelKind::Text {
            return Err(DispatchError::NotTextChannel);
        }
        if !target.can_announce {
            warn!("Missing send/embed permissions in #{} ({})", target.name, target.guild_name);
            return Err(DispatchError::MissingPermissions);
        }

        let embed = announcement_embed(content, &author.tag, self.platform.bot_avatar_url());
        if let Err(e) = self.platform.send_embed(&target.id, embed).await {
            error!("Failed to send announcement to #{}: {}", target.name, e);
            return Err(e.into());
        }

        let announcement = self
            .storage
            .record_announcement(NewAnnouncement {
                channel_id: target.id,
                channel_name: target.name,
                guild_name: target.guild_name,
                content: content.to_string(),
                author_id: author.id.clone(),
                author_tag: author.tag.clone(),
            })
            .await;

        info!(
            "Announcement sent to #{} ({}) by {}",
            announcement.channel_name, announcement.guild_name, announcement.author_tag
        );
        Ok(announcement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use crate::discord::fake::FakePlatform;

    async fn setup(platform: FakePlatform) -> (tempfile::TempDir, Arc<FakePlatform>, Arc<StorageClient>, AnnouncementDispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(StorageClient::open(dir.path().join("botData.json")).await.unwrap());
        let platform = Arc::new(platform);
        let dispatcher = AnnouncementDispatcher::new(platform.clone(), storage.clone());
        (dir, platform, storage, dispatcher)
    }

    #[tokio::test]
    async fn successful_send_records_history_and_stats() {
        let fake = FakePlatform::online().with_channel("100", "news", ChannelKind::Text, true);
        let (_dir, platform, storage, dispatcher) = setup(fake).await;

        let announcement = dispatcher
            .send_announcement("100", "Hello everyone", &Author::web_panel())
            .await
            .unwrap();

        assert_eq!(announcement.channel_name, "news");
        assert_eq!(announcement.author_tag, "Web Panel");
        assert_eq!(platform.sent_count(), 1);

        let data = storage.snapshot().await;
        assert_eq!(data.announcements.len(), 1);
        assert_eq!(data.stats.total_announcements, 1);

        let (channel, embed) = platform.sent.lock()[0].clone();
        assert_eq!(channel, "100");
        assert_eq!(embed.description.as_deref(), Some("Hello everyone"));
    }

    #[tokio::test]
    async fn unknown_channel_leaves_stats_untouched() {
        let (_dir, platform, storage, dispatcher) = setup(FakePlatform::online()).await;
        let before = storage.stats().await;

        let err = dispatcher
            .send_announcement("999", "Hello", &Author::web_panel())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::ChannelNotFound));
        assert_eq!(platform.sent_count(), 0);
        assert_eq!(storage.stats().await, before);
        assert!(storage.snapshot().await.announcements.is_empty());
    }

    #[tokio::test]
    async fn rejects_non_text_and_unpermitted_channels() {
        let fake = FakePlatform::online()
            .with_channel("1", "voice", ChannelKind::Other, true)
            .with_channel("2", "locked", ChannelKind::Text, false);
        let (_dir, platform, _storage, dispatcher) = setup(fake).await;

        let err = dispatcher.send_announcement("1", "x", &Author::web_panel()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotTextChannel));

        let err = dispatcher.send_announcement("2", "x", &Author::web_panel()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingPermissions));
        assert_eq!(platform.sent_count(), 0);
    }

    #[tokio::test]
    async fn platform_failure_is_not_recorded() {
        let fake = FakePlatform::online().with_channel("1", "news", ChannelKind::Text, true);
        fake.fail_sends.store(true, Ordering::SeqCst);
        let (_dir, _platform, storage, dispatcher) = setup(fake).await;

        let err = dispatcher.send_announcement("1", "x", &Author::web_panel()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Platform(PlatformError::Rejected(_))));
        assert_eq!(storage.stats().await.total_announcements, 0);
    }

    #[tokio::test]
    async fn offline_platform_is_reported() {
        let (_dir, _platform, _storage, dispatcher) = setup(FakePlatform::default()).await;
        let err = dispatcher.send_announcement("1", "x", &Author::web_panel()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotConnected));
    }
}
