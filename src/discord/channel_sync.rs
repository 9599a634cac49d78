use log::info;
use crate::discord::gateway::ChatPlatform;
use crate::storage::StorageClient;

/// Rebuild the channel directory from the gateway cache. No diffing: the
/// stored list is replaced wholesale.
pub async fn sync_channels(platform: &dyn ChatPlatform, storage: &StorageClient) -> usize {
    let channels = platform.text_channels();
    let count = storage.replace_channels(channels).await;
    info!("{} text channels collected from {} servers", count, platform.guild_count());
    count
}
