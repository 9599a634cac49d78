use std::path::{Path, PathBuf};
use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use crate::storage::models::{
    Announcement, AnnouncementPage, BotData, Channel, NewAnnouncement, Pagination, Stats, Template,
    ValidTemplate, HISTORY_LIMIT,
};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode bot data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("A template with this name already exists")]
    DuplicateTemplate,

    #[error("Template not found")]
    TemplateNotFound,
}

/// JSON-file backed store for announcements, channels, templates and stats.
///
/// Every read-modify-write runs under the document write lock. Writes to disk
/// go through a temp file and a rename, serialized by `file_lock`.
pub struct StorageClient {
    path: PathBuf,
    data: RwLock<BotData>,
    file_lock: Mutex<()>,
}

impl StorageClient {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<BotData>(&raw) {
                Ok(data) => {
                    info!(
                        "Loaded bot data from {:?} ({} announcements, {} templates)",
                        path,
                        data.announcements.len(),
                        data.templates.len()
                    );
                    data
                }
                Err(e) => {
                    let quarantine = quarantine_path(&path);
                    error!("Bot data at {:?} is unreadable ({}); moving it to {:?}", path, e, quarantine);
                    tokio::fs::rename(&path, &quarantine)
                        .await
                        .map_err(|source| StoreError::Io { path: path.clone(), source })?;
                    BotData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No bot data at {:?}, creating a new file", path);
                BotData::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let store = Self {
            path,
            data: RwLock::new(data),
            file_lock: Mutex::new(()),
        };
        store.flush().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole document to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let data = self.data.read().await;
        self.persist(&data).await
    }

    pub async fn snapshot(&self) -> BotData {
        self.data.read().await.clone()
    }

    pub async fn stats(&self) -> Stats {
        self.data.read().await.stats.clone()
    }

    pub async fn channels(&self) -> Vec<Channel> {
        self.data.read().await.channels.clone()
    }

    pub async fn channel_count(&self) -> usize {
        self.data.read().await.channels.len()
    }

    pub async fn templates(&self) -> Vec<Template> {
        self.data.read().await.templates.clone()
    }

    pub async fn template_count(&self) -> usize {
        self.data.read().await.templates.len()
    }

    /// A newest-first page of the history. Zero `page`/`limit` fall back to
    /// the defaults and `limit` is capped at the history size.
    pub async fn announcements_page(&self, page: usize, limit: usize) -> AnnouncementPage {
        let page = page.max(1);
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit.min(HISTORY_LIMIT) };

        let data = self.data.read().await;
        let total = data.announcements.len();
        let announcements = data
            .announcements
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();

        AnnouncementPage {
            announcements,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            },
        }
    }

    /// Record a delivered announcement. The message is already out, so the
    /// in-memory history is updated even when the disk write fails.
    pub async fn record_announcement(&self, new: NewAnnouncement) -> Announcement {
        let mut data = self.data.write().await;
        let announcement = Announcement {
            id: next_id(data.announcements.iter().map(|a| a.id)),
            channel_id: new.channel_id,
            channel_name: new.channel_name,
            guild_name: new.guild_name,
            content: new.content,
            author_id: new.author_id,
            author_tag: new.author_tag,
            timestamp: Utc::now(),
        };
        data.push_announcement(announcement.clone());

        if let Err(e) = self.persist(&data).await {
            error!("Failed to save announcement {}: {}", announcement.id, e);
        }
        announcement
    }

    /// Replace the channel directory wholesale.
    pub async fn replace_channels(&self, channels: Vec<Channel>) -> usize {
        let mut data = self.data.write().await;
        data.channels = channels;
        let count = data.channels.len();

        if let Err(e) = self.persist(&data).await {
            error!("Failed to save channel list: {}", e);
        }
        count
    }

    pub async fn create_template(&self, draft: ValidTemplate) -> Result<Template, StoreError> {
        self.transact(|data| {
            if data.find_template_by_name(&draft.name, None).is_some() {
                return Err(StoreError::DuplicateTemplate);
            }
            let template = Template {
                id: next_id(data.templates.iter().map(|t| t.id)),
                name: draft.name,
                content: draft.content,
                category: draft.category,
                created_at: Utc::now(),
                updated_at: None,
                usage_count: 0,
            };
            data.templates.push(template.clone());
            Ok(template)
        })
        .await
    }

    pub async fn update_template(&self, id: i64, draft: ValidTemplate) -> Result<Template, StoreError> {
        self.transact(|data| {
            if data.find_template_by_name(&draft.name, Some(id)).is_some() {
                return Err(StoreError::DuplicateTemplate);
            }
            let template = data
                .templates
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(StoreError::TemplateNotFound)?;
            template.name = draft.name;
            template.content = draft.content;
            template.category = draft.category;
            template.updated_at = Some(Utc::now());
            Ok(template.clone())
        })
        .await
    }

    pub async fn delete_template(&self, id: i64) -> Result<Template, StoreError> {
        self.transact(|data| {
            let index = data
                .templates
                .iter()
                .position(|t| t.id == id)
                .ok_or(StoreError::TemplateNotFound)?;
            Ok(data.templates.remove(index))
        })
        .await
    }

    /// Apply `f` to a copy of the document, persist it, then commit.
    /// Nothing changes in memory if `f` or the write fails.
    async fn transact<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut BotData) -> Result<T, StoreError>,
    {
        let mut data = self.data.write().await;
        let mut draft = data.clone();
        let result = f(&mut draft)?;
        self.persist(&draft).await?;
        *data = draft;
        Ok(result)
    }

    async fn persist(&self, data: &BotData) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data)?;
        let _guard = self.file_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }

        let tmp_path = tmp_path(&self.path);
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|source| StoreError::Io { path: tmp_path.clone(), source })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        Ok(())
    }
}

/// Millisecond timestamp, bumped past `existing` so ids never collide.
fn next_id(existing: impl Iterator<Item = i64>) -> i64 {
    let now = Utc::now().timestamp_millis();
    match existing.max() {
        Some(max) if max >= now => max + 1,
        _ => now,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".corrupt-{}", Utc::now().timestamp()));
    path.with_file_name(name)
}
