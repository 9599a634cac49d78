use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HISTORY_LIMIT: usize = 100;
pub const DEFAULT_TEMPLATE_CATEGORY: &str = "General";
pub const NO_CATEGORY: &str = "No category";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: i64,
    pub channel_id: String,
    pub channel_name: String,
    pub guild_name: String,
    pub content: String,
    pub author_id: Option<String>,
    pub author_tag: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub guild: String,
    pub guild_id: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_announcements: u64,
    pub last_activity: DateTime<Utc>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total_announcements: 0,
            last_activity: Utc::now(),
        }
    }
}

/// The whole persisted document. Keys missing on disk fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotData {
    pub announcements: Vec<Announcement>,
    pub channels: Vec<Channel>,
    pub templates: Vec<Template>,
    pub stats: Stats,
}

impl BotData {
    /// Prepend to the history, keeping at most [`HISTORY_LIMIT`] entries.
    pub(crate) fn push_announcement(&mut self, announcement: Announcement) {
        self.stats.total_announcements += 1;
        self.stats.last_activity = announcement.timestamp;
        self.announcements.insert(0, announcement);
        self.announcements.truncate(HISTORY_LIMIT);
    }

    pub(crate) fn find_template_by_name(&self, name: &str, except: Option<i64>) -> Option<&Template> {
        let wanted = name.trim().to_lowercase();
        self.templates
            .iter()
            .filter(|t| Some(t.id) != except)
            .find(|t| t.name.to_lowercase() == wanted)
    }
}

/// Fields an operator supplies when creating or editing a template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateDraft {
    pub name: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

/// A draft that passed validation: trimmed and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTemplate {
    pub name: String,
    pub content: String,
    pub category: String,
}

impl TemplateDraft {
    pub fn validate(&self) -> Option<ValidTemplate> {
        let name = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let content = self.content.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_TEMPLATE_CATEGORY);

        Some(ValidTemplate {
            name: name.to_string(),
            content: content.to_string(),
            category: category.to_string(),
        })
    }
}

/// Input for a history entry; id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub channel_id: String,
    pub channel_name: String,
    pub guild_name: String,
    pub content: String,
    pub author_id: Option<String>,
    pub author_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementPage {
    pub announcements: Vec<Announcement>,
    pub pagination: Pagination,
}

fn default_category() -> String {
    DEFAULT_TEMPLATE_CATEGORY.to_string()
}
