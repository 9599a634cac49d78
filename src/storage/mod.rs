mod client;
pub mod models;

pub use client::{StorageClient, StoreError, DEFAULT_PAGE_SIZE};
pub use models::{Announcement, BotData, Channel, Stats, Template, TemplateDraft};
