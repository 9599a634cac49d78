// src/discord/mod.rs
mod client;
mod events;
mod commands;
pub mod announcements;
pub mod channel_sync;
pub mod embeds;
pub mod gateway;
#[cfg(test)]
pub(crate) mod fake;

pub use announcements::{AnnouncementDispatcher, Author, DispatchError};
pub use client::DiscordClient;
pub use gateway::{ChatPlatform, PlatformError, SerenityPlatform};
