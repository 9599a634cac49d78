// src/discord/commands/ping.rs
use serenity::model::prelude::*;
use serenity::prelude::*;

pub const TRIGGER: &str = "!ping";

pub async fn run(ctx: &Context, msg: &Message) -> Result<(), serenity::Error> {
    msg.reply(&ctx.http, "🏓 Pong! Bot is running!").await?;
    Ok(())
}
