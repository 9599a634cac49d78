// src/discord/commands/status.rs
use serenity::builder::CreateMessage;
use serenity::model::prelude::*;
use serenity::prelude::*;
use crate::discord::embeds::{status_embed, StatusSnapshot};

pub const TRIGGER: &str = "!status";

pub async fn run(ctx: &Context, msg: &Message, snapshot: StatusSnapshot) -> Result<(), serenity::Error> {
    let message = CreateMessage::new()
        .embed(status_embed(&snapshot).into_create_embed())
        .reference_message(msg);
    msg.channel_id.send_message(&ctx.http, message).await?;
    Ok(())
}
