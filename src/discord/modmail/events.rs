// Routes gateway messages into the relay.
//
// DMs go to the user side of the relay. Guild messages are only looked at
// when they land in a thread that currently carries a session.

use super::serenity_platform::{is_thread, SerenityModmail};
use crate::core::modmail::{DirectMessage, RelayOutcome, ThreadMessage};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    // Ignore bot messages (including our own relays)
    if message.author.bot {
        return Ok(());
    }

    let outcome = match message.guild_id {
        None => {
            let platform = SerenityModmail::new(ctx, None);
            data.modmail
                .handle_direct_message(&platform, direct_message(message))
                .await?
        }
        Some(guild_id) => {
            if !data.modmail.is_session_thread(message.channel_id.get()) {
                return Ok(());
            }

            let parent_id = thread_parent(ctx, message.channel_id).await?;
            let platform = SerenityModmail::new(ctx, Some(guild_id));
            data.modmail
                .handle_thread_message(
                    &platform,
                    ThreadMessage {
                        thread_id: message.channel_id.get(),
                        parent_id,
                        author_id: message.author.id.get(),
                        content: message.content.clone(),
                    },
                )
                .await?
        }
    };

    match outcome {
        RelayOutcome::Opened { thread } => {
            tracing::info!(user_id = %message.author.id, %thread, "Opened mod mail session");
        }
        RelayOutcome::Dropped => {
            tracing::debug!(user_id = %message.author.id, "Dropped DM from blocked user");
        }
        _ => {}
    }

    Ok(())
}

fn direct_message(message: &serenity::Message) -> DirectMessage {
    DirectMessage {
        user_id: message.author.id.get(),
        username: message.author.name.clone(),
        user_tag: message.author.tag(),
        content: message.content.clone(),
        attachment_urls: message.attachments.iter().map(|a| a.url.clone()).collect(),
    }
}

/// Parent channel of a thread; `None` for anything that isn't a thread.
async fn thread_parent(
    ctx: &serenity::Context,
    channel_id: serenity::ChannelId,
) -> Result<Option<u64>, Error> {
    let channel = channel_id.to_channel(ctx).await?;

    Ok(channel
        .guild()
        .filter(is_thread)
        .and_then(|c| c.parent_id)
        .map(|id| id.get()))
}
