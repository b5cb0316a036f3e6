// This is the entry point of the moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite) and the keepalive server
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::moderation::ModerationService;
use crate::core::modmail::RelayService;
use crate::discord::modmail::events as modmail_events;
use crate::discord::{Data, Error};
use crate::infra::keepalive;
use crate::infra::moderation::SqliteModerationStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// Every message goes through the mod-mail relay.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("Logged in as {}", data_about_bot.user.tag());
        }
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = modmail_events::handle_message(ctx, data, new_message).await {
                tracing::error!(
                    channel_id = %new_message.channel_id,
                    user_id = %new_message.author.id,
                    "Error relaying mod mail: {}",
                    e
                );
            }
        }
        _ => {}
    }

    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(command = %ctx.command().name, "Command error: {}", error);

            let embed = serenity::CreateEmbed::new()
                .title("Command Error")
                .description("Something went wrong while running this command.")
                .color(discord::embeds::RED_COLOR);

            let _ = ctx
                .send(poise::CreateReply::default().ephemeral(true).embed(embed))
                .await;
        }
        other => {
            // Permission refusals, bad arguments and the like
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One store backs both services: warnings for moderation, the block
    // list for the relay.

    let store = Arc::new(SqliteModerationStore::new(&config.database_path).await?);
    tracing::info!("Moderation database ready at {}", config.database_path);

    let moderation_service = Arc::new(ModerationService::new(Arc::clone(&store)));
    let relay_service = Arc::new(RelayService::new(
        Arc::clone(&store),
        config.modmail_channel_id,
    ));

    let data = Data {
        moderation: moderation_service,
        modmail: relay_service,
        warning_role_id: serenity::RoleId::new(config.warning_role_id),
    };

    // Keepalive runs for the life of the process, independent of the gateway
    let keepalive_port = config.keepalive_port;
    tokio::spawn(async move {
        if let Err(e) = keepalive::run(keepalive_port).await {
            tracing::error!("Keepalive server stopped: {}", e);
        }
    });

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT; // Required to relay message content

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                // Global registration can take a while to propagate
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(
                    count = framework.options().commands.len(),
                    "Slash commands registered"
                );

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    tracing::info!("Connecting to Discord...");
    client.start().await?;
    Ok(())
}
