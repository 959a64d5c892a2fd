use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, FullEvent};
use tracing::{debug, info, warn};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::handlers::voice_state;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot, .. } => {
            info!(
                "Bot #{} ready as {}",
                data.number(),
                data_about_bot.user.name
            );
        }

        FullEvent::VoiceStateUpdate { old, new } => {
            voice_state::handle_voice_state_update(ctx, data, old.as_ref(), new);
        }

        FullEvent::ChannelDelete { channel, .. } => {
            if data.coordinator.assignments.owner_of(channel.id) == Some(data.number()) {
                warn!(
                    "Bot #{}: guarded channel {} was deleted",
                    data.number(),
                    channel.id
                );
                data.instance.disconnect().await;
            }
        }

        FullEvent::GuildDelete { incomplete, .. } => {
            debug!("Bot #{}: guild {} removed", data.number(), incomplete.id);
        }

        _ => {}
    }

    Ok(())
}
