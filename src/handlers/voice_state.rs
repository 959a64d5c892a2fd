use std::sync::Arc;

use serenity::all::{Context, VoiceState};
use tracing::debug;

use crate::bot::data::Data;
use crate::services::guard::PresenceChange;

pub fn handle_voice_state_update(
    ctx: &Context,
    data: &Arc<Data>,
    old: Option<&VoiceState>,
    new: &VoiceState,
) {
    if new.guild_id.is_none() {
        return; // DM voice states are not supported
    }

    let change = PresenceChange {
        user_id: new.user_id,
        old_channel: old.and_then(|o| o.channel_id),
        new_channel: new.channel_id,
    };

    if change.left_channel().is_none() {
        return;
    }

    let bot_user = ctx.cache.current_user().id;
    if data.instance.on_presence_change(bot_user, change) {
        debug!(
            "Bot #{}: vacancy check scheduled after {} left",
            data.number(),
            change.user_id
        );
    }
}
