use chrono::{DateTime, Utc};
use serenity::all::{Member, Timestamp};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::services::guard::member::RoleRef;
use crate::services::guard::MemberProfile;

fn to_utc(ts: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.unix_timestamp(), 0)
}

/// Snapshot the invoking member: roles with names, boost status and current
/// voice channel, all read from the guild cache
pub async fn author_profile(ctx: Context<'_>) -> Result<MemberProfile, Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| Error::custom("This command only works inside a server"))?;

    let member: Member = ctx
        .author_member()
        .await
        .ok_or_else(|| Error::custom("Could not look up your server membership"))?
        .into_owned();

    let mut profile = MemberProfile::new(member.user.id, guild_id, member.display_name());
    profile.premium_since = member.premium_since.and_then(to_utc);

    if let Some(guild) = ctx.guild() {
        profile.roles = member
            .roles
            .iter()
            .map(|role_id| RoleRef {
                id: *role_id,
                name: guild
                    .roles
                    .get(role_id)
                    .map(|role| role.name.clone())
                    .unwrap_or_default(),
            })
            .collect();

        profile.voice_channel = guild
            .voice_states
            .get(&member.user.id)
            .and_then(|state| state.channel_id);
    } else {
        profile.roles = member
            .roles
            .iter()
            .map(|role_id| RoleRef {
                id: *role_id,
                name: String::new(),
            })
            .collect();
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversion() {
        let ts = Timestamp::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(to_utc(ts).unwrap().timestamp(), 1_700_000_000);
    }
}
