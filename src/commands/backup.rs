use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, BULLET};
use crate::services::snapshot::SnapshotFile;
use crate::utils::formatting::{full_time, relative_time};

pub fn describe_backups(count: usize, retention: usize, latest: Option<&SnapshotFile>) -> String {
    let mut text = format!(
        "{} Snapshots on disk: **{}** (keeping the newest {})",
        BULLET, count, retention
    );

    match latest {
        Some(file) => text.push_str(&format!(
            "\n{} Latest: `{}`, {} ({})\n\
            {} Guarded channels: **{}**, running timers: **{}**",
            BULLET,
            file.backup_id,
            full_time(file.timestamp),
            relative_time(file.timestamp),
            BULLET,
            file.data.assignments.len(),
            file.data.timers.len()
        )),
        None => text.push_str(&format!("\n{} No snapshot written yet", BULLET)),
    }

    text
}

/// Report on the periodic state snapshots (admin)
#[poise::command(
    slash_command,
    prefix_command,
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn backup_status(ctx: Context<'_>) -> Result<(), Error> {
    let store = &ctx.data().snapshots;
    let count = store.list().await?.len();
    let latest = store.latest().await?;

    let embed = embeds::info_embed()
        .title("Snapshot Status")
        .description(describe_backups(count, store.retention(), latest.as_ref()))
        .footer(poise::serenity_prelude::CreateEmbedFooter::new(format!(
            "Directory: {}",
            store.dir().display()
        )));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guard::Coordinator;
    use crate::services::snapshot::SnapshotStore;
    use serenity::all::ChannelId;

    #[test]
    fn test_describe_without_snapshots() {
        let text = describe_backups(0, 10, None);
        assert!(text.contains("**0**"));
        assert!(text.contains("No snapshot"));
    }

    #[tokio::test]
    async fn test_describe_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 10);
        let coordinator = Coordinator::default();
        coordinator
            .assignments
            .try_assign(ChannelId::new(5), 1)
            .unwrap();
        store.create(coordinator.snapshot()).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        let count = store.list().await.unwrap().len();
        let text = describe_backups(count, store.retention(), Some(&latest));
        assert!(text.contains("**1** (keeping the newest 10)"));
        assert!(text.contains("Guarded channels: **1**"));
        assert!(text.contains(&latest.backup_id));
    }
}
