use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds::{self, DIVIDER};

/// List the commands this bot answers to
#[poise::command(slash_command, prefix_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let prefix = ctx.data().prefix();

    let lines: Vec<String> = ctx
        .framework()
        .options()
        .commands
        .iter()
        .filter(|cmd| !cmd.hide_in_help)
        .map(|cmd| {
            format!(
                "`/{}` · `{}{}`  {}",
                cmd.name,
                prefix,
                cmd.name,
                cmd.description.as_deref().unwrap_or("")
            )
        })
        .collect();

    let embed = embeds::standard_embed()
        .title(format!("Satpam Bot #{}", ctx.data().number()))
        .description(format!(
            "Call a bot into your voice channel and it keeps watch there, \
            staying behind after you leave for as long as your tier allows.\n{}\n{}",
            DIVIDER,
            lines.join("\n")
        ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
