use std::sync::Arc;

use dashmap::DashMap;
use poise::serenity_prelude::{self as serenity, ChannelId, GatewayIntents, GuildId, ShardManager};
use songbird::Songbird;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bot::data::{command_prefix, Data, Fleet};
use crate::bot::error::Error;
use crate::commands;
use crate::config::Settings;
use crate::constants::embeds;
use crate::constants::timeouts::{
    IDLE_JOIN_DELAY, LOGIN_ATTEMPTS, LOGIN_RETRY_DELAY, SNAPSHOT_RETENTION,
};
use crate::handlers::event_handler::event_handler;
use crate::services::guard::{BotInstance, Coordinator};
use crate::services::media::{MediaPlayer, SongbirdPlayer};
use crate::services::queue::{spawn_queue_dispatcher, WaitQueue};
use crate::services::snapshot::{spawn_snapshot_task, SnapshotStore};
use crate::services::stats::StatsStore;
use crate::services::voice::{DiscordNotifier, SongbirdGateway};

/// State shared by every client in the process
#[derive(Clone)]
struct Shared {
    settings: Arc<Settings>,
    coordinator: Arc<Coordinator>,
    fleet: Arc<Fleet>,
    stats: Arc<StatsStore>,
    queue: Arc<WaitQueue>,
    snapshots: Arc<SnapshotStore>,
    shard_managers: Arc<DashMap<u8, Arc<ShardManager>>>,
}

type ClientResult = (u8, Result<(), Error>);

/// Run one client per configured token until Ctrl-C, or until every client has stopped
pub async fn run(settings: Settings) -> Result<(), Error> {
    let settings = Arc::new(settings);
    let shared = Shared {
        coordinator: Arc::new(Coordinator::new(settings.tier_resolver())),
        fleet: Arc::new(DashMap::new()),
        stats: Arc::new(StatsStore::open(&settings.stats_path).await),
        queue: Arc::new(WaitQueue::new()),
        snapshots: Arc::new(SnapshotStore::new(&settings.snapshot_dir, SNAPSHOT_RETENTION)),
        shard_managers: Arc::new(DashMap::new()),
        settings: Arc::clone(&settings),
    };

    let shutdown = CancellationToken::new();
    let snapshot_task = spawn_snapshot_task(
        Arc::clone(&shared.snapshots),
        Arc::clone(&shared.coordinator),
        shutdown.clone(),
    );
    let queue_task = spawn_queue_dispatcher(
        Arc::clone(&shared.queue),
        Arc::clone(&shared.fleet),
        &shared.coordinator,
        Arc::clone(&shared.stats),
        shutdown.clone(),
    );

    info!("Starting {} Satpam bot(s)", settings.bot_tokens.len());

    let mut clients = JoinSet::new();
    for (idx, token) in settings.bot_tokens.iter().enumerate() {
        let number = (idx + 1) as u8;
        let token = token.clone();
        let shared = shared.clone();
        let shutdown = shutdown.clone();
        clients.spawn(async move { (number, run_instance(number, token, shared, shutdown).await) });
    }

    let mut results = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
            Vec::new()
        }
        results = drain(&mut clients) => results,
    };

    shutdown.cancel();
    shutdown_fleet(&shared).await;
    results.extend(drain(&mut clients).await);

    if let Err(e) = snapshot_task.await {
        warn!("Snapshot task ended abnormally: {}", e);
    }
    if let Err(e) = queue_task.await {
        warn!("Queue dispatcher ended abnormally: {}", e);
    }

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    for (number, result) in &results {
        if let Err(e) = result {
            error!("Bot #{} stopped: {}", number, e);
        }
    }

    if !results.is_empty() && failed == results.len() {
        return Err(Error::custom("Every bot failed to start"));
    }

    info!("All bots stopped");
    Ok(())
}

async fn drain(clients: &mut JoinSet<ClientResult>) -> Vec<ClientResult> {
    let mut results = Vec::new();
    while let Some(joined) = clients.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => error!("Client task panicked: {}", e),
        }
    }
    results
}

/// Leave every voice channel, then close every gateway connection
async fn shutdown_fleet(shared: &Shared) {
    for instance in shared.fleet.iter().map(|e| Arc::clone(e.value())).collect::<Vec<_>>() {
        instance.shutdown().await;
    }

    let managers: Vec<Arc<ShardManager>> = shared
        .shard_managers
        .iter()
        .map(|e| Arc::clone(e.value()))
        .collect();
    for manager in managers {
        manager.shutdown_all().await;
    }
}

/// Log in and run one instance, retrying failed logins
async fn run_instance(
    number: u8,
    token: String,
    shared: Shared,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let mut last_error = None;

    for attempt in 1..=LOGIN_ATTEMPTS {
        if shutdown.is_cancelled() {
            return Ok(());
        }

        let started = match build_client(number, &token, shared.clone()).await {
            Ok(mut client) => {
                shared
                    .shard_managers
                    .insert(number, Arc::clone(&client.shard_manager));
                info!("Bot #{}: logging in (attempt {}/{})", number, attempt, LOGIN_ATTEMPTS);
                client.start().await
            }
            Err(e) => Err(e),
        };

        match started {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(
                    "Bot #{}: login attempt {}/{} failed: {}",
                    number, attempt, LOGIN_ATTEMPTS, e
                );
                last_error = Some(e);
            }
        }

        if attempt < LOGIN_ATTEMPTS {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = sleep(LOGIN_RETRY_DELAY) => {}
            }
        }
    }

    Err(match last_error {
        Some(e) => Error::custom(format!(
            "gave up after {} login attempts: {}",
            LOGIN_ATTEMPTS, e
        )),
        None => Error::custom("never attempted to log in"),
    })
}

async fn build_client(
    number: u8,
    token: &str,
    shared: Shared,
) -> Result<serenity::Client, serenity::Error> {
    let songbird = Songbird::serenity();
    let music_enabled = shared.settings.music_enabled(number);
    let setup_songbird = Arc::clone(&songbird);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(music_enabled),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(command_prefix(number)),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot #{} connected as {}", number, ready.user.name);

                let gateway = Arc::new(SongbirdGateway::new(
                    number,
                    ctx.http.clone(),
                    ctx.cache.clone(),
                    Arc::clone(&setup_songbird),
                ));
                let notifier = Arc::new(DiscordNotifier::new(
                    number,
                    ctx.http.clone(),
                    ctx.cache.clone(),
                ));
                let instance = BotInstance::new(
                    number,
                    shared.settings.idle_channel_id.map(ChannelId::new),
                    gateway,
                    notifier,
                    Arc::clone(&shared.coordinator),
                );

                // A retried login replaces the instance from the previous client
                if let Some(previous) = shared.fleet.insert(number, Arc::clone(&instance)) {
                    previous.shutdown().await;
                }

                let media: Option<Arc<dyn MediaPlayer>> = if music_enabled {
                    info!("Bot #{}: media playback enabled", number);
                    Some(Arc::new(SongbirdPlayer::new(
                        number,
                        setup_songbird,
                        reqwest::Client::new(),
                    )))
                } else {
                    None
                };

                register_commands(ctx, framework, number, shared.settings.guild_id).await;

                if instance.idle_channel().is_some() {
                    let idle = Arc::clone(&instance);
                    tokio::spawn(async move {
                        // Let the cache fill before joining
                        sleep(IDLE_JOIN_DELAY).await;
                        match idle.join_idle().await {
                            Ok(channel_id) => debug!("Bot #{}: settled in {}", number, channel_id),
                            Err(e) => warn!("Bot #{}: could not join idle channel: {}", number, e),
                        }
                    });
                }

                Ok(Arc::new(Data {
                    instance,
                    settings: shared.settings,
                    coordinator: shared.coordinator,
                    fleet: shared.fleet,
                    stats: shared.stats,
                    queue: shared.queue,
                    snapshots: shared.snapshots,
                    media,
                }))
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .voice_manager_arc(songbird)
        .await
}

/// Register slash commands per guild when one is configured, globally otherwise.
/// Failure leaves prefix commands working, so it is not fatal.
async fn register_commands(
    ctx: &serenity::Context,
    framework: &poise::Framework<Arc<Data>, Error>,
    number: u8,
    guild_id: Option<u64>,
) {
    let commands = &framework.options().commands;

    let result = match guild_id {
        Some(guild_id) => {
            let guild_id = GuildId::new(guild_id);
            poise::builtins::register_in_guild(ctx, commands, guild_id)
                .await
                .map(|_| format!("in guild {}", guild_id))
        }
        None => poise::builtins::register_globally(ctx, commands)
            .await
            .map(|_| "globally".to_string()),
    };

    match result {
        Ok(scope) => info!(
            "Bot #{}: registered {} commands {}",
            number,
            commands.len(),
            scope
        ),
        Err(e) => error!(
            "Bot #{}: failed to register slash commands: {:?}",
            number, e
        ),
    }
}

async fn on_error(error: poise::FrameworkError<'_, Arc<Data>, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = if error.is_user_facing() {
                debug!("Command {} refused: {}", ctx.command().name, error);
                error.to_string()
            } else {
                error!("Command {} failed: {:?}", ctx.command().name, error);
                "Something went wrong, please try again later.".to_string()
            };

            let embed = embeds::error_embed().description(message);
            let _ = ctx
                .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await;
        }
        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
        }
        poise::FrameworkError::UnknownCommand { .. } => {
            // Another instance's prefix or a stray mention
        }
        err => {
            error!("Framework error: {:?}", err);
        }
    }
}
