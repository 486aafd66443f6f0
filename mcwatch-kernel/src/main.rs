/**
 * MCWATCH - entry point
 *
 * ROLE: loads configuration, registers the `players` command, starts the
 * status poller and the optional self-ping, then serves HTTP until Ctrl-C.
 */

use anyhow::{Context, Result};
use mcwatch_kernel::config::WatchConfig;
use mcwatch_kernel::discord::{self, DiscordClient};
use mcwatch_kernel::health::WatchHealth;
use mcwatch_kernel::http::{self, AppState};
use mcwatch_kernel::keepalive;
use mcwatch_kernel::notify::build_notifier;
use mcwatch_kernel::poller::StatusPoller;
use mcwatch_kernel::prober::{Prober, SlpProber};
use mcwatch_kernel::query::StatusQuery;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,mcwatch_kernel=debug")),
        )
        .init();

    let cfg = WatchConfig::from_env().context("invalid configuration")?;
    info!(
        target_addr = %cfg.target,
        poll_seconds = cfg.poll_interval.as_secs(),
        sink = ?cfg.sink,
        "configuration loaded"
    );

    let discord_client = DiscordClient::new(&cfg.discord).context("failed to build discord client")?;

    // slash command (guild scoped, near instant)
    match discord::register_players_command(&discord_client, &cfg.discord).await {
        Ok(true) => {}
        Ok(false) => warn!("GUILD_ID is not set, skipping slash command registration"),
        Err(e) => error!(error = %e, "command registration failed"),
    }

    let interaction_key = match cfg.discord.public_key.as_deref() {
        Some(hex_key) => Some(discord::parse_public_key(hex_key).context("DISCORD_PUBLIC_KEY")?),
        None => {
            warn!("DISCORD_PUBLIC_KEY is not set, /interactions is disabled");
            None
        }
    };

    let prober: Arc<dyn Prober> = Arc::new(SlpProber::new(cfg.target.clone(), cfg.probe_timeout));
    let health = WatchHealth::new();

    // poller owns the change detector; first tick sets the baseline
    let notifier = build_notifier(&cfg.sink, &discord_client);
    StatusPoller::new(prober.clone(), notifier, health.clone()).spawn(cfg.poll_interval);
    info!(every_seconds = cfg.poll_interval.as_secs(), "automated status polling enabled");

    if let Some(url) = cfg.public_url.clone() {
        keepalive::spawn_self_ping(reqwest::Client::new(), url, keepalive::SELF_PING_PERIOD);
    }

    let app = http::build_router(AppState {
        query: StatusQuery::new(prober),
        health,
        interaction_key,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("http server failed")?;
    Ok(())
}
