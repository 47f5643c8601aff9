mod client_config;
mod state_report;
mod tilt_simulator;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::{Input, Select};
use std::path::PathBuf;
use std::sync::Arc;
use tilt::sensor::{ChannelSource, SensorManager};
use tilt::session::{Coordinator, FileIdentityStore, GameScene, IdentityStore, SensorFeed};
use tilt::transport::{MediaOptions, PeerManager, TransportConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use client_config::ClientConfig;

const CHARACTERS: [&str; 4] = ["red", "blue", "yellow", "green"];

#[derive(Parser)]
#[command(name = "tilt")]
#[command(about = "Headless motion controller for a tilt party game")]
struct Cli {
    /// JSON file with signaling, sensor, transport and session settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Signaling relay WebSocket URL.
    #[arg(long)]
    url: Option<String>,

    #[arg(short, long)]
    nickname: Option<String>,

    #[arg(long)]
    character: Option<String>,

    /// Where the local peer id is kept.
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Start this level once the relay names us host.
    #[arg(long, value_name = "LEVEL")]
    host: Option<String>,

    /// Run without the simulated tilt source.
    #[arg(long)]
    no_sensor: bool,

    #[arg(long)]
    stun: Option<String>,

    /// Negotiate receive-only audio and video next to the data channel.
    #[arg(long)]
    recv_media: bool,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.url {
            config.signaling_url = url.clone();
        }
        if let Some(path) = &self.identity {
            config.identity_path = path.clone();
        }
        if let Some(stun) = &self.stun {
            config.transport = TransportConfig {
                handshake_timeout: config.transport.handshake_timeout,
                data_channel_label: config.transport.data_channel_label.clone(),
                ..TransportConfig::with_stun(stun.clone())
            };
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let nickname = match &cli.nickname {
        Some(name) => name.clone(),
        None => Input::<String>::new()
            .with_prompt("Nickname")
            .interact_text()
            .context("Failed to read nickname")?,
    };
    let character = match &cli.character {
        Some(c) => c.clone(),
        None => {
            let picked = Select::new()
                .with_prompt("Character")
                .items(&CHARACTERS[..])
                .default(0)
                .interact()
                .context("Failed to read character")?;
            CHARACTERS[picked].to_owned()
        }
    };

    println!("{}", "🚀 Starting controller...".green().bold());

    let identity = FileIdentityStore::new(&config.identity_path);
    let local_id = identity.peer_id().await?;
    println!("   🆔 Peer id: {}", local_id.as_str().bold());

    let (peers, transport_events) = PeerManager::new(local_id, config.transport.clone());

    let (sensor, simulator) = if cli.no_sensor {
        (None, None)
    } else {
        let (source, feeder) = ChannelSource::new();
        let (manager, events) = SensorManager::new(Arc::new(source), config.sensor.clone());
        (
            Some(SensorFeed { manager, events }),
            Some(tilt_simulator::spawn(feeder)),
        )
    };

    let handle = Coordinator::start(
        config.session.clone(),
        &identity,
        Arc::new(peers.clone()),
        transport_events,
        sensor,
    )
    .await?;
    handle.confirm_identity(nickname.clone(), character.clone()).await?;
    println!("   👤 Playing as {} ({})", nickname.bold(), character.cyan());

    let media = MediaOptions {
        send: false,
        receive: cli.recv_media,
    };
    println!("{} {}", "📡 Connecting to".cyan(), config.signaling_url);
    if let Err(e) = peers.connect(&config.signaling_url, media).await {
        println!("{} {}", "✖".red().bold(), e);
        handle.teardown().await;
        if let Some(task) = simulator {
            task.abort();
        }
        return Err(e).context("Could not join the session");
    }

    let mut states = handle.subscribe();
    let mut last = states.borrow_and_update().clone();
    let mut game_started = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("{}", "👋 Leaving session".yellow());
                break;
            }

            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = states.borrow_and_update().clone();
                for notice in state_report::changes(&last, &next) {
                    println!("{}", notice.render());
                }

                if let Some(level) = &cli.host
                    && next.is_host
                    && !game_started
                    && next.game_scene == GameScene::Lobby
                {
                    match handle.start_game(level.clone()).await {
                        Ok(()) => {
                            game_started = true;
                            println!("{} {}", "▶ Started level".green().bold(), level);
                        }
                        Err(e) => warn!("Could not start game: {}", e),
                    }
                }

                let finished = next.game_scene == GameScene::Awards;
                last = next;
                if finished {
                    break;
                }
            }
        }
    }

    handle.teardown().await;
    if let Some(task) = simulator {
        task.abort();
    }
    println!("{}", "✨ Controller stopped".green().bold());
    Ok(())
}
