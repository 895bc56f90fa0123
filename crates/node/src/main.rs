mod config;
mod events;
mod node;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use config::NodeConfig;
use node::CoopNode;

#[derive(Parser)]
#[command(name = "coop-node")]
#[command(about = "Headless coop replication node")]
struct Args {
    #[arg(short, long, default_value = "coop.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Overrides player.nickname")]
    nickname: Option<String>,

    #[arg(short, long, help = "Overrides connection.port")]
    port: Option<u16>,

    #[arg(short, long, default_value_t = 30)]
    tick_rate: u32,

    #[arg(long, help = "Walk the local player in a circle")]
    patrol: bool,

    #[arg(long, help = "Stop after this many seconds")]
    duration: Option<u64>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Host a session
    Host {
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,

        #[arg(long, default_value_t = 0, help = "World actors to broadcast")]
        actors: usize,
    },
    /// Join a running session
    Join {
        #[arg(help = "Overrides connection.server")]
        server: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(&args.config)
        .with_context(|| format!("invalid configuration {}", args.config.display()))?;
    if let Some(nickname) = args.nickname {
        config.player.nickname = nickname;
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level)).init();
    for issue in config.sanitize() {
        log::warn!("{issue}");
    }

    let mut node = match args.mode {
        Mode::Host { bind, actors } => {
            let mut node = CoopNode::host(&format!("{bind}:{}", config.connection.port), &config, args.tick_rate)?;
            node.populate(actors);
            node
        }
        Mode::Join { server } => {
            let server = server.unwrap_or_else(|| config.connection.server.clone());
            CoopNode::join(&format!("{server}:{}", config.connection.port), &config, args.tick_rate)?
        }
    };
    if args.patrol {
        node.patrol();
    }

    log::info!("{} node started as {}", node.role().as_str(), config.player.nickname);
    node.run(args.duration.map(Duration::from_secs));
    log::info!("Node shutting down");

    Ok(())
}
