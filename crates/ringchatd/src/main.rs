//! ringchatd: the RingChat peer daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use ringchat_core::config::RingConfig;
use ringchat_core::PeerAddress;
use ringchat_node::{NodeRuntime, Snapshot};

mod discovery;
mod input;
mod render;

use input::Input;

/// Decentralized chat over a ring of peers.
#[derive(Parser, Debug)]
#[command(name = "ringchatd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Ring member to join through, as host:port
    #[arg(long, conflicts_with_all = ["server", "server_port"])]
    entry: Option<String>,

    /// Entry host (use with -p)
    #[arg(short = 's', long = "server", requires = "server_port")]
    server: Option<String>,

    /// Entry port (use with -s)
    #[arg(short = 'p', long = "server-port", requires = "server")]
    server_port: Option<u16>,

    /// Host to advertise to other peers
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (0 = any free port)
    #[arg(long)]
    port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ask for the entry point interactively
    #[arg(long)]
    prompt: bool,
}

impl Args {
    /// Flags override whatever the config resolved to.
    fn apply(&self, config: &mut RingConfig) {
        if let Some(host) = &self.host {
            config.network.advertise_host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.listen_port = port;
        }
        if let Some(entry) = &self.entry {
            config.network.entry = entry.clone();
        }
        if let (Some(host), Some(port)) = (&self.server, self.server_port) {
            config.network.entry = format!("{host}:{port}");
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RingConfig> {
    if let Some(path) = path {
        return RingConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    if let Err(e) = RingConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    Ok(RingConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        RingConfig::default()
    }))
}

async fn ask(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?.unwrap_or_default().trim().to_string())
}

/// Interactive entry: an empty host starts a new ring.
async fn prompt_entry(lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    let host = ask(lines, "Server host: ").await?;
    if host.is_empty() {
        return Ok(String::new());
    }
    let port: u16 = ask(lines, "Server port: ")
        .await?
        .parse()
        .context("server port must be a number")?;
    Ok(format!("{host}:{port}"))
}

fn status_json(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot).context("failed to serialize status")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Chat goes to stdout; keep logs out of its way.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(args.config.as_ref())?;
    args.apply(&mut config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if args.prompt {
        config.network.entry = prompt_entry(&mut lines).await?;
    }

    let entry: Option<PeerAddress> = if config.network.entry.is_empty() {
        None
    } else {
        Some(
            config
                .network
                .entry
                .parse()
                .with_context(|| format!("invalid entry point {:?}", config.network.entry))?,
        )
    };

    let listener = discovery::bind_listener(config.network.listen_port)?;
    let port = listener.local_addr()?.port();
    let address = PeerAddress::new(discovery::advertised_host(&config.network.advertise_host), port);
    tracing::info!(%address, entry = ?entry, "ringchatd starting");

    let NodeRuntime {
        handle,
        mut events,
        task,
    } = ringchat_node::start(listener, address.clone(), entry, config.timeouts)
        .await
        .context("failed to join the ring")?;

    println!("You are joined! New members can join through {address}");
    let color = config.chat.color;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    tracing::info!("stdin closed, leaving ring");
                    handle.disconnect().await?;
                    break;
                };
                match input::parse(&line) {
                    Input::Disconnect => {
                        handle.disconnect().await?;
                        println!("Exiting...");
                        break;
                    }
                    Input::NewConnection => {
                        println!("You can connect new user by this data: {}", handle.address());
                    }
                    Input::GetId => match handle.id().await {
                        Ok(id) => println!("This is your id: {id}"),
                        Err(e) => println!("[ ! ] {e}"),
                    },
                    Input::Status => println!("{}", status_json(&handle.snapshot().await?)?),
                    Input::Chat(text) => {
                        if let Err(e) = handle.send_chat(text).await {
                            println!("[ ! ] {e}");
                        }
                    }
                    Input::Empty => {}
                }
            }

            Some(event) = events.recv() => println!("{}", render::event(&event, color)),
        }
    }

    task.await.context("node task panicked")?;
    Ok(())
}
