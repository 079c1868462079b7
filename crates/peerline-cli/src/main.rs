//! Peerline CLI
//!
//! Resolve contacts on the local network (with rendezvous fallback) and
//! move files to and from them.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use peerline_core::discovery::{Prober, Resolution, Resolver, TcpProber};
use peerline_core::proto::MacAddr;
use peerline_core::transfer::{self, FileSession, TcpFileSession, TransferEvent};
use peerline_core::{ContactStore, MemoryContactStore, TaskRunner};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Peerline - find your peers, move your files
#[derive(Parser)]
#[command(name = "peerline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a contact's current address
    Resolve {
        /// Contact name from the configuration
        name: String,
    },

    /// Probe one address directly, skipping resolution
    Probe {
        /// Address to probe
        address: IpAddr,

        /// Inbox port
        #[arg(short, long, default_value_t = 42000)]
        port: u16,
    },

    /// Resolve a contact and send it a file
    Send {
        /// Contact name from the configuration
        name: String,

        /// File to send
        file: PathBuf,
    },

    /// Resolve a contact and fetch a file from it
    Fetch {
        /// Contact name from the configuration
        name: String,

        /// Remote file name
        file: String,

        /// Directory the file lands in
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Register this node with the rendezvous directory
    SignUp,

    /// Ask the rendezvous directory about a peer
    Lookup {
        /// Look up by hardware address
        #[arg(long)]
        mac: Option<String>,

        /// Look up by registered username
        #[arg(long)]
        name: Option<String>,
    },

    /// Ask the rendezvous directory to forget an address
    Drop {
        /// Address the directory should forget
        address: IpAddr,
    },

    /// List configured contacts
    Contacts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .init();

    match cli.command {
        Commands::Resolve { name } => {
            let res = resolve_contact(&config, &name).await?;
            println!(
                "{} answers at {}:{} ({})",
                name, res.addr, res.port, res.info.mac_address
            );
        }
        Commands::Probe { address, port } => {
            probe_once(&config, address, port).await?;
        }
        Commands::Send { name, file } => {
            send_file(&config, &name, file).await?;
        }
        Commands::Fetch { name, file, output } => {
            fetch_file(&config, &name, &file, output).await?;
        }
        Commands::SignUp => {
            sign_up(&config).await?;
        }
        Commands::Lookup { mac, name } => {
            lookup(&config, mac, name).await?;
        }
        Commands::Drop { address } => {
            drop_address(&config, address).await?;
        }
        Commands::Contacts => {
            list_contacts(&config);
        }
    }

    Ok(())
}

/// Run the resolution chain for a configured contact as its own unit of
/// work
async fn resolve_contact(config: &Config, name: &str) -> anyhow::Result<Resolution> {
    let store = MemoryContactStore::new(config.contacts.clone());
    let contact = store
        .get_by_name(name)
        .with_context(|| format!("unknown contact: {name}"))?;

    let resolver = Resolver::new(config.probe_timeout(), config.rendezvous_client());
    let target = contact.resolve_target();

    let runner = TaskRunner::new();
    let handle = runner.submit(async move { resolver.resolve(&target).await });
    Ok(handle.outcome().await??)
}

/// Probe one address and print whatever identity answers
async fn probe_once(config: &Config, address: IpAddr, port: u16) -> anyhow::Result<()> {
    let info = TcpProber
        .probe(address, port, config.probe_timeout())
        .await?;

    println!("{}:{} is {}", address, port, info.mac_address);
    if let Some(name) = &info.name {
        println!("  name: {name}");
    }
    if let Some(ipv4) = info.ipv4_addr {
        println!("  advertised ipv4: {ipv4}");
    }
    Ok(())
}

/// Resolve a contact and upload a file to it
async fn send_file(config: &Config, name: &str, file: PathBuf) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let res = resolve_contact(config, name).await?;
    run_transfer(config, res, move |mut session, events| async move {
        transfer::upload(&mut session, &file, &events).await;
        session
    })
    .await
}

/// Resolve a contact and download a file from it
async fn fetch_file(
    config: &Config,
    name: &str,
    file: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let dest = output.unwrap_or_else(|| config.download_dir());
    let res = resolve_contact(config, name).await?;
    let file = file.to_string();

    run_transfer(config, res, move |mut session, events| async move {
        transfer::download(&mut session, Path::new(&file), &dest, &events).await;
        session
    })
    .await
}

/// Connect a file session to a resolved peer, run one job on it, and
/// relay the worker's lifecycle events to the terminal
async fn run_transfer<F, Fut>(config: &Config, res: Resolution, job: F) -> anyhow::Result<()>
where
    F: FnOnce(TcpFileSession, transfer::EventSender) -> Fut + Send + 'static,
    Fut: Future<Output = TcpFileSession> + Send + 'static,
{
    let user = config.transfer.username.clone();
    let password = config.transfer.password.clone();
    let timeout = Duration::from_secs(config.transfer.timeout_secs);

    let runner = TaskRunner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = runner.submit(async move {
        let (mut session, banner) = TcpFileSession::connect(res.addr, res.port, timeout).await?;
        tracing::debug!(%banner, "peer file service answered");
        session.login(&user, &password).await?;

        let mut session = job(session, tx).await;
        let _ = session.quit().await;
        Ok::<(), anyhow::Error>(())
    });

    let succeeded = relay_events(&mut rx).await;
    handle.outcome().await??;

    if succeeded {
        Ok(())
    } else {
        anyhow::bail!("transfer did not complete")
    }
}

/// Print worker events until the job's event stream closes.
///
/// Returns whether a `Finished` event was seen.
async fn relay_events(rx: &mut mpsc::UnboundedReceiver<TransferEvent>) -> bool {
    let mut finished = false;
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::Start { host, port, filename } => {
                println!("transferring {filename} with {host}:{port} ...");
            }
            TransferEvent::Finished { filename, .. } => {
                finished = true;
                println!("{filename}: done");
            }
            TransferEvent::Failed { filename, cause, .. } => {
                eprintln!("{filename}: {cause}");
            }
            TransferEvent::End => {}
        }
    }
    finished
}

/// Register this node's identity with the rendezvous directory
async fn sign_up(config: &Config) -> anyhow::Result<()> {
    let client = config
        .rendezvous_client()
        .context("no rendezvous server configured")?;
    let me = config
        .network_info()
        .context("node.mac is not set in the configuration")?;

    client
        .sign_up(me.mac, me.name.clone(), me.port, config.rendezvous.get_only_by_mac)
        .await?;

    println!("registered {} ({}) with the directory", me.name, me.mac);
    Ok(())
}

/// Look a peer up in the rendezvous directory
async fn lookup(
    config: &Config,
    mac: Option<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let client = config
        .rendezvous_client()
        .context("no rendezvous server configured")?;

    let reply = match (mac, name) {
        (Some(mac), None) => {
            let mac: MacAddr = mac.parse()?;
            client.get_by_mac(mac).await?
        }
        (None, Some(username)) => client.get_by_username(username).await?,
        _ => anyhow::bail!("pass exactly one of --mac or --name"),
    };

    match reply.client {
        Some(record) => println!("last known address: {}:{}", record.ipv4_addr, record.port),
        None => println!("unknown to the directory"),
    }
    Ok(())
}

/// Ask the rendezvous directory to forget an address
async fn drop_address(config: &Config, address: IpAddr) -> anyhow::Result<()> {
    let client = config
        .rendezvous_client()
        .context("no rendezvous server configured")?;

    client.drop_address(address).await?;
    println!("directory dropped {address}");
    Ok(())
}

/// Print the configured contacts
fn list_contacts(config: &Config) {
    let store = MemoryContactStore::new(config.contacts.clone());
    let contacts = store.list();
    if contacts.is_empty() {
        println!("no contacts configured");
        return;
    }

    for contact in contacts {
        let ipv4 = contact
            .ipv4
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        let ipv6 = contact
            .ipv6
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        println!(
            "{:<20} {}  ipv4 {}  ipv6 {}  port {}",
            contact.name, contact.mac, ipv4, ipv6, contact.port
        );
    }
}
