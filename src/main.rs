use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use peerchat_lib::{load_settings, local_ip, logging, NetworkEvent, PeerNetwork};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(name = "peerchat", version, about = "Serverless LAN chat over direct TCP")]
struct Cli {
    /// Preferred listening port (the next 9 are tried if busy)
    #[arg(short, long)]
    port: Option<u16>,

    /// Display name announced to peers
    #[arg(short, long)]
    name: Option<String>,

    /// Address to bind the listener to
    #[arg(long)]
    bind: Option<IpAddr>,

    /// JSON settings file holding the default port and username
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Peers to dial on startup, as HOST or HOST:PORT
    #[arg(short, long)]
    connect: Vec<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write daily-rolling logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn split_target(target: &str) -> (String, Option<u16>) {
    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (target.to_string(), None),
        },
        _ => (target.to_string(), None),
    }
}

async fn dial(network: &PeerNetwork, target: &str) {
    let (host, port) = split_target(target);
    println!("Connecting to {}...", target);
    match network.connect_to_peer(&host, port).await {
        Ok(identity) => println!("Connected to peer at {} ({})", target, identity),
        Err(e) => println!("Failed to connect to {}: {}", target, e),
    }
}

/// Deliver off the input loop so an unreachable peer never stalls typing.
fn spawn_send(network: &PeerNetwork, to: String, text: String) -> JoinHandle<()> {
    let network = network.clone();
    tokio::spawn(async move {
        if let Err(e) = network.send_message_to_peer(&to, &text).await {
            println!("Could not deliver to {}: {}", to, e);
        }
    })
}

fn render(event: NetworkEvent) {
    match event {
        NetworkEvent::PeerConnected { identity } => println!("* {} has joined the chat", identity),
        NetworkEvent::PeerDisconnected { identity } => println!("* {} has left the chat", identity),
        NetworkEvent::MessageReceived {
            identity,
            text,
            timestamp,
        } => println!("[{}] {}: {}", timestamp, identity, text),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref())?;

    let mut settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => Default::default(),
    };
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(name) = cli.name {
        settings.username = Some(name);
    }
    if let Some(bind) = cli.bind {
        settings.bind_address = bind;
    }

    let (network, mut events) = PeerNetwork::new(settings)?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render(event);
        }
    });

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "Unknown Device".to_string());
    match network.start_listening().await {
        Ok(port) => println!(
            "{} on {} - your IP address: {}:{} - share this with others so they can connect to you",
            network.username(),
            host,
            local_ip(),
            port
        ),
        Err(e) => println!("Could not start P2P networking ({}). Chat will be in offline mode.", e),
    }

    for target in &cli.connect {
        dial(&network, target).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/quit" => break,
            "/connect" if !rest.is_empty() => {
                let network = network.clone();
                let target = rest.trim().to_string();
                tokio::spawn(async move { dial(&network, &target).await });
            }
            "/name" if !rest.is_empty() => match network.set_username(rest.trim()) {
                Ok(()) => println!("You are now {}", network.username()),
                Err(e) => println!("{}", e),
            },
            "/peers" => {
                let peers = network.peers();
                if peers.is_empty() {
                    println!("No peers yet");
                }
                for peer in peers {
                    println!("  {} ({})", peer.identity, peer.addr());
                }
            }
            "/msg" => match rest.split_once(' ') {
                Some((to, text)) => {
                    spawn_send(&network, to.to_string(), text.to_string());
                }
                None => println!("usage: /msg NAME TEXT"),
            },
            _ if command.starts_with('/') => {
                println!("commands: /connect HOST[:PORT], /name NAME, /msg NAME TEXT, /peers, /quit")
            }
            _ => {
                let network = network.clone();
                let text = line.to_string();
                tokio::spawn(async move {
                    let report = network.broadcast_message(&text).await;
                    for (identity, e) in report.failed {
                        tracing::debug!("{} unreachable: {}", identity, e);
                    }
                });
            }
        }
    }

    network.stop_listening().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_target("10.0.0.5:6000"), ("10.0.0.5".to_string(), Some(6000)));
        assert_eq!(split_target("10.0.0.5"), ("10.0.0.5".to_string(), None));
        assert_eq!(split_target("host:nope"), ("host:nope".to_string(), None));
        assert_eq!(split_target("::1"), ("::1".to_string(), None));
    }

    #[tokio::test]
    async fn direct_message_does_not_block_caller() {
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Answers the handshake, then swallows the chat frame without replying.
        let server = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let mute = tokio::spawn(async move {
            let (mut hello, _) = server.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = hello.read(&mut buf).await.unwrap();
            hello.write_all(b"Mute:ACK").await.unwrap();
            drop(hello);
            let (chat, _) = server.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
            drop(chat);
        });

        let settings = peerchat_lib::Settings {
            io_timeout_secs: 1,
            username: Some("Bob".into()),
            ..Default::default()
        };
        let (network, _rx) = PeerNetwork::new(settings).unwrap();
        network.connect_to_peer("127.0.0.1", Some(port)).await.unwrap();

        let started = std::time::Instant::now();
        let handle = spawn_send(&network, "Mute".into(), "hello?".into());
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(!handle.is_finished());

        handle.await.unwrap();
        assert!(network.peer("Mute").is_none());
        mute.abort();
    }

    #[test]
    fn cli_accepts_repeated_connect() {
        let cli = Cli::parse_from(["peerchat", "-n", "Alice", "-c", "a", "-c", "b:1"]);
        assert_eq!(cli.name.as_deref(), Some("Alice"));
        assert_eq!(cli.connect, vec!["a".to_string(), "b:1".to_string()]);
        assert_eq!(cli.log_level, "info");
    }
}
