use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::error::NetworkError;
use crate::events::{EventReceiver, EventSink};
use crate::identity::Identity;
use crate::listener::{self, ListenerHandle};
use crate::peer::Peer;
use crate::session::SessionContext;
use crate::state::PeerRegistry;
use crate::storage::Settings;
use crate::transport::Transport;

/// Per-peer outcome of a broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, NetworkError)>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

struct Inner {
    settings: Settings,
    identity: Identity,
    registry: PeerRegistry,
    events: EventSink,
    transport: Transport,
    port: AtomicU16,
    listener: Mutex<Option<ListenerHandle>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.cancel();
        }
    }
}

/// Embeddable peer-to-peer chat endpoint.
///
/// Owns the local identity, the peer registry and the listener. Everything
/// that happens in the background reaches the caller only as a
/// [`NetworkEvent`](crate::events::NetworkEvent) on the receiver returned by
/// [`PeerNetwork::new`]; direct calls report success or failure through their
/// `Result`.
#[derive(Clone)]
pub struct PeerNetwork {
    inner: Arc<Inner>,
}

impl PeerNetwork {
    pub fn new(settings: Settings) -> Result<(Self, EventReceiver), NetworkError> {
        let identity = match settings.username.as_deref() {
            Some(name) => Identity::new(name)?,
            None => Identity::random(),
        };
        let (events, rx) = EventSink::channel();
        let transport = Transport::new(settings.io_timeout(), settings.max_frame_len);
        let inner = Inner {
            port: AtomicU16::new(settings.port),
            identity,
            registry: PeerRegistry::new(),
            events,
            transport,
            listener: Mutex::new(None),
            settings,
        };
        Ok((
            Self {
                inner: Arc::new(inner),
            },
            rx,
        ))
    }

    pub fn username(&self) -> String {
        self.inner.identity.get()
    }

    /// Takes effect on the next connection; exchanges already under way keep
    /// the name they started with.
    pub fn set_username(&self, username: &str) -> Result<(), NetworkError> {
        self.inner.identity.set(username)?;
        tracing::info!("Username set to {}", username);
        Ok(())
    }

    /// The bound port while listening, otherwise the preferred (or last bound) port.
    pub fn port(&self) -> u16 {
        self.inner.port.load(Ordering::SeqCst)
    }

    pub async fn is_listening(&self) -> bool {
        self.inner.listener.lock().await.is_some()
    }

    /// Start accepting peers. Calling this while already listening is a no-op
    /// that reports the existing port.
    pub async fn start_listening(&self) -> Result<u16, NetworkError> {
        let mut slot = self.inner.listener.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.port());
        }

        let settings = &self.inner.settings;
        let tcp = listener::bind_first_free(
            settings.bind_address,
            self.port(),
            settings.port_attempts,
            settings.backlog,
        )?;
        let port = tcp.local_addr()?.port();

        let ctx = Arc::new(SessionContext {
            registry: self.inner.registry.clone(),
            identity: self.inner.identity.clone(),
            events: self.inner.events.clone(),
            listen_port: port,
            io_timeout: settings.io_timeout(),
            max_frame_len: settings.max_frame_len,
        });
        *slot = Some(ListenerHandle::spawn(tcp, port, ctx));
        self.inner.port.store(port, Ordering::SeqCst);
        tracing::info!("P2P listening on port {}", port);
        Ok(port)
    }

    /// Close the listening socket and wait for open sessions to drain. A no-op
    /// when not listening.
    pub async fn stop_listening(&self) {
        let handle = self.inner.listener.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    /// Handshake with `host`. Without a port the local listening port is
    /// assumed, matching peers that run with the same settings. Returns the
    /// identity the peer replied with.
    pub async fn connect_to_peer(
        &self,
        host: &str,
        port: Option<u16>,
    ) -> Result<String, NetworkError> {
        let port = port.unwrap_or_else(|| self.port());
        let own = self.username();
        let (reply, remote) = self
            .inner
            .transport
            .handshake(host, port, &own)
            .await
            .inspect_err(|e| tracing::warn!("Error connecting to peer {}:{}: {}", host, port, e))?;

        let peer = Peer::new(reply.identity.clone(), remote.ip(), port);
        self.inner.registry.upsert(peer);
        self.inner.events.peer_connected(&reply.identity);
        tracing::info!("Connected to {} at {}:{}", reply.identity, remote.ip(), port);
        Ok(reply.identity)
    }

    /// Deliver `text` to a known peer. Any failure on the wire removes the peer
    /// and raises one peer-disconnected notification.
    pub async fn send_message_to_peer(&self, identity: &str, text: &str) -> Result<(), NetworkError> {
        let peer = self
            .inner
            .registry
            .get(identity)
            .ok_or_else(|| NetworkError::UnknownPeer(identity.to_string()))?;

        let own = self.username();
        let frame_len = own.len() + 1 + text.len();
        if frame_len > self.inner.settings.max_frame_len {
            return Err(NetworkError::FrameTooLarge {
                len: frame_len,
                max: self.inner.settings.max_frame_len,
            });
        }

        match self.inner.transport.deliver(peer.addr(), &own, text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Error sending message to {} at {}: {}", identity, peer.addr(), e);
                if self.inner.registry.remove(identity).is_some() {
                    self.inner.events.peer_disconnected(identity);
                }
                Err(e)
            }
        }
    }

    /// Send `text` to every peer known right now, concurrently. Peers that fail
    /// are dropped without affecting delivery to the rest.
    pub async fn broadcast_message(&self, text: &str) -> BroadcastReport {
        let identities = self.inner.registry.identities();
        let sends = identities.into_iter().map(|identity| async move {
            let result = self.send_message_to_peer(&identity, text).await;
            (identity, result)
        });

        let mut report = BroadcastReport::default();
        for (identity, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(identity),
                Err(e) => report.failed.push((identity, e)),
            }
        }
        tracing::debug!(
            "Broadcast reached {}/{} peers",
            report.delivered.len(),
            report.attempted()
        );
        report
    }

    /// Read-only snapshot of known peers, sorted by identity.
    pub fn peers(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.inner.registry.snapshot().into_values().collect();
        peers.sort_by(|a, b| a.identity.cmp(&b.identity));
        peers
    }

    pub fn peer(&self, identity: &str) -> Option<Peer> {
        self.inner.registry.get(identity)
    }
}

/// Address to hand out to other users so they can connect to us.
pub fn local_ip() -> IpAddr {
    local_ip_address::local_ip().unwrap_or_else(|_| IpAddr::from([127, 0, 0, 1]))
}
