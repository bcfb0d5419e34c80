use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::NetworkError;
use crate::session::{self, SessionContext};

/// Bind the first free port in `preferred..preferred + attempts`. A busy
/// candidate is logged and skipped; sockets from failed attempts are closed.
pub fn bind_first_free(
    ip: IpAddr,
    preferred: u16,
    attempts: u16,
    backlog: u32,
) -> Result<TcpListener, NetworkError> {
    let mut last = preferred;
    for offset in 0..attempts.max(1) {
        let Some(port) = preferred.checked_add(offset) else {
            break;
        };
        last = port;
        match try_bind(SocketAddr::new(ip, port), backlog) {
            Ok(listener) => return Ok(listener),
            Err(e) => tracing::warn!("Could not bind to port {}: {}", port, e),
        }
    }
    tracing::error!("Failed to bind to any port in range {}..={}", preferred, last);
    Err(NetworkError::Bind {
        first: preferred,
        last,
    })
}

fn try_bind(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// A running accept loop plus the sessions it spawned.
pub(crate) struct ListenerHandle {
    port: u16,
    cancel: CancellationToken,
    accept_task: JoinHandle<()>,
    sessions: TaskTracker,
}

impl ListenerHandle {
    pub fn spawn(listener: TcpListener, port: u16, ctx: Arc<SessionContext>) -> Self {
        let cancel = CancellationToken::new();
        let sessions = TaskTracker::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            ctx,
            cancel.clone(),
            sessions.clone(),
        ));
        Self {
            port,
            cancel,
            accept_task,
            sessions,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Signal the accept loop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop accepting, then wait for in-flight sessions to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.accept_task.await {
            tracing::error!("Accept loop ended abnormally: {}", e);
        }
        self.sessions.close();
        self.sessions.wait().await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    cancel: CancellationToken,
    sessions: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tracing::debug!("Accepted connection from {}", remote);
                    sessions.spawn(session::handle_session(stream, remote, ctx.clone()));
                }
                Err(e) if cancel.is_cancelled() => {
                    tracing::debug!("Accept after stop: {}", e);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
    drop(listener);
    tracing::info!("P2P listener on port {} stopped", ctx.listen_port);
}
