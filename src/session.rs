use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::error::NetworkError;
use crate::events::EventSink;
use crate::identity::Identity;
use crate::protocol::{Frame, FrameCodec};
use crate::state::{PeerRegistry, Sighting};

/// Everything an inbound session needs, shared by all sessions of one listener.
pub(crate) struct SessionContext {
    pub registry: PeerRegistry,
    pub identity: Identity,
    pub events: EventSink,
    pub listen_port: u16,
    pub io_timeout: Duration,
    pub max_frame_len: usize,
}

/// Service one accepted connection: one read, one optional ACK, then close.
/// Errors end the session here and go no further than the log.
pub(crate) async fn handle_session(stream: TcpStream, remote: SocketAddr, ctx: Arc<SessionContext>) {
    match serve(stream, remote, &ctx).await {
        Ok(()) => tracing::debug!("Session with {} finished", remote),
        Err(e) => tracing::warn!("Error handling client {}: {}", remote, e),
    }
}

async fn serve(
    stream: TcpStream,
    remote: SocketAddr,
    ctx: &SessionContext,
) -> Result<(), NetworkError> {
    let codec = FrameCodec::with_max_len(ctx.max_frame_len);
    let mut framed = Framed::with_capacity(stream, codec, ctx.max_frame_len);

    let frame = match timeout(ctx.io_timeout, framed.next()).await {
        Err(_) => return Err(NetworkError::Timeout(remote.to_string())),
        Ok(None) => {
            tracing::debug!("{} closed without sending anything", remote);
            return Ok(());
        }
        Ok(Some(Err(NetworkError::MalformedFrame))) => {
            tracing::debug!("Dropping malformed frame from {}", remote);
            return Ok(());
        }
        Ok(Some(Err(e))) => return Err(e),
        Ok(Some(Ok(frame))) => frame,
    };

    match ctx
        .registry
        .observe(&frame.identity, remote.ip(), ctx.listen_port)
    {
        Sighting::New => {
            tracing::info!("{} joined from {}", frame.identity, remote.ip());
            ctx.events.peer_connected(&frame.identity);
        }
        Sighting::Moved => {
            tracing::debug!("{} now reachable at {}", frame.identity, remote.ip());
        }
        Sighting::Unchanged => {}
    }

    // HELLO takes this path too; only an empty payload is skipped.
    if !frame.payload.is_empty() {
        ctx.events.message_received(&frame.identity, &frame.payload);
    }

    let ack = Frame::ack(ctx.identity.get());
    timeout(ctx.io_timeout, framed.send(ack))
        .await
        .map_err(|_| NetworkError::Timeout(remote.to_string()))?
}
