use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::error::NetworkError;
use crate::protocol::{Frame, FrameCodec};

/// Outbound side: one short-lived TCP connection per call, every step bounded
/// by `io_timeout`. The stream is dropped (closed) on every return path.
#[derive(Clone, Debug)]
pub struct Transport {
    io_timeout: Duration,
    max_frame_len: usize,
}

impl Transport {
    pub fn new(io_timeout: Duration, max_frame_len: usize) -> Self {
        Self {
            io_timeout,
            max_frame_len,
        }
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    async fn open(
        &self,
        host: &str,
        port: u16,
    ) -> Result<(Framed<TcpStream, FrameCodec>, SocketAddr), NetworkError> {
        let target = format!("{}:{}", host, port);
        let stream = match timeout(self.io_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(NetworkError::Connect {
                    addr: target,
                    source,
                })
            }
            Err(_) => return Err(NetworkError::Timeout(target)),
        };
        let remote = stream.peer_addr()?;
        let codec = FrameCodec::with_max_len(self.max_frame_len);
        Ok((
            Framed::with_capacity(stream, codec, self.max_frame_len),
            remote,
        ))
    }

    async fn send(
        &self,
        framed: &mut Framed<TcpStream, FrameCodec>,
        remote: SocketAddr,
        frame: Frame,
    ) -> Result<(), NetworkError> {
        timeout(self.io_timeout, framed.send(frame))
            .await
            .map_err(|_| NetworkError::Timeout(remote.to_string()))?
    }

    async fn reply(
        &self,
        framed: &mut Framed<TcpStream, FrameCodec>,
        remote: SocketAddr,
    ) -> Result<Frame, NetworkError> {
        match timeout(self.io_timeout, framed.next()).await {
            Ok(Some(result)) => result,
            Ok(None) => Err(NetworkError::NoReply),
            Err(_) => Err(NetworkError::Timeout(remote.to_string())),
        }
    }

    /// Send `HELLO` and wait for the peer to name itself. Returns the decoded
    /// reply and the address actually connected to.
    pub async fn handshake(
        &self,
        host: &str,
        port: u16,
        own_identity: &str,
    ) -> Result<(Frame, SocketAddr), NetworkError> {
        let (mut framed, remote) = self.open(host, port).await?;
        tracing::debug!("Handshaking with {} as {}", remote, own_identity);
        self.send(&mut framed, remote, Frame::hello(own_identity))
            .await?;
        let reply = self.reply(&mut framed, remote).await?;
        Ok((reply, remote))
    }

    /// Deliver one chat frame. Any reply counts as receipt, and so does the
    /// peer closing cleanly after reading; only connect, write, reset and
    /// timeout errors are failures.
    pub async fn deliver(
        &self,
        addr: SocketAddr,
        own_identity: &str,
        text: &str,
    ) -> Result<(), NetworkError> {
        let (mut framed, remote) = self.open(&addr.ip().to_string(), addr.port()).await?;
        self.send(&mut framed, remote, Frame::new(own_identity, text))
            .await?;
        match self.reply(&mut framed, remote).await {
            Ok(_)
            | Err(NetworkError::NoReply)
            | Err(NetworkError::MalformedFrame)
            | Err(NetworkError::InvalidUtf8) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
