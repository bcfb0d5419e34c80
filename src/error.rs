use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not bind any port in {first}..={last}")]
    Bind { first: u16, last: u16 },
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out talking to {0}")]
    Timeout(String),
    #[error("peer {0} is not known")]
    UnknownPeer(String),
    #[error("frame has no identity separator")]
    MalformedFrame,
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("peer closed the connection without replying")]
    NoReply,
    #[error("invalid identity {0:?}: must be non-empty and contain no ':'")]
    InvalidIdentity(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<NetworkError> for io::Error {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
