use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Peer {
    pub identity: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl Peer {
    pub fn new(identity: impl Into<String>, ip: IpAddr, port: u16) -> Self {
        Self {
            identity: identity.into(),
            ip,
            port,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}
