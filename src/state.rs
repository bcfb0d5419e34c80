use crate::peer::Peer;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What an inbound sighting did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    New,
    Moved,
    Unchanged,
}

/// Identity -> last-known address. Every access goes through one lock, which
/// is never held across an `.await`.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<Mutex<HashMap<String, Peer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite. Returns the previous record, if any.
    pub fn upsert(&self, peer: Peer) -> Option<Peer> {
        self.lock().insert(peer.identity.clone(), peer)
    }

    /// Record a peer seen on an inbound connection. A known identity keeps its
    /// port; only a changed ip is written back.
    pub fn observe(&self, identity: &str, ip: IpAddr, port: u16) -> Sighting {
        let mut peers = self.lock();
        match peers.get_mut(identity) {
            None => {
                peers.insert(identity.to_string(), Peer::new(identity, ip, port));
                Sighting::New
            }
            Some(existing) if existing.ip != ip => {
                existing.ip = ip;
                Sighting::Moved
            }
            Some(_) => Sighting::Unchanged,
        }
    }

    pub fn remove(&self, identity: &str) -> Option<Peer> {
        self.lock().remove(identity)
    }

    pub fn get(&self, identity: &str) -> Option<Peer> {
        self.lock().get(identity).cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains_key(identity)
    }

    pub fn identities(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> HashMap<String, Peer> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
