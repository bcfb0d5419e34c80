#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::time::Duration;

use peerchat_lib::{EventReceiver, NetworkEvent, PeerNetwork, Settings};

pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub fn free_port() -> u16 {
    TcpListener::bind((LOOPBACK, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Hold `count` consecutive loopback ports open so nothing else can bind them.
pub fn occupy_consecutive(count: u16) -> (u16, Vec<TcpListener>) {
    for _ in 0..200 {
        let base = free_port();
        if base.checked_add(count).is_none() {
            continue;
        }
        let held: Vec<TcpListener> = (0..count)
            .filter_map(|i| TcpListener::bind((LOOPBACK, base + i)).ok())
            .collect();
        if held.len() == count as usize {
            return (base, held);
        }
    }
    panic!("could not find {} consecutive free ports", count);
}

pub fn settings(name: &str) -> Settings {
    Settings {
        port: free_port(),
        bind_address: LOOPBACK,
        io_timeout_secs: 2,
        username: Some(name.to_string()),
        ..Settings::default()
    }
}

pub async fn listening(name: &str) -> (PeerNetwork, EventReceiver, u16) {
    let (network, rx) = PeerNetwork::new(settings(name)).unwrap();
    let port = network.start_listening().await.unwrap();
    (network, rx, port)
}

/// Wait for the next event, failing the test after a few seconds.
pub async fn next_event(rx: &mut EventReceiver) -> NetworkEvent {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

pub fn drain(rx: &mut EventReceiver) -> Vec<NetworkEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn connected(identity: &str) -> NetworkEvent {
    NetworkEvent::PeerConnected {
        identity: identity.to_string(),
    }
}

pub fn disconnected(identity: &str) -> NetworkEvent {
    NetworkEvent::PeerDisconnected {
        identity: identity.to_string(),
    }
}

pub fn message_of(event: &NetworkEvent) -> Option<(&str, &str)> {
    match event {
        NetworkEvent::MessageReceived { identity, text, .. } => Some((identity.as_str(), text.as_str())),
        _ => None,
    }
}
