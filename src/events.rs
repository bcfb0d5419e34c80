use serde::Serialize;
use tokio::sync::mpsc;

/// Notifications raised by the connection layer for the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum NetworkEvent {
    PeerConnected {
        identity: String,
    },
    PeerDisconnected {
        identity: String,
    },
    MessageReceived {
        identity: String,
        text: String,
        timestamp: String,
    },
}

pub type EventReceiver = mpsc::UnboundedReceiver<NetworkEvent>;

#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<NetworkEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: NetworkEvent) {
        // A dropped receiver just means nobody is rendering anymore.
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }

    pub fn peer_connected(&self, identity: &str) {
        self.emit(NetworkEvent::PeerConnected {
            identity: identity.to_string(),
        });
    }

    pub fn peer_disconnected(&self, identity: &str) {
        self.emit(NetworkEvent::PeerDisconnected {
            identity: identity.to_string(),
        });
    }

    pub fn message_received(&self, identity: &str, text: &str) {
        self.emit(NetworkEvent::MessageReceived {
            identity: identity.to_string(),
            text: text.to_string(),
            timestamp: clock_stamp(),
        });
    }
}

/// Local wall-clock time as `HH:MM`.
pub fn clock_stamp() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
