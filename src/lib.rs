pub mod error;
pub mod events;
pub mod identity;
pub mod listener;
pub mod logging;
pub mod network;
pub mod peer;
pub mod protocol;
mod session;
pub mod state;
pub mod storage;
pub mod transport;

pub use error::{NetworkError, SettingsError};
pub use events::{EventReceiver, NetworkEvent};
pub use network::{local_ip, BroadcastReport, PeerNetwork};
pub use peer::Peer;
pub use storage::{load_settings, save_settings, Settings, DEFAULT_PORT};
