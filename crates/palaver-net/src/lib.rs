// Real-time channel and request/response plumbing for the palaver client.

pub mod channel;
pub mod gateway;
pub mod transport;

pub use channel::{spawn_channel, ChannelCommand, ChannelConfig, ChannelHandle, ChannelNotification};
pub use gateway::{Backend, Credential, RequestGateway};
pub use transport::{Connection, MemoryPeer, MemoryTransport, PeerConnection, Transport, TransportError};
