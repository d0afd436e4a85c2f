use thiserror::Error;

/// Failure taxonomy of the synchronization core.
///
/// None of these are fatal: every failure degrades functionality (fallback
/// data, a message left `pending`) rather than halting the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// An operation needing a credential was attempted without one.
    #[error("Not authenticated: no credential available")]
    Unauthenticated,

    /// The backend was reached (or attempted) but the call did not succeed.
    #[error("Remote error (status {status:?}): {message}")]
    RemoteError {
        status: Option<u16>,
        message: String,
    },

    /// A referenced conversation or message does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The real-time channel is not connected.
    #[error("Real-time channel unavailable")]
    ChannelUnavailable,

    /// A send was attempted while no conversation is selected.
    #[error("No active conversation selected")]
    NoActiveConversation,

    /// Text messages must contain something besides whitespace.
    #[error("Message is empty")]
    EmptyMessage,

    /// A frame or payload could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RemoteError {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
