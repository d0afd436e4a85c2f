//! # palaver-client
//!
//! The synchronization core of the palaver chat client: session context,
//! conversation directory, contacts, and the [`SyncCoordinator`] that ties
//! the message store, presence tracker and real-time channel together.

pub mod config;
pub mod contacts;
pub mod coordinator;
pub mod directory;
pub mod events;
pub mod session;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use contacts::ContactBook;
pub use coordinator::{Action, SyncCoordinator};
pub use directory::{ConversationDirectory, RefreshOutcome};
pub use events::StateChange;
pub use session::{Preferences, ReplyContext, Session};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("palaver_client=debug,palaver_net=debug,palaver_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
