//! Command-line front end for the palaver client core.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use palaver_client::{init_tracing, ClientConfig, ContactBook, ConversationDirectory, Preferences, Session};
use palaver_net::{Backend, Credential, RequestGateway};
use palaver_shared::format::truncate_preview;
use palaver_shared::Identity;
use palaver_store::SqliteKv;

#[derive(Parser)]
#[command(name = "palaver", version, about = "Palaver chat client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh and list conversations
    Conversations {
        /// Only show conversations matching this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Search for people to talk to
    Search { query: Option<String> },
    /// Remember a credential
    Login {
        token: String,
        /// Display name to remember with the credential
        #[arg(long)]
        name: Option<String>,
        /// User id to remember with the credential
        #[arg(long)]
        id: Option<String>,
    },
    /// Forget the credential and profile
    Logout,
    /// Toggle dark mode
    Theme,
    /// Show or set the status text
    Status { text: Option<String> },
}

fn open_store(config: &ClientConfig) -> Result<SqliteKv> {
    let kv = match &config.data_dir {
        Some(dir) => SqliteKv::open_in(dir),
        None => SqliteKv::open_default(),
    };
    kv.context("Failed to open the key/value store")
}

fn gateway(config: &ClientConfig, session: &Session) -> Result<Arc<dyn Backend>> {
    let gateway = RequestGateway::new(
        config.api_base_url.clone(),
        session.credential.clone(),
        config.request_timeout,
    )?;
    Ok(Arc::new(gateway))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let kv = open_store(&config)?;
    let mut session = Session::load(&kv)?;

    match cli.command {
        Command::Conversations { filter } => {
            let backend = gateway(&config, &session)?;
            let mut directory = ConversationDirectory::new();
            let outcome = directory.refresh(backend.as_ref()).await;
            if outcome.using_fallback {
                println!("(backend unavailable, showing sample conversations)");
            }
            for conversation in directory.filter(filter.as_deref().unwrap_or("")) {
                let unread = match conversation.unread_count {
                    0 => String::new(),
                    n => format!(" [{n}]"),
                };
                let online = if conversation.peer_online { " ●" } else { "" };
                println!(
                    "{:>6}  {}{}{}  {}",
                    conversation.id.as_str(),
                    conversation.display_name,
                    online,
                    unread,
                    truncate_preview(&conversation.last_message_preview)
                );
            }
        }
        Command::Search { query } => {
            let backend = gateway(&config, &session)?;
            let mut contacts = ContactBook::new();
            if contacts
                .refresh(backend.as_ref(), query.as_deref().unwrap_or(""))
                .await
            {
                println!("(backend unavailable, showing sample contacts)");
            }
            for contact in contacts.list() {
                println!(
                    "{:>6}  {}  {}",
                    contact.id.as_str(),
                    contact.label(),
                    contact.mobile.as_deref().unwrap_or("")
                );
            }
        }
        Command::Login { token, name, id } => {
            let profile = name.map(|name| {
                let id = id.unwrap_or_else(|| session.user.id.to_string());
                Identity::new(id, name)
            });
            session.login(&kv, Credential::new(token), profile)?;
            println!("Logged in as {}", session.user.label());
        }
        Command::Logout => {
            session.logout(&kv)?;
            println!("Logged out");
        }
        Command::Theme => {
            let mut prefs = Preferences::load(&kv)?;
            let dark = prefs.toggle_dark_mode(&kv)?;
            println!("Dark mode {}", if dark { "on" } else { "off" });
        }
        Command::Status { text } => {
            let mut prefs = Preferences::load(&kv)?;
            if let Some(text) = text {
                prefs.set_status(&kv, text)?;
            }
            println!("{}", prefs.status_text);
        }
    }

    Ok(())
}
