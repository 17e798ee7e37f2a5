//! DocFinder client CLI.
//!
//! Wires the session cache bridge and the real-time connection manager
//! together behind a small command-line surface: authenticate, inspect the
//! session, listen for document events, publish events.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dialoguer::Password;
use tracing_subscriber::EnvFilter;

use docfinder_core::config::ClientConfig;
use docfinder_core::error::AppError;
use docfinder_core::traits::credentials::CredentialSource;
use docfinder_core::traits::store::KeyValueStore;
use docfinder_realtime::{ConnectionEvent, ConnectionManager, PublishOutcome, WsTransport};
use docfinder_session::api::{ApiClient, HttpAuthApi, LoginRequest, RegisterRequest};
use docfinder_session::{SessionBridge, SessionState, SessionStore};
use docfinder_store::StoreManager;

#[derive(Debug, Parser)]
#[command(name = "docfinder", version, about = "DocFinder lost-and-found document client")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and cache the credential pair.
    Login {
        /// Email address.
        email: String,
    },
    /// Register a new account and log in.
    Register {
        /// Email address.
        email: String,
        /// Display name.
        #[arg(long)]
        display_name: String,
    },
    /// Log out and delete the cached credential.
    Logout,
    /// Show the current session state.
    Status,
    /// Subscribe to document events on a namespace and print them.
    Listen {
        /// Namespace to join.
        namespace: String,
        /// Connect without credentials even when signed in.
        #[arg(long)]
        guest: bool,
    },
    /// Publish an event on a namespace.
    Emit {
        /// Namespace to join.
        namespace: String,
        /// Event name.
        event: String,
        /// JSON payload.
        #[arg(long)]
        payload: Option<String>,
        /// Await an acknowledgement and print the reply.
        #[arg(long)]
        ack: bool,
        /// Connect without credentials even when signed in.
        #[arg(long)]
        guest: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
fn load_configuration() -> Result<ClientConfig, AppError> {
    let env = std::env::var("DOCFINDER_ENV").unwrap_or_else(|_| "development".to_string());
    ClientConfig::load(&env)
}

/// Initialize tracing/logging.
fn init_logging(config: &ClientConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> anyhow::Result<()> {
    let store = Arc::new(StoreManager::new(&config.store).await?);
    let session = Arc::new(SessionStore::new());
    let api = Arc::new(HttpAuthApi::new(ApiClient::new(&config.api)?));
    let bridge = SessionBridge::new(
        Arc::clone(&session),
        api,
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
    );

    bridge.restore_on_startup().await;

    match cli.command {
        Command::Login { email } => {
            let password = Password::new().with_prompt("Password").interact()?;
            let user = bridge
                .login(LoginRequest { email, password })
                .await
                .map_err(report_field_errors)?;
            println!("Logged in as {} ({})", user.display_name, user.role);
        }
        Command::Register {
            email,
            display_name,
        } => {
            let password = Password::new()
                .with_prompt("Password")
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()?;
            let user = bridge
                .register(RegisterRequest {
                    email,
                    display_name,
                    password,
                })
                .await
                .map_err(report_field_errors)?;
            println!("Registered and logged in as {} ({})", user.display_name, user.role);
        }
        Command::Logout => {
            bridge.logout().await?;
            println!("Logged out.");
        }
        Command::Status => match session.snapshot() {
            SessionState::Guest => println!("Not signed in (guest)."),
            SessionState::Restoring { .. } => println!("Session restoration in flight."),
            SessionState::Authenticated { user, credentials } => {
                println!("Signed in as {} <{}> ({})", user.display_name, user.email, user.role);
                if let Some(expires_at) = credentials.expires_at {
                    println!("Access token expires at {expires_at}");
                }
            }
            SessionState::Invalid { reason, .. } => {
                println!("Cached credential failed validation: {reason}");
                println!("Run `docfinder logout` to clear it.");
            }
        },
        Command::Listen { namespace, guest } => {
            let manager = build_manager(&config, &session);
            let mut events = manager.subscribe_events();
            let use_auth = !guest && session.is_authenticated();
            manager.open(&namespace, use_auth).await;

            for event_name in ["document.reported", "document.matched", "document.claimed"] {
                manager
                    .add_listener(event_name, move |payload| {
                        println!("{event_name}: {payload}");
                    })
                    .await?;
            }

            println!("Listening on '{namespace}' (authenticated: {use_auth}). Ctrl-C to stop.");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(event) => print_connection_event(&event),
                        Err(_) => break,
                    },
                }
            }
            manager.close().await;
        }
        Command::Emit {
            namespace,
            event,
            payload,
            ack,
            guest,
        } => {
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Invalid --payload JSON: {e}"))?,
                None => serde_json::Value::Null,
            };

            let manager = build_manager(&config, &session);
            let mut events = manager.subscribe_events();
            let use_auth = !guest && session.is_authenticated();
            manager.open(&namespace, use_auth).await;

            // Give the transport one handshake window before publishing.
            let connected = tokio::time::timeout(
                Duration::from_secs(config.realtime.handshake_timeout_seconds + 2),
                async {
                    loop {
                        match events.recv().await {
                            Ok(ConnectionEvent::Connected { .. }) => break true,
                            Ok(ConnectionEvent::ConnectError { .. }) | Err(_) => break false,
                            Ok(_) => continue,
                        }
                    }
                },
            )
            .await
            .unwrap_or(false);

            if !connected {
                tracing::warn!(namespace, "Connection did not come up in time");
            }

            if ack {
                match manager.publish_with_ack(&event, payload).await? {
                    Some(reply) => println!("{reply}"),
                    None => println!("Not connected; event was not sent."),
                }
            } else {
                match manager.publish(&event, payload).await {
                    PublishOutcome::Sent => println!("Sent."),
                    PublishOutcome::NotConnected => {
                        println!("Not connected; event was not sent.")
                    }
                }
            }
            manager.close().await;
        }
    }

    Ok(())
}

/// Build a connection manager over the WebSocket transport, using the
/// session store as the credential source for authenticated handshakes.
fn build_manager(config: &ClientConfig, session: &Arc<SessionStore>) -> ConnectionManager {
    let transport = Arc::new(WsTransport::new(config.realtime.clone()));
    ConnectionManager::new(
        transport,
        Some(Arc::clone(session) as Arc<dyn CredentialSource>),
    )
}

fn print_connection_event(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::Connected { namespace } => println!("[connected to '{namespace}']"),
        ConnectionEvent::Disconnected { namespace } => {
            println!("[disconnected from '{namespace}', transport is retrying]")
        }
        ConnectionEvent::ConnectError { namespace, reason } => {
            println!("[connection error on '{namespace}': {reason}]")
        }
        ConnectionEvent::PublishSkipped { event } => {
            println!("[not connected, '{event}' was not sent]")
        }
    }
}

/// Print field-scoped API errors under the top-level message.
fn report_field_errors(error: AppError) -> anyhow::Error {
    for (field, messages) in &error.field_errors {
        for message in messages {
            eprintln!("  {field}: {message}");
        }
    }
    anyhow::Error::new(error)
}
