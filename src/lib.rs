#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod storage;
pub mod telemetry;

use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::chat_service::ChatService;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::identity_service::IdentityService;
use crate::services::session_registry::SessionRegistry;
use crate::storage::DbPool;
use crate::storage::announcement_repo::{PgTransportDirectory, TransportDirectory};
use crate::storage::conversation_repo::{ConversationStore, PgConversationStore};
use crate::storage::user_repo::{PgUserDirectory, UserDirectory};
use std::sync::Arc;
use tokio::sync::watch;

/// Fully wired application components, ready to be mounted on routers.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub registry: SessionRegistry,
}

/// Wires stores, the session registry and services from already initialised resources.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// # Errors
    /// Returns an error if no database pool was supplied.
    pub fn build(self) -> anyhow::Result<App> {
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("database pool is required"))?;
        let config = self.config;

        let users: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool.clone()));
        let transports: Arc<dyn TransportDirectory> = Arc::new(PgTransportDirectory::new(pool.clone()));
        let store: Arc<dyn ConversationStore> = Arc::new(PgConversationStore::new(pool.clone()));

        let registry = SessionRegistry::new(config.websocket.outbound_buffer_size);

        let identity_service = IdentityService::new(Arc::clone(&users), config.auth.jwt_secret.clone());
        let chat_service = ChatService::new(store, users, transports, registry.clone(), config.chat.clone());
        let gateway_service = GatewayService::new(chat_service.clone(), registry.clone(), config.websocket.clone());
        let health_service = HealthService::new(pool, registry.clone(), config.health.clone());

        Ok(App {
            services: ServiceContainer { identity_service, chat_service, gateway_service },
            health_service,
            registry,
        })
    }
}

/// Applies pending schema migrations.
///
/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

/// Flips `shutdown_tx` to `true` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received, draining connections");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through `tracing` so they reach the configured log sink.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();

        tracing::error!(panic.location = %location, panic.payload = %payload, "Panic occurred");
        default_hook(info);
    }));
}
