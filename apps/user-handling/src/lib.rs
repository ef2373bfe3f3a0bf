//! User-Handling service.
//!
//! Owns the authoritative subscriber set and the confirmation flow:
//!
//! ```text
//! gRPC (AddUser / DeleteUser)
//!   ↓ mint confirmation key (Redis, 15 min TTL)
//!   ↓ publish "email key method" to the auth topic
//! Email service sends the confirmation link
//!   ↓ user clicks → gateway calls AuthUser(key)
//!   ↓ apply the pending operation to Postgres, evict the listing cache
//! ```
//!
//! A daily scheduler runs beside the server and fans one `daily` message
//! per subscriber onto the bus at the configured wall-clock time.

pub mod config;
pub mod scheduler;
pub mod service;

use std::sync::Arc;

use core_config::nats::NatsConfig;
use core_config::postgres::PostgresConfig;
use core_config::redis::RedisConfig;
use core_config::server::ServerConfig;
use core_config::{Environment, FromEnv};
use data::{retry_with_backoff, PgUserStore, PostgresRedisData, RedisCache, RetryConfig};
use eyre::{Result, WrapErr};
use messaging::{BusLogWriter, BusPublisher};
use rpc::watermelon::v1::user_handling_server::UserHandlingServer;
use tokio::signal;
use tokio::sync::watch;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::{error, info};

use crate::config::{DeliveryConfig, TlsConfig};
use crate::scheduler::DailyScheduler;
use crate::service::UserHandlingService;

/// Run the user-handling service.
///
/// 1. Sets up structured logging fanned out to stderr and the `logs` topic
/// 2. Connects to the broker, cache and database with startup retries
/// 3. Spawns the daily delivery scheduler
/// 4. Serves the UserHandling gRPC API until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error when any infrastructure connection stays down after
/// the retry budget, when configuration is invalid, or when the gRPC
/// server fails.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    let log_writer = BusLogWriter::new();
    core_config::tracing::init_tracing_with_writer(&environment, log_writer.clone());

    info!("Starting user-handling service");

    // Broker first: the log writer starts fanning out as soon as it exists.
    let nats_config = NatsConfig::from_env()?;
    let jetstream = messaging::connect_with_retry(&nats_config.servers)
        .await
        .wrap_err("All attempts to connect to message broker have failed")?;
    messaging::ensure_streams(&jetstream)
        .await
        .wrap_err("Failed to set up bus streams")?;
    log_writer.attach(jetstream.clone());

    let redis_config = RedisConfig::from_env()?;
    let cache = retry_with_backoff(
        || RedisCache::connect(&redis_config.url),
        RetryConfig::default(),
    )
    .await
    .wrap_err("All attempts to connect to cache have failed")?;

    let postgres_config = PostgresConfig::from_env()?;
    let store = retry_with_backoff(
        || PgUserStore::connect(&postgres_config.dsn),
        RetryConfig::default(),
    )
    .await
    .wrap_err("All attempts to connect to database have failed")?;

    let data = Arc::new(PostgresRedisData::new(cache, store));
    let publisher = Arc::new(BusPublisher::new(jetstream));

    let delivery = DeliveryConfig::from_env()?;
    info!(
        "Set delivery time: {}:{:02}:{:02}, interval: {:?}",
        delivery.hour, delivery.minute, delivery.second, delivery.interval
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    let scheduler = DailyScheduler::new(data.clone(), publisher.clone(), delivery);
    let scheduler_rx = shutdown_rx.clone();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_rx).await });

    let server_config = ServerConfig::from_env()?;
    let addr: std::net::SocketAddr = server_config
        .address()
        .parse()
        .wrap_err_with(|| format!("Failed to parse server address: {}", server_config.address()))?;

    let mut builder = Server::builder();
    let tls = TlsConfig::from_env()?;
    if tls.enabled {
        builder = builder
            .tls_config(load_tls_config(&tls)?)
            .wrap_err("Failed to apply TLS configuration")?;
        info!("Mutual TLS enabled on the gRPC listener");
    }

    let service = UserHandlingService::new(data, publisher);
    info!("UserHandling service listening on {}", addr);

    let mut server_shutdown = shutdown_rx;
    builder
        .add_service(UserHandlingServer::new(service))
        .serve_with_shutdown(addr, async move {
            loop {
                if server_shutdown.changed().await.is_err() {
                    break;
                }
                if *server_shutdown.borrow() {
                    break;
                }
            }
        })
        .await
        .wrap_err("gRPC server failed")?;

    // Let the scheduler unwind before reporting a clean stop.
    let _ = scheduler_handle.await;
    info!("User-handling service stopped");
    Ok(())
}

/// Load the mutual-TLS material: our identity plus the CA that client
/// certificates must chain to.
fn load_tls_config(tls: &TlsConfig) -> Result<ServerTlsConfig> {
    let cert = std::fs::read_to_string(&tls.cert_path)
        .wrap_err_with(|| format!("Failed to read certificate {}", tls.cert_path))?;
    let key = std::fs::read_to_string(&tls.key_path)
        .wrap_err_with(|| format!("Failed to read private key {}", tls.key_path))?;
    let ca = std::fs::read_to_string(&tls.ca_path)
        .wrap_err_with(|| format!("Failed to read CA certificate {}", tls.ca_path))?;

    Ok(ServerTlsConfig::new()
        .identity(Identity::from_pem(cert, key))
        .client_ca_root(Certificate::from_pem(ca)))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
