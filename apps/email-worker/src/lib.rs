//! Email service.
//!
//! A background worker that turns bus messages into SMTP sends:
//!
//! ```text
//! auth / daily topics (durable consumer group `emailsend`)
//!   ↓ messaging::Worker — claim loop, ack after dispatch
//! MailProcessor — decode, render template, pick the day's photo
//!   ↓ at most 10 concurrent SMTP connections
//! SmtpProvider (lettre, STARTTLS)
//! ```
//!
//! Shutdown is cooperative: the claim loops exit on SIGINT/SIGTERM and the
//! worker drains every in-flight SMTP send before the process returns.

use core_config::nats::NatsConfig;
use core_config::{env_or_default, Environment, FromEnv};
use email::{
    resolve_main_service_location, ImagePicker, MailProcessor, SmtpConfig, SmtpProvider,
    TemplateEngine, MAX_CONNS,
};
use eyre::{Result, WrapErr};
use messaging::{BusLogWriter, Worker, AUTH_TOPIC, CONSUMER_GROUP, DAILY_TOPIC};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Run the email worker.
///
/// 1. Sets up structured logging fanned out to stderr and the `logs` topic
/// 2. Connects to the broker with startup retries
/// 3. Loads the SMTP relay settings (email-info CSV, or `SMTP_*` env vars)
/// 4. Joins the `emailsend` consumer group on `auth` and `daily` and
///    processes messages until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error when the broker stays unreachable after the retry
/// budget, when the SMTP/image/location configuration is invalid, or when
/// the consumer setup fails.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    let log_writer = BusLogWriter::new();
    core_config::tracing::init_tracing_with_writer(&environment, log_writer.clone());

    info!("Starting email service");

    let nats_config = NatsConfig::from_env()?;
    let jetstream = messaging::connect_with_retry(&nats_config.servers)
        .await
        .wrap_err("All attempts to connect to message broker have failed")?;
    messaging::ensure_streams(&jetstream)
        .await
        .wrap_err("Failed to set up bus streams")?;
    log_writer.attach(jetstream.clone());

    let smtp_config = if std::env::var("SMTP_HOST").is_ok() {
        SmtpConfig::from_env()?
    } else {
        let path = env_or_default("GWM_EMAIL_INFO_FILE", "./emailinfo.csv");
        SmtpConfig::from_csv_file(&path)?
    };
    info!(host = %smtp_config.host, port = smtp_config.port, "SMTP relay configured");
    let provider = SmtpProvider::new(smtp_config)?;

    let location = env_or_default("GWM_MAIN_SERVICE_LOCATION", "localhost:8081");
    let service_location = resolve_main_service_location(&location)?;
    info!(location = %service_location, "Main service location resolved");

    let image_directory = env_or_default("GWM_IMAGE_DIRECTORY", "./img");
    let images = ImagePicker::new(image_directory)?;

    let templates = TemplateEngine::new()?;
    let processor = MailProcessor::new(provider, templates, images, service_location);

    let worker = Worker::new(
        &jetstream,
        &[AUTH_TOPIC, DAILY_TOPIC],
        CONSUMER_GROUP,
        processor,
        MAX_CONNS,
    )
    .await
    .wrap_err("Failed to create consumer worker")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    worker
        .run(shutdown_rx)
        .await
        .wrap_err("Consumer worker failed")?;

    info!("Email service stopped");
    Ok(())
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
