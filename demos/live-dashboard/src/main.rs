//! Live alert feed in the terminal.
//!
//! Run with:
//!
//! ```text
//! INFRAWATCH_EMAIL=ops@example.com INFRAWATCH_PASSWORD=secret \
//!     cargo run -p live-dashboard
//! ```
//!
//! `INFRAWATCH_API_URL` selects the backend (default
//! `http://localhost:8000/api/v1`).

use anyhow::Context;
use infrawatch_core::{ClientConfig, models::AlertQuery};
use infrawatch_sync::{InfraWatchClient, ViewStatus};
use tokio_stream::{StreamExt, wrappers::WatchStream};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let email = std::env::var("INFRAWATCH_EMAIL").context("INFRAWATCH_EMAIL is not set")?;
    let password =
        std::env::var("INFRAWATCH_PASSWORD").context("INFRAWATCH_PASSWORD is not set")?;

    let config = ClientConfig::from_env();
    let push_url = config.ws_url()?;
    tracing::info!(api = %config.api_url, push = %push_url, "starting");
    let client = InfraWatchClient::new(config)?;

    // Connects the push channel now and follows later logins/logouts.
    let driver = client.session().spawn_connection_driver();
    let user = client.session().login(&email, &password).await?;
    tracing::info!(user = %user.username, "logged in");

    let alerts = client.alerts();
    alerts.spawn_stats_reconciliation(client.config().stats_refresh_interval);
    alerts.set_query(AlertQuery::default()).await?;

    let mut connection = WatchStream::new(client.connection().watch_state());
    let mut updates = WatchStream::new(alerts.watch());
    loop {
        tokio::select! {
            Some(state) = connection.next() => {
                tracing::info!(?state, "push channel");
            }
            Some(view) = updates.next() => {
                if let ViewStatus::Error(e) = &view.status {
                    tracing::warn!(error = %e, "alert view is stale");
                }
                let stats = view.stats.unwrap_or_default();
                println!(
                    "{} alerts | active {} | acknowledged {} | resolved {}",
                    view.snapshot.total,
                    stats.total_active,
                    stats.total_acknowledged,
                    stats.total_resolved,
                );
                for alert in view.snapshot.items.iter().take(5) {
                    println!("  [{}] {} ({})", alert.status, alert.title, alert.source);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.session().logout().await;
    driver.abort();
    Ok(())
}
