use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripbook_api::{app, AppState, AuthConfig};
use tripbook_core::CapacityReconciler;
use tripbook_store::app_config::Config;
use tripbook_store::{seed, DbClient, PgReservationRepository, PgTripRepository, PgUserRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripbook_api=debug,tripbook_store=debug,tripbook_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting Tripbook API on port {} (overbooking policy: {:?})",
        config.server.port,
        config.business_rules.overbooking_policy
    );

    // Postgres Connection
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let reconciler = CapacityReconciler::new(config.business_rules.overbooking_policy);
    let trip_repo = Arc::new(PgTripRepository::new(db.pool.clone(), reconciler));
    let reservation_repo = Arc::new(PgReservationRepository::new(db.pool.clone(), reconciler));
    let user_repo = Arc::new(PgUserRepository::new(db.pool.clone()));

    if config.database.seed_sample_trips {
        let seeded = seed::seed_sample_trips(trip_repo.as_ref()).await?;
        tracing::info!("Seeded {} sample trips", seeded);
    }

    match (&config.auth.admin_email, &config.auth.admin_password) {
        (Some(email), Some(password)) => {
            seed::seed_admin_account(user_repo.as_ref(), email, password)
                .await
                .context("Failed to create admin account")?;
        }
        (None, None) => {}
        _ => tracing::warn!("auth.admin_email and auth.admin_password must be set together; no admin created"),
    }

    let app_state = AppState::new(
        trip_repo,
        reservation_repo,
        user_repo,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
