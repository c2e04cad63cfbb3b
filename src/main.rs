use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper::{
    build_router,
    config::Config,
    models::user::Role,
    services::{
        mail::LogMailer,
        token::TokenService,
        users::{InMemoryUserDirectory, UserDirectory},
    },
    AppState, RateLimiters,
};

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

fn seed_admin(config: &Config, users: &dyn UserDirectory) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    if users.find_by_email(email).is_some() {
        return Ok(());
    }
    let hash = bcrypt::hash(password, config.bcrypt_cost)?;
    let admin = users.create(email, hash, Role::Admin)?;
    users.mark_verified(admin.id);
    info!(user_id = %admin.id, "bootstrap admin created");
    Ok(())
}

fn spawn_eviction(limiters: RateLimiters) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            tick.tick().await;
            let now = std::time::Instant::now();
            for limiter in limiters.all() {
                limiter.evict_idle(now);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);
    let tokens = Arc::new(TokenService::from_config(&config)?);

    let users = Arc::new(InMemoryUserDirectory::new());
    seed_admin(&config, users.as_ref())?;

    if !config.cookie.secure {
        warn!("COOKIE_SECURE is off; enable it for any deployment terminating TLS");
    }

    let state = AppState::new(config.clone(), tokens, users, Arc::new(LogMailer));
    for limiter in state.limiters.all() {
        let settings = limiter.settings();
        info!(
            limiter = limiter.name(),
            capacity = settings.capacity,
            refill_every = ?settings.refill_every,
            "rate limiter configured"
        );
    }
    spawn_eviction(state.limiters.clone());

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("gatekeeper API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
