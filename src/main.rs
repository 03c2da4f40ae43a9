use mimalloc::MiMalloc;
use resident_portal::config::CONFIG;
use resident_portal::db::JsonFileStore;
use resident_portal::router::{PortalState, portal_router};
use resident_portal::service::bootstrap::{self, AdminSeed};
use resident_portal::service::mailer::{MailService, MailSettings};
use resident_portal::service::store_actor;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.listen_addr,
        data_dir = %cfg.data_dir.display(),
        storage_mode = ?cfg.storage_mode,
        base_url = %cfg.base_url,
        mail_relay = %cfg.mail_relay_url.as_ref().map(|u| u.as_str()).unwrap_or("<preview>"),
        loglevel = %cfg.loglevel
    );
    if cfg.jwt_secret == resident_portal::config::Config::default().jwt_secret {
        warn!("PORTAL_JWT_SECRET is not set; using the built-in development secret");
    }

    let store = store_actor::spawn(JsonFileStore::new(&cfg.data_dir), cfg.storage_mode).await?;

    let seed = cfg.seed_admin.then(|| AdminSeed {
        email: cfg.admin_email.clone(),
        password: cfg.admin_password.clone(),
        name: cfg.admin_name.clone(),
    });
    bootstrap::run(&store, seed.as_ref()).await?;

    let mailer = MailService::new(MailSettings {
        relay_url: cfg.mail_relay_url.clone(),
        from: cfg.mail_from.clone(),
        per_minute: cfg.mail_per_minute,
        concurrency: cfg.mail_concurrency,
    })?;

    // Build axum router and serve
    let state = PortalState::new(store, mailer, cfg);
    let app = portal_router(state);

    let listener = TcpListener::bind(cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
