mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use contactbook_api::clock::SystemClock;
use contactbook_api::mailer::{HttpMailer, LogMailer, Mailer};
use contactbook_api::password::Argon2Hasher;
use contactbook_api::{AppStateInner, router};
use contactbook_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "contactbook=debug,contactbook_api=debug,contactbook_db=debug,tower_http=debug"
                        .into()
                }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;

    let mailer: Arc<dyn Mailer> = match &config.mail_relay_url {
        Some(url) => {
            info!("Mail goes through relay at {}", url);
            Arc::new(HttpMailer::new(url.clone(), config.mail_relay_key.clone())?)
        }
        None => {
            info!("No mail relay configured, reset mail is written to the log");
            Arc::new(LogMailer)
        }
    };

    let state = Arc::new(AppStateInner::new(
        db,
        Arc::new(Argon2Hasher::new()),
        mailer,
        Arc::new(SystemClock),
        config.service.clone(),
    ));

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("contactbook listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
