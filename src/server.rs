use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::{
    config::Config,
    routes::{
        alerts_handler, analyze_handler, home_handler, login_handler, migrate_passwords_handler,
        records_handler, register_handler,
    },
    state::State,
};

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(home_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/analisar", post(analyze_handler))
        .route("/registros", get(records_handler))
        .route("/alertas", get(alerts_handler))
        .route("/corrigir_senhas", get(migrate_passwords_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    info!("Initializing state...");
    let state = State::new(config).await?;

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
