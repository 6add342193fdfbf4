//! Gateway HTTP server (webhook, static results, health).

use crate::channels::{MessagingResponse, TwilioSender, TwilioWebhookForm};
use crate::config::{self, Config, SessionBackend};
use crate::conversation::ConversationTracker;
use crate::media::TwilioMediaStore;
use crate::session::{FileSessionStore, MemorySessionStore, SessionStore};
use crate::static_files::{self, ServeError, RESULT_MIME};
use crate::tryon::{GradioClient, TryOnInvoker};
use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared state for the gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub tracker: Arc<ConversationTracker>,
    /// Directory served under `/static/`.
    pub static_dir: PathBuf,
}

/// Wire the production dependencies: Twilio media store and sender, Gradio model, session store.
/// Fails when Twilio credentials are not configured.
pub async fn build_state(config: &Config, config_path: &Path) -> Result<GatewayState> {
    let credentials = config::resolve_twilio_credentials(config).context(
        "twilio credentials missing (set TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN or twilio.accountSid/authToken)",
    )?;
    let public_url = public_base_url(config);

    let static_dir = config.storage.static_dir.clone();
    let media_dir = config.storage.media_dir.clone();
    for dir in [&static_dir, &media_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating directory {}", dir.display()))?;
    }

    let sessions: Arc<dyn SessionStore> = match config.sessions.store {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        SessionBackend::File => {
            let path = config::resolve_sessions_path(config, config_path);
            log::info!("sessions persisted to {}", path.display());
            Arc::new(FileSessionStore::load(path).await)
        }
    };

    let media = Arc::new(TwilioMediaStore::new(&config.twilio.api_base, credentials.clone()));
    let model = Arc::new(
        GradioClient::new(&config.tryon, config::resolve_hf_token(config))
            .context("building try-on model client")?,
    );
    let invoker = Arc::new(
        TryOnInvoker::new(media, model, &static_dir, &media_dir)
            .with_result_retention(config.storage.result_retention()),
    );
    let outbound = Arc::new(TwilioSender::new(
        &config.twilio.api_base,
        credentials,
        config.twilio.from_number.clone(),
    ));
    let tracker = ConversationTracker::new(sessions, invoker, outbound, public_url);

    Ok(GatewayState {
        config: Arc::new(config.clone()),
        tracker: Arc::new(tracker),
        static_dir,
    })
}

/// Base for result links; falls back to the bind address when no public URL is configured.
fn public_base_url(config: &Config) -> String {
    config::resolve_public_url(config).unwrap_or_else(|| {
        let fallback = format!("http://{}:{}", config.gateway.bind, config.gateway.port);
        log::warn!(
            "no public URL configured (DRAPE_PUBLIC_URL / NGROK_URL / gateway.publicUrl); result links will use {}",
            fallback
        );
        fallback
    })
}

/// Routes: `GET /` health, `POST /` webhook, `GET /static/:filename` results.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http).post(twilio_webhook))
        .route("/static/:filename", get(serve_static))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let state = build_state(&config, &config_path).await?;
    let app = router(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /: Twilio webhook. Replies are returned as TwiML in the response body.
async fn twilio_webhook(
    State(state): State<GatewayState>,
    Form(form): Form<TwilioWebhookForm>,
) -> Response {
    let Some(msg) = form.into_inbound() else {
        log::debug!("webhook: request without From");
        return (StatusCode::BAD_REQUEST, "missing From").into_response();
    };
    log::debug!(
        "webhook: from={} media={} text={:?}",
        msg.sender,
        msg.media_url.is_some(),
        msg.text
    );
    let replies = state.tracker.handle(&msg).await;
    let body = MessagingResponse::from(replies).to_xml();
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// GET /static/:filename: result image bytes, or 404 "File not found".
async fn serve_static(
    State(state): State<GatewayState>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    match static_files::serve(&state.static_dir, &filename).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, RESULT_MIME)], bytes).into_response(),
        Err(ServeError::NotFound(_)) | Err(ServeError::InvalidName(_)) => {
            log::warn!("file not found: {}", filename);
            (StatusCode::NOT_FOUND, "File not found").into_response()
        }
        Err(e) => {
            log::error!("static: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET / returns a simple health JSON.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
