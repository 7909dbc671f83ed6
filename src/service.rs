// ABOUTME: HTTP wiring for the bot host: one POST route per registered bot plus /health
// ABOUTME: Installs panic catching, error-response logging and request tracing exactly once

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use teambots_core::{MemoryStorage, RegistryError};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::adapter::{panic_message, BotAdapter};
use crate::config::Config;
use crate::registry::{BotRef, BotRegistry, HEALTH_ROUTE};

/// Bots waiting to be mounted plus the registry they end up in
pub struct BotService {
    registry: BotRegistry,
    pending: Vec<BotRef>,
    health_route: bool,
    configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotSummary {
    pub name: String,
    pub route: String,
    pub kind: String,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub bots: Vec<BotSummary>,
}

impl BotService {
    pub fn new(registry: BotRegistry) -> Self {
        Self {
            registry,
            pending: Vec::new(),
            health_route: true,
            configured: false,
        }
    }

    /// Queue a bot for the next `setup`
    pub fn with_bot(mut self, bot: BotRef) -> Self {
        self.pending.push(bot);
        self
    }

    pub fn with_bots(mut self, bots: impl IntoIterator<Item = BotRef>) -> Self {
        self.pending.extend(bots);
        self
    }

    /// Leave `/health` to the host application
    pub fn without_health_route(mut self) -> Self {
        self.health_route = false;
        self
    }

    pub fn registry(&self) -> &BotRegistry {
        &self.registry
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Mount every queued bot on `app`.
    ///
    /// Registrations with an invalid name or route are logged and skipped.
    /// Duplicate names, duplicate routes and routes already present on `app`
    /// abort setup with nothing mounted, leaving the queue intact. Calls
    /// after a successful setup return `app` unchanged.
    pub fn setup(&mut self, app: Router) -> Result<Router> {
        if self.configured {
            tracing::info!("Bot routes already configured, skipping setup");
            return Ok(app);
        }

        let mounted_before = self.registry.len();
        match self.mount(app) {
            Ok(app) => {
                self.pending.clear();
                self.configured = true;
                tracing::info!(bots = self.registry.len(), "Bot routes configured");
                Ok(app)
            }
            Err(e) => {
                self.registry.truncate(mounted_before);
                tracing::error!(error = %format!("{:#}", e), "Bot setup failed, nothing mounted");
                Err(e)
            }
        }
    }

    fn mount(&mut self, app: Router) -> Result<Router> {
        for bot in self.pending.iter().cloned() {
            let requested = bot.name().to_string();
            match self.registry.register(bot) {
                Ok(_) => {}
                Err(RegistryError::InvalidInput(reason)) => {
                    tracing::warn!(bot = %requested, reason = %reason, "Skipping invalid bot registration");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to register bot {}", requested));
                }
            }
        }

        let mut routes = Router::new();
        for entry in self.registry.entries() {
            routes = routes.route(
                &entry.route,
                post(handle_activity).with_state(Arc::clone(&entry.adapter)),
            );
        }
        if self.health_route {
            let report = Arc::new(self.health_report());
            routes = routes.merge(
                Router::new()
                    .route(HEALTH_ROUTE, get(health_handler))
                    .with_state(report),
            );
        }

        // axum reports overlapping routes by panicking
        let app = std::panic::catch_unwind(AssertUnwindSafe(|| app.merge(routes))).map_err(
            |panic| {
                anyhow::anyhow!(
                    "bot routes conflict with the host router: {}",
                    panic_message(&*panic)
                )
            },
        )?;

        Ok(app
            .layer(middleware::from_fn(log_error_responses))
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http()))
    }

    pub fn health_report(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            bots: self
                .registry
                .entries()
                .iter()
                .map(|e| BotSummary {
                    name: e.name.clone(),
                    route: e.route.clone(),
                    kind: e.kind.clone(),
                    authenticated: !e.credentials.is_anonymous(),
                })
                .collect(),
        }
    }
}

async fn handle_activity(
    State(adapter): State<Arc<BotAdapter>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    adapter.process(auth_header, &body).await
}

async fn health_handler(State(report): State<Arc<HealthReport>>) -> Json<HealthReport> {
    Json(report.as_ref().clone())
}

async fn log_error_responses(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        tracing::error!(method = %method, path = %path, status = %status, "Request failed");
    } else if status.is_client_error() {
        tracing::warn!(method = %method, path = %path, status = %status, "Request rejected");
    }
    response
}

/// Build the service from config and serve until Ctrl-C
pub async fn serve(config: Config) -> Result<()> {
    let registry = BotRegistry::new(
        Arc::new(config.settings()),
        Arc::new(MemoryStorage::new()),
    );
    let mut service = BotService::new(registry).with_bots(config.bot_refs());
    let app = service.setup(Router::new())?;

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, bots = service.registry().len(), "Bot host listening");
    for entry in service.registry().entries() {
        tracing::info!(bot = %entry.name, route = %entry.route, "Serving bot");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Bot host server failed")?;

    tracing::info!("Bot host stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
