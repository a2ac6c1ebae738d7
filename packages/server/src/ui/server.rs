//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{delete, get, post},
};
use switchboard_shared::time::Clock;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::RealtimeConfig,
    infrastructure::{
        dispatcher::BroadcastDispatcher, heartbeat::HeartbeatMonitor,
        registry::ConnectionRegistry, token::TokenIssuer,
    },
    usecase::{
        AdminBroadcastUseCase, AdminQueryUseCase, DisconnectUseCase, IssueTokenUseCase,
        NotifyUseCase, OpenStreamUseCase, SendEventUseCase,
    },
};

use super::{
    handler::{
        admin_broadcast, admin_notify, disconnect_connection, get_stats, health_check,
        issue_token, list_connections, list_rooms, send_event, stream_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Realtime SSE server
///
/// # Example
///
/// ```ignore
/// let server = Server::from_config(RealtimeConfig::new(secret), Arc::new(SystemClock));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    registry: Arc<ConnectionRegistry>,
    heartbeat: Arc<HeartbeatMonitor>,
}

impl Server {
    pub fn new(
        state: Arc<AppState>,
        registry: Arc<ConnectionRegistry>,
        heartbeat: Arc<HeartbeatMonitor>,
    ) -> Self {
        Self {
            state,
            registry,
            heartbeat,
        }
    }

    /// Wire every component from the configuration.
    pub fn from_config(config: RealtimeConfig, clock: Arc<dyn Clock>) -> Self {
        // Initialize dependencies in order:
        // 1. TokenIssuer / ConnectionRegistry
        // 2. BroadcastDispatcher / HeartbeatMonitor
        // 3. UseCases
        // 4. AppState

        // 1. Tokens and the registry (retired ids outlive every token)
        let issuer = Arc::new(TokenIssuer::new(
            config.token_secret.as_bytes(),
            config.token_ttl_secs,
            clock.clone(),
        ));
        let registry = Arc::new(ConnectionRegistry::new(
            clock.clone(),
            config.retired_retention_millis(),
        ));

        // 2. Dispatch and liveness
        let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone()));
        let heartbeat = Arc::new(HeartbeatMonitor::new(
            registry.clone(),
            clock.clone(),
            config.heartbeat_interval,
        ));

        // 3. UseCases
        let issue_token_usecase = Arc::new(IssueTokenUseCase::new(issuer.clone()));
        let open_stream_usecase = Arc::new(OpenStreamUseCase::new(
            issuer,
            registry.clone(),
            dispatcher.clone(),
            clock.clone(),
            config.clone(),
        ));
        let send_event_usecase = Arc::new(SendEventUseCase::new(
            registry.clone(),
            dispatcher.clone(),
            clock.clone(),
            config.max_event_bytes,
        ));
        let disconnect_usecase = Arc::new(DisconnectUseCase::new(registry.clone()));
        let admin_broadcast_usecase =
            Arc::new(AdminBroadcastUseCase::new(dispatcher.clone(), clock.clone()));
        let notify_usecase = Arc::new(NotifyUseCase::new(dispatcher, clock));
        let admin_query_usecase = Arc::new(AdminQueryUseCase::new(registry.clone()));

        // 4. AppState
        let state = Arc::new(AppState {
            issue_token_usecase,
            open_stream_usecase,
            send_event_usecase,
            disconnect_usecase,
            admin_broadcast_usecase,
            notify_usecase,
            admin_query_usecase,
        });

        Self::new(state, registry, heartbeat)
    }

    /// Notification entry point for in-process collaborators.
    pub fn notify_usecase(&self) -> Arc<NotifyUseCase> {
        self.state.notify_usecase.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            // SSE エンドポイント
            .route("/api/realtime/stream", get(stream_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/realtime/token", post(issue_token))
            .route(
                "/api/realtime/connections/{connection_id}/events",
                post(send_event),
            )
            .route("/api/realtime/admin/broadcast", post(admin_broadcast))
            .route("/api/realtime/admin/notify", post(admin_notify))
            .route("/api/realtime/admin/connections", get(list_connections))
            .route(
                "/api/realtime/admin/connections/{connection_id}",
                delete(disconnect_connection),
            )
            .route("/api/realtime/admin/rooms", get(list_rooms))
            .route("/api/realtime/admin/stats", get(get_stats))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the realtime server until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Realtime server listening on {}", listener.local_addr()?);
        tracing::info!("Stream endpoint: http://{}/api/realtime/stream", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Open streams are closed when `shutdown` resolves so that the graceful
    /// shutdown does not wait on them.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let heartbeat = self.heartbeat.clone().spawn();
        let registry = self.registry.clone();

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            let closed = registry.remove_all();
            tracing::info!("Closed {} open streams", closed);
        })
        .await;

        heartbeat.abort();
        result
    }
}
