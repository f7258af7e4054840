pub mod dto;
pub mod handlers;
pub mod validation;

use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::{AppContext, ServiceRegistration};

fn router(context: AppContext) -> Router {
    Router::new()
        .route("/api/tasks/", post(handlers::submit_task).get(handlers::list_tasks))
        .route("/api/tasks/:id", get(handlers::get_task))
        .with_state(context)
}

/// Registers the HTTP router as one of the app runtime's services, using
/// the same `CancellationToken`-driven graceful shutdown as every other
/// service — `axum::serve(...).with_graceful_shutdown(...)`.
pub fn http_service() -> ServiceRegistration {
    ServiceRegistration::new(
        "http",
        Arc::new(|context: AppContext, token: CancellationToken| -> JoinHandle<Result<()>> {
            tokio::spawn(async move {
                let addr = format!("{}:{}", context.config().http.host, context.config().http.port);
                let listener = TcpListener::bind(&addr).await?;
                info!(%addr, "http listening");

                axum::serve(listener, router(context))
                    .with_graceful_shutdown(async move { token.cancelled().await })
                    .await?;
                Ok(())
            })
        }),
    )
}
