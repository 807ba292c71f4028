//! On-demand HTTP trigger: run or inspect a single recipe outside the periodic cycle.
//!
//! `GET /run/{recipe}`  → JSON [`Execution`] (report, captured output, error if any)
//! `GET /info/{recipe}` → plain-text `autopkg info` output
//!
//! Tool calls are blocking and run on tokio's blocking pool. When a notifier is configured,
//! the raw output of either route is posted as well.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::engine::executor::{Execution, RecipeTool};
use crate::notify::Notifier;

#[derive(Clone)]
pub struct HttpState {
    pub tool: Arc<dyn RecipeTool>,
    pub notifier: Option<Arc<Notifier>>,
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid recipe name {0:?}")]
    BadRecipe(String),
    #[error("{0}")]
    Tool(String),
    #[error("worker failed: {0}")]
    Worker(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::BadRecipe(_) => StatusCode::BAD_REQUEST,
            HttpError::Tool(_) => StatusCode::BAD_GATEWAY,
            HttpError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Recipe names end up in report paths; keep them to a single path component.
pub fn validate_recipe_name(recipe: &str) -> Result<(), HttpError> {
    if recipe.is_empty()
        || recipe.starts_with('.')
        || recipe.contains(['/', '\\', '\0'])
    {
        return Err(HttpError::BadRecipe(recipe.to_string()));
    }
    Ok(())
}

fn notify_output(notifier: &Option<Arc<Notifier>>, recipe: &str, output: &str) {
    if let Some(n) = notifier
        && let Err(e) = n.send_text(&format!("{recipe}:\n{output}"))
    {
        warn!("[{recipe}] notification dropped: {e:#}");
    }
}

async fn run_recipe(
    State(state): State<HttpState>,
    Path(recipe): Path<String>,
) -> Result<Json<Execution>, HttpError> {
    validate_recipe_name(&recipe)?;
    info!("[{recipe}] run requested over HTTP");
    let execution = tokio::task::spawn_blocking(move || {
        let execution = state.tool.run(&recipe);
        notify_output(&state.notifier, &recipe, &execution.output);
        execution
    })
    .await
    .map_err(|e| HttpError::Worker(e.to_string()))?;
    Ok(Json(execution))
}

async fn recipe_info(
    State(state): State<HttpState>,
    Path(recipe): Path<String>,
) -> Result<String, HttpError> {
    validate_recipe_name(&recipe)?;
    tokio::task::spawn_blocking(move || {
        let output = state
            .tool
            .info(&recipe)
            .map_err(|e| HttpError::Tool(format!("{e:#}")))?;
        notify_output(&state.notifier, &recipe, &output);
        Ok(output)
    })
    .await
    .map_err(|e| HttpError::Worker(e.to_string()))?
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/run/{recipe}", get(run_recipe))
        .route("/info/{recipe}", get(recipe_info))
        .with_state(state)
}

/// Bind `addr` now (so a bad address fails startup) and serve on a dedicated thread
/// running its own tokio runtime.
pub fn spawn_http_server(addr: SocketAddr, state: HttpState) -> Result<JoinHandle<()>> {
    let listener =
        std::net::TcpListener::bind(addr).with_context(|| format!("bind HTTP listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("set HTTP listener non-blocking")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build HTTP runtime")?;
    info!("HTTP trigger listening on {addr}");

    let handle = thread::Builder::new()
        .name("http-trigger".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(l) => l,
                    Err(e) => {
                        log::error!("HTTP listener: {e}");
                        return;
                    }
                };
                if let Err(e) = axum::serve(listener, router(state)).await {
                    log::error!("HTTP server stopped: {e}");
                }
            });
        })
        .context("spawn HTTP thread")?;
    Ok(handle)
}
