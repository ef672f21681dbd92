//! HTTP transport.
//!
//! ## Endpoints
//!
//! - `POST /run` - Execute code, returns `{output, error}`
//! - `GET /languages` - Supported and executable languages
//! - `GET /health` - Health check
//! - `GET /` - Server info

use crate::config::{ServerConfig, MAX_BODY_BYTES};
use crate::error::ApiError;
use crate::types::{LanguagesResponse, RunRequest, RunResponse};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::HeaderValue,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use kiln_core::{ExecutionRequest, Executor};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the HTTP router.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(executor: Executor, config: &ServerConfig) -> Router {
    tracing::debug!("Building HTTP router");

    let router = Router::new()
        .route("/run", post(run_handler))
        .route("/languages", get(languages_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .with_state(executor)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    tracing::debug!("HTTP router built with routes: /, /health, /languages, /run");
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| tracing::warn!(%origin, error = %e, "Ignoring invalid CORS origin"))
                .ok()
        }))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Execute submitted code.
async fn run_handler(
    State(executor): State<Executor>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Run request body rejected");
        ApiError::from(rejection)
    })?;
    tracing::debug!(
        language = %request.language,
        code_len = request.code.len(),
        "Run request"
    );
    let request = ExecutionRequest::from(request);
    match executor.execute(&request).await {
        Ok(result) => Ok(Json(result.into())),
        Err(e) => {
            tracing::debug!(language = %request.language, error = %e, "Run request rejected");
            Err(e.into())
        }
    }
}

/// List supported and executable languages.
async fn languages_handler(State(executor): State<Executor>) -> Json<LanguagesResponse> {
    let registry = executor.registry();
    Json(LanguagesResponse {
        supported: registry.languages().to_vec(),
        executable: registry.executable_languages(),
    })
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "kiln-server"
    }))
}

/// Root endpoint with server info.
async fn root_handler() -> impl IntoResponse {
    tracing::trace!("Root page request");
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Kiln</title>
    <style>
        body { font-family: system-ui; max-width: 800px; margin: 50px auto; padding: 20px; }
        code { background: #f4f4f4; padding: 2px 6px; border-radius: 3px; }
        pre { background: #f4f4f4; padding: 16px; border-radius: 6px; overflow-x: auto; }
    </style>
</head>
<body>
    <h1>Kiln</h1>
    <p>Compile and run code snippets in Python, JavaScript, Java, C, C++ and SQL.</p>

    <h2>Endpoints</h2>
    <ul>
        <li><code>POST /run</code> - Execute code</li>
        <li><code>GET /languages</code> - Supported languages</li>
        <li><code>GET /health</code> - Health check</li>
    </ul>

    <h2>Example</h2>
    <pre>curl -X POST http://localhost:8000/run \
  -H "Content-Type: application/json" \
  -d '{"language":"python","code":"print(42)"}'</pre>
</body>
</html>"#,
    )
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    executor: Executor,
    config: &ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(executor, config);
    let addr = config.http_addr;

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::ExecutorConfig;

    #[test]
    fn test_build_router() {
        let executor = Executor::new(ExecutorConfig::default());
        let _router = build_router(executor, &ServerConfig::default());
        // Router builds without panic
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_bad_origins() {
        let _any = cors_layer(&["*".to_string()]);
        let _list = cors_layer(&["http://ok.example".to_string(), "bad\norigin".to_string()]);
    }
}
