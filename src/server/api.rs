use crate::cli::Args;
use crate::error::ChatError;
use crate::models::chat::TranscriptEntry;
use crate::models::websocket::PersonaSummary;
use crate::server::ChatState;
use crate::session::identity::Identity;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::get,
    Router,
    extract::{State, Path},
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use log::{info, error};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    write_mode: String,
}

#[derive(Serialize)]
struct TranscriptResponse {
    identity: String,
    entries: Vec<TranscriptEntry>,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let code = match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::WriteConflict { .. } => StatusCode::CONFLICT,
            ChatError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ChatError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ChatError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(ErrorBody { kind: self.kind(), message: self.to_string() })).into_response()
    }
}

pub fn router(state: Arc<ChatState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/personas", get(personas_handler))
        .route("/api/transcripts/{identity}", get(transcript_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: Arc<ChatState>,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(state);

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;
            info!("Starting HTTPS API server on: https://{}", addr);

            tokio::spawn(async move {
                let result = axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });
        }
        _ => {
            info!("Starting HTTP API server on: http://{}", addr);

            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                            error!("HTTP server error: {}", e);
                        }
                    },
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    }
                }
            });
        }
    }

    Ok(())
}

async fn health_handler(State(state): State<Arc<ChatState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        write_mode: state.controller.transcripts().write_mode().to_string(),
    })
}

async fn personas_handler(State(state): State<Arc<ChatState>>) -> Json<Vec<PersonaSummary>> {
    Json(state.personas.summaries())
}

async fn transcript_handler(
    State(state): State<Arc<ChatState>>,
    Path(identity): Path<String>,
) -> Result<Json<TranscriptResponse>, ChatError> {
    if identity.trim().is_empty() {
        return Err(ChatError::Validation("Identity cannot be empty".to_string()));
    }
    let identity = Identity::from(identity);
    let entries = state.controller.transcripts().load(&identity).await?;
    Ok(Json(TranscriptResponse {
        identity: identity.to_string(),
        entries,
    }))
}
