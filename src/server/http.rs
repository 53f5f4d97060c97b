//! HTTP server implementation
//!
//! hyper http1 accept loop with TokioIo; manual (method, path) routing.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::MongoClient;
use crate::ledger::EngagementLedger;
use crate::projection::ProjectionReader;
use crate::routes;
use crate::types::LedgerError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub validator: JwtValidator,
    pub ledger: Arc<EngagementLedger>,
    pub reader: ProjectionReader,
    /// Present when running against MongoDB; None in memory mode
    pub mongo: Option<MongoClient>,
}

impl AppState {
    pub fn new(
        args: Args,
        validator: JwtValidator,
        ledger: Arc<EngagementLedger>,
        reader: ProjectionReader,
        mongo: Option<MongoClient>,
    ) -> Self {
        Self {
            args,
            validator,
            ledger,
            reader,
            mongo,
        }
    }

    /// Name of the store backend in use
    pub fn store_backend(&self) -> &'static str {
        if self.mongo.is_some() {
            "mongodb"
        } else {
            "memory"
        }
    }

    /// Whether the store backend answers; memory mode is always up
    pub async fn store_reachable(&self) -> bool {
        match &self.mongo {
            Some(mongo) => mongo.ping().await.is_ok(),
            None => true,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), LedgerError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "tally listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }
    if state.mongo.is_none() {
        warn!("Running against the in-memory store; data will not survive a restart");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Health probes
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)).await)
        }
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::ready_check(Arc::clone(&state)).await)
        }

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // Status endpoint with runtime info
        (Method::GET, "/status") => to_boxed(routes::status_check(Arc::clone(&state)).await),

        // Engagement API
        (_, p) if p.starts_with("/api/v1/") => {
            routes::handle_engagement_request(state, req).await
        }

        // Not found
        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Engagement routes live under /api/v1/"
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
