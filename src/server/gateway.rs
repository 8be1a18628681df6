//! HTTP API Gateway
//!
//! Routes the three public endpoints onto [`FizzBuzzService`] and encodes
//! every outcome as JSON:
//!
//! | Method | Path          | Handler                     |
//! |--------|---------------|-----------------------------|
//! | POST   | `/fizzbuzz`   | generate a sequence         |
//! | GET    | `/statistics` | most frequent request       |
//! | GET    | `/health`     | liveness probe              |
//!
//! Each request is logged on completion, and a panic while handling one is
//! turned into a 500 response instead of tearing down the connection.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::ServiceError;
use crate::query::FizzBuzzQuery;
use crate::service::FizzBuzzService;

/// Header carrying the request identifier in both directions.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied request id that is echoed back.
const MAX_REQUEST_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while running the HTTP gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Failed to bind the TCP listener.
    #[error("Failed to bind to {0}: {1}")]
    BindFailed(String, std::io::Error),

    /// Listener I/O failure after startup.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared state handed to every request.
pub struct GatewayState {
    service: Arc<FizzBuzzService>,
    max_body_size: usize,
    next_request_id: AtomicU64,
}

impl GatewayState {
    /// Create gateway state around `service`.
    pub fn new(service: Arc<FizzBuzzService>, max_body_size: usize) -> Self {
        Self {
            service,
            max_body_size,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// The service behind the gateway.
    pub fn service(&self) -> &Arc<FizzBuzzService> {
        &self.service
    }

    /// Identifier for `req`: the client's `x-request-id` when usable,
    /// otherwise a fresh one.
    fn request_id<B>(&self, req: &Request<B>) -> String {
        req.headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| {
                let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
                format!("req-{id:08x}")
            })
    }
}

// ---------------------------------------------------------------------------
// Request handling
// ---------------------------------------------------------------------------

/// Serve one request: route it, recover from panics and log the outcome.
pub async fn serve_request<B>(
    req: Request<B>,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = state.request_id(&req);

    let mut response =
        recover_panics(handle_request(req, &state), &method, &path, &request_id).await;
    cors_headers(&mut response);
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        remote_addr = %remote_addr,
        "request completed"
    );

    response
}

/// Run `handler`, answering 500 with the request id if it panics.
async fn recover_panics<F>(
    handler: F,
    method: &Method,
    path: &str,
    request_id: &str,
) -> Response<Full<Bytes>>
where
    F: Future<Output = Response<Full<Bytes>>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            error!(
                request_id = %request_id,
                panic = %panic_message(panic.as_ref()),
                method = %method,
                path = %path,
                "panic recovered"
            );
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": "internal server error",
                    "request_id": request_id,
                }),
            )
        }
    }
}

/// Route an incoming HTTP request to the appropriate handler.
async fn handle_request<B>(req: Request<B>, state: &GatewayState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        // CORS preflight
        (Method::OPTIONS, _) => empty_response(StatusCode::NO_CONTENT),

        (Method::POST, "/fizzbuzz") => handle_fizzbuzz(req, state).await,

        (Method::GET, "/statistics") => handle_statistics(state).await,

        (Method::GET, "/health") => handle_health(),

        (_, "/fizzbuzz" | "/statistics" | "/health") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }

        _ => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn handle_fizzbuzz<B>(req: Request<B>, state: &GatewayState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let query = match decode_query(req, state.max_body_size).await {
        Ok(query) => query,
        Err(e) => return service_error_response(&e),
    };

    match state.service.generate(query) {
        Ok(result) => json_response(StatusCode::OK, serde_json::json!({ "result": result })),
        Err(e) => service_error_response(&e),
    }
}

async fn handle_statistics(state: &GatewayState) -> Response<Full<Bytes>> {
    // Cancels the scan if this request is dropped before it completes.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.service.statistics(cancel).await {
        Ok(ranking) => match serde_json::to_value(&ranking) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => service_error_response(&ServiceError::Internal(e.to_string())),
        },
        Err(e) => service_error_response(&e),
    }
}

fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, serde_json::json!({ "status": "healthy" }))
}

/// Read and decode a `/fizzbuzz` request body.
async fn decode_query<B>(req: Request<B>, max_size: usize) -> Result<FizzBuzzQuery, ServiceError>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let body = read_body(req, max_size).await?;
    serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "failed to decode request");
        ServiceError::InvalidBody(e.to_string())
    })
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// HTTP status for a service error.
fn status_for(err: &ServiceError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Encode a service error. Client errors keep their details; anything else
/// is logged and answered with a generic message.
fn service_error_response(err: &ServiceError) -> Response<Full<Bytes>> {
    let status = status_for(err);
    match err {
        ServiceError::Validation { message, details } => json_response(
            status,
            serde_json::json!({ "error": message, "details": details }),
        ),
        ServiceError::InvalidBody(reason) => json_response(
            status,
            serde_json::json!({ "error": "invalid JSON body", "details": [reason] }),
        ),
        ServiceError::BodyTooLarge(max) => json_response(
            status,
            serde_json::json!({
                "error": "request body too large",
                "details": [format!("maximum body size is {max} bytes")],
            }),
        ),
        _ => {
            error!(error = %err, "unexpected error");
            error_response(status, "internal server error")
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Build a JSON response with the given status code and body.
fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|_| {
            Response::new(Full::new(Bytes::from(
                r#"{"error":"failed to build response"}"#,
            )))
        })
}

/// Build a JSON error response.
fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, serde_json::json!({ "error": message }))
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

/// Add CORS headers to a response.
fn cors_headers(response: &mut Response<Full<Bytes>>) {
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With, X-Request-Id"),
    );
    headers.insert("Access-Control-Max-Age", HeaderValue::from_static("3600"));
}

// ---------------------------------------------------------------------------
// Body reading
// ---------------------------------------------------------------------------

/// Read the full request body, enforcing a size limit.
async fn read_body<B>(req: Request<B>, max_size: usize) -> Result<Bytes, ServiceError>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_size) {
        return Err(ServiceError::BodyTooLarge(max_size));
    }

    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ServiceError::InvalidBody(format!("failed to read body: {}", e)))?
        .to_bytes();

    if body.len() > max_size {
        return Err(ServiceError::BodyTooLarge(max_size));
    }

    Ok(body)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
