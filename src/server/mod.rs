//! HTTP server module
//!
//! The broker's control-plane surface: issue and finalize endpoints plus a
//! health check. Payload bytes never pass through here; clients write
//! straight to the storage provider with the capability URL, so every body
//! this server reads is a small JSON document.

use crate::api::{
    self, ErrorResponse, FinalizeRequestBody, FinalizeResponse, IssueRequest, IssueResponse,
};
use crate::error::UploadError;
use crate::finalize::{FinalizeRequest, FinalizeVerifier};
use crate::issuer::{CapabilityIssuer, UploadIntent};
use crate::keys::{ObjectKey, Purpose};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Header naming the subject a request acts for. Set by the fronting
/// gateway after it has authenticated the caller.
pub const SUBJECT_HEADER: &str = "x-upload-subject";
/// Subject assumed when the header is absent
pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Control-plane bodies are tiny; anything larger is a client error.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// State shared by every handler
#[derive(Clone)]
pub struct BrokerState {
    pub issuer: Arc<CapabilityIssuer>,
    pub verifier: Arc<FinalizeVerifier>,
}

/// Broker HTTP server
pub struct Server {
    address: String,
    state: BrokerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Server {
    /// Create a new server instance
    pub fn new(address: &str, state: BrokerState) -> Self {
        Self {
            address: address.to_string(),
            state,
            shutdown_tx: None,
            server_handle: None,
        }
    }

    /// Start the server
    ///
    /// Returns the actual bound address (useful when using port 0)
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(&self.address).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            run_server(listener, state, shutdown_rx).await;
        });
        self.server_handle = Some(handle);

        tracing::info!(address = %addr, "Broker server listening");
        Ok(addr)
    }

    /// Shutdown the server
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
    }
}

/// Run the HTTP server loop
async fn run_server(
    listener: TcpListener,
    state: BrokerState,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();
                        tokio::spawn(async move {
                            let _ = http1::Builder::new()
                                .serve_connection(
                                    io,
                                    service_fn(move |req| handle_request(req, state.clone())),
                                )
                                .await;
                        });
                    }
                    Err(_) => continue,
                }
            }
        }
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<Incoming>,
    state: BrokerState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let subject = parts
        .headers
        .get(SUBJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(ANONYMOUS_SUBJECT)
        .to_string();

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            return Ok(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "invalid-request",
                "request body too large",
            ))
        }
    };

    Ok(route(&parts.method, parts.uri.path(), &subject, body, &state).await)
}

/// Dispatch one request to its handler
pub async fn route(
    method: &Method,
    path: &str,
    subject: &str,
    body: Bytes,
    state: &BrokerState,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::POST, "/v1/uploads") => issue_handler(subject, body, state).await,
        (&Method::POST, "/v1/uploads/finalize") => finalize_handler(body, state).await,
        (&Method::GET, "/health") => health_handler(),
        _ => error_response(StatusCode::NOT_FOUND, "not-found", "no such endpoint"),
    }
}

/// Handle `POST /v1/uploads`
async fn issue_handler(subject: &str, body: Bytes, state: &BrokerState) -> Response<Full<Bytes>> {
    let request: IssueRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid-request",
                &format!("malformed request body: {}", e),
            )
        }
    };

    let (mime_type, size) = match request.validated() {
        Ok(fields) => fields,
        Err(e) => return upload_error_response(&e),
    };
    let purpose = match request.purpose.as_deref() {
        Some(raw) => match Purpose::parse(raw) {
            Ok(purpose) => purpose,
            Err(e) => return upload_error_response(&UploadError::from(e)),
        },
        None => Purpose::default(),
    };

    let intent = UploadIntent::new(&mime_type, size).with_purpose(purpose);
    match state.issuer.issue(subject, &intent).await {
        Ok(capability) => {
            let response = IssueResponse {
                key: capability.key,
                url: capability.url,
                expires_in_seconds: capability.expires_in_secs,
                constraints: state.issuer.constraints().clone(),
            };
            json_response(StatusCode::CREATED, &response)
        }
        Err(e) => upload_error_response(&e),
    }
}

/// Handle `POST /v1/uploads/finalize`
async fn finalize_handler(body: Bytes, state: &BrokerState) -> Response<Full<Bytes>> {
    let request: FinalizeRequestBody = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid-request",
                &format!("malformed request body: {}", e),
            )
        }
    };

    let key = match request.key.as_deref() {
        Some(key) if !key.is_empty() => ObjectKey::from_string(key.to_string()),
        _ => return error_response(StatusCode::BAD_REQUEST, "invalid-key", "key is required"),
    };

    let mut finalize = FinalizeRequest::new(key);
    if let Some(prefix) = &request.expected_mime_prefix {
        finalize = finalize.with_expected_mime_prefix(prefix);
    }
    if let Some(max_size) = request.max_size {
        finalize = finalize.with_max_size(max_size);
    }

    match state.verifier.finalize(&finalize).await {
        Ok(upload) => json_response(StatusCode::OK, &FinalizeResponse::from(upload)),
        Err(e) => upload_error_response(&e),
    }
}

/// Handle `GET /health`
fn health_handler() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(r#"{"status":"ok"}"#)))
        .unwrap()
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(payload)))
        .unwrap()
}

fn upload_error_response(e: &UploadError) -> Response<Full<Bytes>> {
    // Provider details stay in the log; the client only sees the reason code.
    if let UploadError::ProviderUnavailable(detail) = e {
        tracing::warn!(detail = %detail, "Provider failure surfaced to client");
    }
    let status =
        StatusCode::from_u16(api::status_for(e)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &ErrorResponse::from_error(e))
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorResponse::new(error, message))
}
