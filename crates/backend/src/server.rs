//! # HTTP Server
//!
//! hyper server exposing the prediction form, the prediction endpoint and
//! the prediction history.
//!
//! ## Endpoints
//!
//! - `GET /`: HTML input form
//! - `POST /predict`: form-encoded prediction request; HTML result on
//!   success, JSON `{"error": ...}` on failure
//! - `GET /view-predictions`: HTML table of stored predictions (only when
//!   persistence is enabled, 404 otherwise)
//! - `GET /health`: liveness check (path is configurable)
//!
//! Known paths called with the wrong method answer 405; everything else 404.

use crate::model::Regressor;
use crate::pipeline::{PipelineError, PipelineOptions, PipelineOutcome, PredictionPipeline};
use crate::store::PredictionRepository;
use crate::views;
use abalone_shared::error::{Result, ServiceError};
use http::header::{ALLOW, CONTENT_TYPE};
use http::{Method, StatusCode};
use hyper::body::HttpBody;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Largest accepted form body
pub const MAX_FORM_BYTES: usize = 16 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared state handed to every request
pub struct AppState {
    pipeline: PredictionPipeline,
    store: Option<Arc<dyn PredictionRepository>>,
    health_check_path: String,
}

impl AppState {
    /// Wires the model and optional store into a pipeline
    ///
    /// # Arguments
    ///
    /// * `model` - Loaded model shared by every request
    /// * `store` - Prediction store; `None` disables persistence and the
    ///   history page
    /// * `options` - Pipeline behavior switches
    /// * `health_check_path` - Path answered by the liveness check
    pub fn new(
        model: Arc<dyn Regressor>,
        store: Option<Arc<dyn PredictionRepository>>,
        options: PipelineOptions,
        health_check_path: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: PredictionPipeline::new(model, store.clone(), options),
            store,
            health_check_path: health_check_path.into(),
        }
    }

    pub fn pipeline(&self) -> &PredictionPipeline {
        &self.pipeline
    }

    pub fn persistence_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn health_check_path(&self) -> &str {
        &self.health_check_path
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("persistence_enabled", &self.store.is_some())
            .field("health_check_path", &self.health_check_path)
            .finish()
    }
}

/// Server whose listener is bound but not yet serving
pub struct BoundServer {
    local_addr: SocketAddr,
    serve: Pin<Box<dyn Future<Output = hyper::Result<()>> + Send>>,
}

impl BoundServer {
    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until the shutdown signal fires
    pub async fn serve(self) -> Result<()> {
        let local_addr = self.local_addr;
        info!(bind_addr = %local_addr, "Prediction server listening");

        if let Err(e) = self.serve.await {
            error!(error = %e, "Prediction server error");
            return Err(ServiceError::network(
                local_addr.to_string(),
                "HTTP server error",
                Some(Box::new(e)),
            ));
        }

        info!("Prediction server shut down");
        Ok(())
    }
}

/// HTTP front end of the prediction service
pub struct PredictionServer {
    state: Arc<AppState>,
    bind_addr: SocketAddr,
}

impl PredictionServer {
    pub fn new(state: Arc<AppState>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Binds the listener
    ///
    /// The returned server drains in-flight requests and stops once
    /// `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns a network error when the address cannot be bound.
    pub fn bind<F>(&self, shutdown: F) -> Result<BoundServer>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let make_svc = make_service_fn(move |_conn| {
            let state = Arc::clone(&state);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(req, Arc::clone(&state))
                }))
            }
        });

        let server = Server::try_bind(&self.bind_addr).map_err(|e| {
            error!(error = %e, bind_addr = %self.bind_addr, "Failed to bind to address");
            ServiceError::network(
                self.bind_addr.to_string(),
                "Failed to bind to address",
                Some(Box::new(e)),
            )
        })?;

        let server = server.serve(make_svc);
        let local_addr = server.local_addr();
        let serve = server.with_graceful_shutdown(async move {
            shutdown.await;
            info!("Prediction server shutdown signal received");
        });

        Ok(BoundServer {
            local_addr,
            serve: Box::pin(serve),
        })
    }

    /// Serves until Ctrl-C
    pub async fn run(self) -> Result<()> {
        info!(
            bind_addr = %self.bind_addr,
            persistence = self.state.persistence_enabled(),
            "Starting prediction server"
        );

        let bound = self.bind(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })?;
        bound.serve().await
    }
}

impl std::fmt::Debug for PredictionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionServer")
            .field("bind_addr", &self.bind_addr)
            .field("state", &self.state)
            .finish()
    }
}

/// Routes one request
///
/// Never fails; every error becomes a response.
#[instrument(skip_all, fields(method = ?req.method(), path = req.uri().path()))]
pub async fn handle_request(
    req: Request<Body>,
    state: Arc<AppState>,
) -> std::result::Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!(method = %method, path = %path, "Processing request");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") => handle_index(&state),
        (&Method::POST, "/predict") => handle_predict(req, &state).await,
        (&Method::GET, "/view-predictions") => handle_view_predictions(&state).await,
        (&Method::GET, p) if p == state.health_check_path => handle_health(),
        (_, "/") | (_, "/view-predictions") => method_not_allowed("GET"),
        (_, "/predict") => method_not_allowed("POST"),
        (_, p) if p == state.health_check_path => method_not_allowed("GET"),
        _ => {
            warn!(method = %method, path = %path, "Request to unknown endpoint");
            not_found()
        }
    };

    debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "Request completed"
    );

    Ok(response)
}

fn handle_index(state: &AppState) -> Response<Body> {
    info!("Serving root page");
    match views::render_index(state.persistence_enabled()) {
        Ok(html) => html_response(StatusCode::OK, html),
        Err(e) => render_failure(e),
    }
}

async fn handle_predict(req: Request<Body>, state: &AppState) -> Response<Body> {
    // urlencoded only; multipart/form-data is answered with 415
    if let Some(content_type) = req.headers().get(CONTENT_TYPE) {
        let is_form = content_type
            .to_str()
            .map(|value| value.trim().to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false);
        if !is_form {
            warn!(content_type = ?content_type, "Rejected prediction request body");
            return error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                serde_json::json!({
                    "error": format!("expected {} body", FORM_CONTENT_TYPE),
                }),
            );
        }
    }

    let body = match read_body(req.into_body(), MAX_FORM_BYTES).await {
        Ok(body) => body,
        Err(BodyError::TooLarge) => {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                serde_json::json!({
                    "error": format!("form body exceeds {} bytes", MAX_FORM_BYTES),
                }),
            )
        }
        Err(BodyError::Read(e)) => {
            warn!(error = %e, "Failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": format!("cannot read request body: {}", e) }),
            );
        }
    };

    let fields = parse_form(&body);
    match state.pipeline.handle_prediction_request(&fields).await {
        PipelineOutcome::Success(success) => match views::render_result(&success) {
            Ok(html) => html_response(StatusCode::OK, html),
            Err(e) => render_failure(e),
        },
        PipelineOutcome::Failure(e) => pipeline_failure(&e),
    }
}

async fn handle_view_predictions(state: &AppState) -> Response<Body> {
    let Some(store) = &state.store else {
        debug!("Prediction history requested with persistence disabled");
        return not_found();
    };

    match store.list_all().await {
        Ok(predictions) => {
            info!(count = predictions.len(), "Fetched predictions from the database");
            match views::render_predictions(&predictions) {
                Ok(html) => html_response(StatusCode::OK, html),
                Err(e) => render_failure(e),
            }
        }
        Err(e) => {
            error!(error = %e, "Error fetching predictions");
            service_failure(&ServiceError::storage(e.to_string(), Some(Box::new(e))))
        }
    }
}

fn handle_health() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("healthy"))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// Decodes a form body into field name -> raw value
///
/// When a field repeats, the first occurrence wins.
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}

enum BodyError {
    TooLarge,
    Read(hyper::Error),
}

async fn read_body(mut body: Body, limit: usize) -> std::result::Result<Vec<u8>, BodyError> {
    if let Some(declared) = body.size_hint().exact() {
        if declared > limit as u64 {
            return Err(BodyError::TooLarge);
        }
    }

    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(BodyError::Read)?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn pipeline_failure(e: &PipelineError) -> Response<Body> {
    let status =
        StatusCode::from_u16(e.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut payload = serde_json::json!({
        "error": e.to_string(),
        "kind": e.kind().as_str(),
    });
    if let Some(field) = e.field() {
        payload["field"] = serde_json::Value::from(field);
    }
    error_response(status, payload)
}

fn service_failure(e: &ServiceError) -> Response<Body> {
    let status =
        StatusCode::from_u16(e.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match e {
        ServiceError::Storage { message, .. } => message.clone(),
        other => other.to_string(),
    };
    error_response(status, serde_json::json!({ "error": message }))
}

fn render_failure(e: askama::Error) -> Response<Body> {
    error!(error = %e, "Failed to render template");
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("Internal Server Error"))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn html_response(status: StatusCode, html: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, HTML_CONTENT_TYPE)
        .body(Body::from(html))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn error_response(status: StatusCode, payload: serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Body::from(payload.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn method_not_allowed(allow: &'static str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(ALLOW, allow)
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("Method Not Allowed"))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn not_found() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from("Not Found"))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
