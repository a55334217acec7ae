//! HTTP transport for the event service.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/fdsnws/event/1/query` | GET | result document, or an error page |
//! | `/fdsnws/event/1/query` | OPTIONS | CORS preflight |
//! | `/fdsnws/event/1/version` | GET | service version |
//!
//! A search runs on a blocking thread. Its cancellation token is tied to a
//! drop guard owned by the handler future: when the client goes away, hyper
//! drops the future and the assembler stops at its next checkpoint.
//!
//! JSON documents are built in memory and sent once complete. Text rows are
//! streamed: the blocking task writes into one end of an in-memory pipe and
//! the response body reads from the other. The status line goes out with the
//! first byte, so a text request that fails before writing anything still
//! gets an error page, while one cut short later ends with the rows already
//! sent. A client that leaves mid-stream closes the pipe and the next row
//! write fails.

use crate::service::{EventService, Outcome, ServiceError, SERVICE_VERSION};
use axum::body::Body;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use seisquery_core::{FilterSpec, OutputFormat, SearchError};
use seisquery_sinks::{content_type, TEXT_CONTENT_TYPE};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::io::{ReaderStream, SyncIoBridge};
use tokio_util::sync::CancellationToken;

pub const QUERY_PATH: &str = "/fdsnws/event/1/query";
pub const VERSION_PATH: &str = "/fdsnws/event/1/version";

const TEXT_PLAIN: &str = TEXT_CONTENT_TYPE;

/// Bytes buffered between the row writer and the response body.
const STREAM_BUFFER: usize = 64 * 1024;

pub fn router(service: Arc<EventService>) -> Router {
    Router::new()
        .route(QUERY_PATH, get(query).options(preflight))
        .route(VERSION_PATH, get(version))
        .with_state(service)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, service: Arc<EventService>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn version() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], SERVICE_VERSION)
}

async fn preflight() -> impl IntoResponse {
    (
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "Accept, Content-Type, X-Requested-With, Origin",
            ),
            (header::CONTENT_TYPE, TEXT_PLAIN),
        ],
        "",
    )
}

async fn query(
    State(service): State<Arc<EventService>>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let request = uri.to_string();

    let spec = match service.parse(&params) {
        Ok(spec) => spec,
        Err(e) => return error_page(status_of_search(&e), &e.to_string(), &request),
    };
    match spec.output.format {
        OutputFormat::Json => buffered(service, spec, request).await,
        OutputFormat::Text => streamed(service, spec, request).await,
    }
}

async fn buffered(service: Arc<EventService>, spec: FilterSpec, request: String) -> Response {
    let content_type = content_type(spec.output.format);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let joined = tokio::task::spawn_blocking(move || {
        let mut body = Vec::new();
        service
            .execute(&spec, &mut body, cancel)
            .map(|outcome| (outcome, body))
    })
    .await;
    guard.disarm();

    match joined {
        Ok(Ok((outcome, body))) => finished(outcome, Body::from(body), content_type, &request),
        Ok(Err(e)) => failed(&e, &request),
        Err(e) => {
            tracing::error!(error = %e, "search task failed");
            error_page(StatusCode::INTERNAL_SERVER_ERROR, "internal error", &request)
        }
    }
}

async fn streamed(service: Arc<EventService>, spec: FilterSpec, request: String) -> Response {
    let content_type = content_type(spec.output.format);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let (writer, reader) = tokio::io::duplex(STREAM_BUFFER);
    let (head_tx, head_rx) = oneshot::channel();
    let mut out = StreamWriter {
        inner: SyncIoBridge::new(writer),
        head: Some(head_tx),
    };

    let task_request = request.clone();
    tokio::task::spawn_blocking(move || {
        let result = service.execute(&spec, &mut out, cancel);
        out.finish(result, &task_request);
    });
    let head = head_rx.await;
    guard.disarm();

    match head {
        Ok(Head::Streaming) => with_content_type(
            Body::from_stream(ReaderStream::new(reader)).into_response(),
            content_type,
        ),
        Ok(Head::Done(Ok(outcome))) => finished(outcome, Body::empty(), content_type, &request),
        Ok(Head::Done(Err(e))) => failed(&e, &request),
        Err(_) => {
            tracing::error!("search task ended without a result");
            error_page(StatusCode::INTERNAL_SERVER_ERROR, "internal error", &request)
        }
    }
}

fn finished(outcome: Outcome, body: Body, content_type: &'static str, request: &str) -> Response {
    match outcome {
        Outcome::Complete { .. } | Outcome::Partial { .. } => {
            with_content_type(body.into_response(), content_type)
        }
        Outcome::NoContent { status } if status == 404 => {
            error_page(StatusCode::NOT_FOUND, "no matching events found", request)
        }
        Outcome::NoContent { .. } => StatusCode::NO_CONTENT.into_response(),
    }
}

fn failed(e: &ServiceError, request: &str) -> Response {
    tracing::warn!(error = %e, request = %request, "request failed");
    error_page(status_of(e), &e.to_string(), request)
}

fn with_content_type(mut response: Response, content_type: &'static str) -> Response {
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// What the blocking task reports before the response head is sent.
enum Head {
    /// Bytes are flowing; the outcome only reaches the log.
    Streaming,
    /// Finished without writing a byte.
    Done(Result<Outcome, ServiceError>),
}

/// Blocking writer into the response pipe. The first successful write
/// releases the response head.
struct StreamWriter<W> {
    inner: W,
    head: Option<oneshot::Sender<Head>>,
}

impl<W: Write> StreamWriter<W> {
    fn finish(mut self, result: Result<Outcome, ServiceError>, request: &str) {
        if let Some(head) = self.head.take() {
            let _ = head.send(Head::Done(result));
            return;
        }
        match result {
            Ok(outcome) => tracing::debug!(?outcome, "text stream done"),
            Err(e) => tracing::warn!(error = %e, request = %request, "text stream ended early"),
        }
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(head) = self.head.take() {
            let _ = head.send(Head::Streaming);
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn status_of_search(e: &SearchError) -> StatusCode {
    match e {
        SearchError::InvalidParameter(_) | SearchError::Unsupported(_) => StatusCode::BAD_REQUEST,
        SearchError::QuotaExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SearchError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::Disconnected | SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn status_of(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::Search(e) => status_of_search(e),
        ServiceError::Sink(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Plain-text error document in the FDSN web service layout.
fn error_page(status: StatusCode, message: &str, request: &str) -> Response {
    let body = format!(
        "Error {code}: {reason}\n\n{message}\n\n\
         Usage details are available from /fdsnws/event/1/\n\n\
         Request:\n{request}\n\n\
         Request Submitted:\n{submitted}\n\n\
         Service version:\n{SERVICE_VERSION}\n",
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or(""),
        submitted = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
    );
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}
