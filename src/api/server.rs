//! HTTP server for the sheetsift API.
//!
//! Provides REST endpoints for spreadsheet upload, natural-language
//! queries, and original-layout export downloads.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                            |
//! |--------|-------------------|----------------------------------------|
//! | GET    | `/health`         | Health check                           |
//! | POST   | `/api/upload`     | Upload a spreadsheet (multipart)       |
//! | POST   | `/api/query`      | Run a natural-language query           |
//! | GET    | `/api/export`     | Download the last matched rows         |
//! | GET    | `/api/logs`       | SSE stream for real-time logs          |

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::{error_response, upload_response, QueryResponse, UploadResponse};
use crate::export::{to_bytes, ExportFormat};
use crate::pipeline::{analyze_sheet, AnalyzeOptions, AnalyzeOutcome};
use crate::query::RowSelection;
use crate::reconcile::reconcile;
use crate::session::{QueryRun, Session, SessionStore};
use crate::sheet::load_bytes;

type ErrorReply = (StatusCode, Json<Value>);

/// Start the HTTP server.
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SessionStore::new());

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_sheet))
        .route("/api/query", post(run_query))
        .route("/api/export", get(download_export))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(store);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("sheetsift server running on http://localhost:{}", port);
    println!("   POST /api/upload - Upload spreadsheet");
    println!("   POST /api/query  - Run natural-language query");
    println!("   GET  /api/export - Download matched rows");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sheetsift",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "query": "POST /api/query",
            "export": "GET /api/export?format=xlsx|csv",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming.
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload endpoint: load the file and replace the live session.
async fn upload_sheet(
    State(store): State<Arc<SessionStore>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ErrorReply> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        bad_request(format!("Multipart error: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided".to_string()))?;

    super::logs::log_info(format!(
        "Upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let sheet = load_bytes(&bytes, file_name.as_deref()).map_err(|e| {
        super::logs::log_error(format!("Load failed: {}", e));
        bad_request(e.to_string())
    })?;

    let response = {
        let session = Session::new(sheet);
        let response = upload_response(session.id, &session.sheet);
        store.replace(session).await;
        response
    };

    super::logs::log_success(format!(
        "Loaded {} column(s), {} data row(s)",
        response.sheet.column_count, response.sheet.row_count
    ));

    Ok(Json(response))
}

/// Query request body.
#[derive(Debug, Deserialize)]
struct QueryRequest {
    /// The natural-language question.
    question: String,
}

/// Query endpoint: run the pipeline against the live session.
async fn run_query(
    State(store): State<Arc<SessionStore>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ErrorReply> {
    if request.question.trim().is_empty() {
        return Err(bad_request("Question is empty".to_string()));
    }

    // Clone the sheet out so the AI round trip runs outside the lock.
    let sheet = store
        .with_session(|session| session.sheet.clone())
        .await
        .ok_or_else(no_session)?;

    let report = analyze_sheet(&sheet, &request.question, &AnalyzeOptions::default())
        .await
        .map_err(|e| {
            super::logs::log_error(format!("Query failed: {}", e));
            internal_error(e.to_string())
        })?;

    let selection = match &report.outcome {
        AnalyzeOutcome::Matches { selection, .. } => Some(selection.clone()),
        _ => None,
    };
    let run = QueryRun {
        question: request.question.clone(),
        plan: report.plan.clone(),
        selection,
    };
    store.with_session(|session| session.record_run(run)).await;

    Ok(Json(QueryResponse::from_report(&report)))
}

/// Export query string.
#[derive(Debug, Deserialize)]
struct ExportParams {
    /// "xlsx" (default) or "csv".
    format: Option<String>,
}

/// Export endpoint: serialize the last matched rows in the original
/// layout. There is nothing to download after a no-match or chart
/// query, or before any query has run.
async fn download_export(
    State(store): State<Arc<SessionStore>>,
    Query(params): Query<ExportParams>,
) -> Result<(HeaderMap, Vec<u8>), ErrorReply> {
    let format = match params.format.as_deref() {
        None => ExportFormat::Xlsx,
        Some(name) => ExportFormat::from_name(name)
            .ok_or_else(|| bad_request(format!("Unknown export format: {}", name)))?,
    };

    let exportable: Option<(crate::sheet::RawTable, RowSelection, Option<String>)> = store
        .with_session(|session| {
            session.exportable_selection().map(|selection| {
                (
                    session.sheet.raw.clone(),
                    selection.clone(),
                    session.sheet.file_name.clone(),
                )
            })
        })
        .await
        .ok_or_else(no_session)?;

    let (raw, selection, file_name) = exportable.ok_or_else(|| {
        bad_request("Nothing to export: the last query had no matching rows".to_string())
    })?;

    let export = reconcile(&raw, &selection).map_err(|e| internal_error(e.to_string()))?;
    let bytes = to_bytes(&export, format).map_err(|e| internal_error(e.to_string()))?;

    let stem = file_name
        .as_deref()
        .and_then(|n| std::path::Path::new(n).file_stem().and_then(|s| s.to_str()))
        .unwrap_or("filtered");
    let disposition = format!(
        "attachment; filename=\"{}_filtered.{}\"",
        stem,
        format.extension()
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, bytes))
}

fn bad_request(message: String) -> ErrorReply {
    (StatusCode::BAD_REQUEST, Json(error_response(&message)))
}

fn internal_error(message: String) -> ErrorReply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(error_response(&message)),
    )
}

fn no_session() -> ErrorReply {
    (
        StatusCode::CONFLICT,
        Json(error_response(
            "No active session; upload a spreadsheet first",
        )),
    )
}
