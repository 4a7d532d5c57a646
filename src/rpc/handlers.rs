use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use futures_util::StreamExt;
use std::sync::Arc;

use super::protocol::*;
use crate::channel::types::LaneItem;
use crate::cluster::client::{DfsClient, ReadStream};
use crate::dataservice::service::DataServiceHandle;
use crate::error::{DfsError, Result};
use crate::liveness::monitor::LivenessMonitor;
use crate::namespace::tree::Listing;
use crate::nameservice::types::UploadSummary;
use crate::recovery::integrity::IntegrityReport;
use crate::recovery::recover::RecoveryReport;

/// Routes served by a data node.
pub fn data_node_router(service: DataServiceHandle) -> Router {
    Router::new()
        .route(ENDPOINT_SUBMIT, post(handle_submit))
        .route(ENDPOINT_LANE_IN, post(handle_lane_in))
        .route(ENDPOINT_LANE_OUT, get(handle_lane_out))
        .route(ENDPOINT_LANE_CLEAR, post(handle_lane_clear))
        .layer(Extension(service))
}

/// Routes served by the name node: heartbeats plus the client API.
pub fn name_node_router(client: Arc<DfsClient>, monitor: Arc<LivenessMonitor>) -> Router {
    Router::new()
        .route(ENDPOINT_HEARTBEAT, post(handle_heartbeat))
        .route(ENDPOINT_MKDIR, post(handle_mkdir))
        .route(ENDPOINT_DELDIR, post(handle_deldir))
        .route(ENDPOINT_LIST, get(handle_list))
        .route(ENDPOINT_EXISTS, get(handle_exists))
        .route(ENDPOINT_UPLOAD, put(handle_upload))
        .route(ENDPOINT_DOWNLOAD, get(handle_download))
        .route(ENDPOINT_READ, get(handle_read))
        .route(ENDPOINT_INTEGRITY, get(handle_integrity))
        .route(ENDPOINT_RECOVER, post(handle_recover))
        .route(ENDPOINT_LIVENESS, get(handle_liveness))
        .layer(Extension(client))
        .layer(Extension(monitor))
}

pub fn status_for(error: &DfsError) -> StatusCode {
    match error {
        DfsError::NotFound(_) => StatusCode::NOT_FOUND,
        DfsError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        DfsError::Conflict(_) | DfsError::Incomplete(_) => StatusCode::CONFLICT,
        DfsError::OutOfRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        DfsError::InsufficientReplicas { .. } | DfsError::Unreachable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DfsError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T>(result: Result<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))),
        Err(e) => {
            tracing::error!("Request failed: {}", e);
            (status_for(&e), Json(ApiResponse::err(e)))
        }
    }
}

// --- Data node ---

pub async fn handle_submit(
    Extension(service): Extension<DataServiceHandle>,
    Json(req): Json<SubmitRequest>,
) -> (StatusCode, Json<SubmitResponse>) {
    let result = service.call(req.command).await;
    (StatusCode::OK, Json(SubmitResponse { result }))
}

pub async fn handle_lane_in(
    Extension(service): Extension<DataServiceHandle>,
    body: Bytes,
) -> StatusCode {
    let item: LaneItem = match bincode::deserialize(&body) {
        Ok(item) => item,
        Err(e) => {
            tracing::error!("Failed to decode lane item: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match service.push(item) {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!("Failed to push lane item: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn handle_lane_out(
    Extension(service): Extension<DataServiceHandle>,
) -> (StatusCode, Vec<u8>) {
    let item = service.pull().await;
    match bincode::serialize(&item) {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(e) => {
            tracing::error!("Failed to encode lane item: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}

pub async fn handle_lane_clear(Extension(service): Extension<DataServiceHandle>) -> Json<usize> {
    let dropped = service.clear_outbound().await;
    if dropped > 0 {
        tracing::warn!("Discarded {} stale outbound items", dropped);
    }
    Json(dropped)
}

// --- Name node ---

pub async fn handle_heartbeat(
    Extension(monitor): Extension<Arc<LivenessMonitor>>,
    Json(req): Json<HeartbeatRequest>,
) -> StatusCode {
    monitor.report(&req.service_id);
    StatusCode::OK
}

pub async fn handle_mkdir(
    Extension(client): Extension<Arc<DfsClient>>,
    Json(req): Json<PathParams>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    respond(client.mkdir(&req.path).await)
}

pub async fn handle_deldir(
    Extension(client): Extension<Arc<DfsClient>>,
    Json(req): Json<PathParams>,
) -> (StatusCode, Json<ApiResponse<usize>>) {
    respond(client.deldir(&req.path).await)
}

pub async fn handle_list(
    Extension(client): Extension<Arc<DfsClient>>,
    Query(params): Query<PathParams>,
) -> (StatusCode, Json<ApiResponse<Listing>>) {
    respond(client.list(&params.path).await)
}

pub async fn handle_exists(
    Extension(client): Extension<Arc<DfsClient>>,
    Query(params): Query<PathParams>,
) -> (StatusCode, Json<ApiResponse<bool>>) {
    respond(client.exists(&params.path).await)
}

/// The request body is re-chunked to the cluster's chunk size on the way in.
pub async fn handle_upload(
    Extension(client): Extension<Arc<DfsClient>>,
    Query(params): Query<UploadParams>,
    body: Body,
) -> (StatusCode, Json<ApiResponse<UploadSummary>>) {
    let result = async {
        let mut session = client.begin_upload(&params.dir, &params.name).await?;
        let mut frames = body.into_data_stream();
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(bytes) => session.write(&bytes)?,
                Err(e) => {
                    let reason = DfsError::Aborted(format!("request body failed: {}", e));
                    return session.abort(reason).await;
                }
            }
        }
        session.finish().await
    }
    .await;

    respond(result)
}

pub async fn handle_download(
    Extension(client): Extension<Arc<DfsClient>>,
    Query(params): Query<PathParams>,
) -> Response {
    match client.open(&params.path).await {
        Ok(stream) => stream_body(stream).await,
        Err(e) => respond::<()>(Err(e)).into_response(),
    }
}

pub async fn handle_read(
    Extension(client): Extension<Arc<DfsClient>>,
    Query(params): Query<ReadParams>,
) -> Response {
    match client
        .open_range(&params.path, params.offset, params.length)
        .await
    {
        Ok(stream) => stream_body(stream).await,
        Err(e) => respond::<()>(Err(e)).into_response(),
    }
}

/// Waits for the first chunk so that errors raised before any byte flows (missing
/// file, bad range) still get a proper status code.
async fn stream_body(mut stream: ReadStream) -> Response {
    match stream.next().await {
        Some(Err(e)) => respond::<()>(Err(e)).into_response(),
        first => {
            let body = futures_util::stream::iter(first).chain(stream.into_stream());
            Body::from_stream(body).into_response()
        }
    }
}

pub async fn handle_integrity(
    Extension(client): Extension<Arc<DfsClient>>,
) -> (StatusCode, Json<ApiResponse<IntegrityReport>>) {
    respond(client.check_integrity().await)
}

pub async fn handle_recover(
    Extension(client): Extension<Arc<DfsClient>>,
    Json(req): Json<RecoverRequest>,
) -> (StatusCode, Json<ApiResponse<RecoveryReport>>) {
    tracing::info!("Recovery of {} requested", req.target);
    respond(client.recover(&req.target).await)
}

pub async fn handle_liveness(
    Extension(monitor): Extension<Arc<LivenessMonitor>>,
) -> Json<Vec<LivenessEntry>> {
    let entries = monitor
        .snapshot()
        .into_iter()
        .map(|(service_id, state, silent_for)| LivenessEntry {
            service_id,
            state,
            silent_for_ms: silent_for.as_millis() as u64,
        })
        .collect();
    Json(entries)
}
