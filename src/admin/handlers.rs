use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;

use crate::admin::AdminState;
use crate::coordinator::Committed;
use crate::driver::{ApplyResult, ApplyStatus, LoadBalancerDriver};
use crate::error::{LbaasError, LbaasResult};
use crate::model::{Listener, ListenerSpec, ListenerUpdate, Member, MemberSpec, MemberUpdate};

/// JSON error body: `{ "error": kind, "message": text }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&LbaasError> for ErrorBody {
    fn from(e: &LbaasError) -> Self {
        Self {
            error: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Apply outcome attached to every mutation response.
#[derive(Debug, Serialize)]
pub struct ApplyReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ApplyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl From<&LbaasResult<ApplyResult>> for ApplyReport {
    fn from(apply: &LbaasResult<ApplyResult>) -> Self {
        match apply {
            Ok(result) => Self {
                ok: true,
                result: Some(result.clone()),
                error: None,
            },
            Err(e) => Self {
                ok: false,
                result: None,
                error: Some(e.into()),
            },
        }
    }
}

/// Errors surfaced by the admin API.
#[derive(Debug)]
pub enum ApiError {
    Lbaas(LbaasError),
    /// The detached mutation task panicked or was cancelled.
    Internal(String),
}

impl From<LbaasError> for ApiError {
    fn from(e: LbaasError) -> Self {
        ApiError::Lbaas(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Lbaas(LbaasError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Lbaas(e) => {
                let status = match &e {
                    LbaasError::Validation(_) => StatusCode::BAD_REQUEST,
                    LbaasError::NotFound { .. } => StatusCode::NOT_FOUND,
                    LbaasError::DuplicateEntry { .. } | LbaasError::ListenerNotEmpty { .. } => {
                        StatusCode::CONFLICT
                    }
                    LbaasError::Write { .. } | LbaasError::Apply { .. } => StatusCode::BAD_GATEWAY,
                    LbaasError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Json(ErrorBody::from(&e))).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Admin task failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal",
                        message,
                    }),
                )
                    .into_response()
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a mutation to completion even if the client goes away or the
/// request times out; an apply must not be cut off halfway.
async fn detached<F, T>(work: F) -> ApiResult<T>
where
    F: Future<Output = LbaasResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn mutation_body<T: Serialize>(key: &str, committed: &Committed<T>) -> Value {
    let mut body = json!({
        "revision": committed.revision,
        "apply": ApplyReport::from(&committed.apply),
    });
    body[key] = json!(committed.value);
    body
}

fn deletion_body(name: &str, committed: &Committed<()>) -> Value {
    json!({
        "deleted": name,
        "revision": committed.revision,
        "apply": ApplyReport::from(&committed.apply),
    })
}

// ── Listeners ──────────────────────────────────────────────────────

pub async fn list_listeners(State(state): State<AdminState>) -> ApiResult<Json<Vec<Listener>>> {
    Ok(Json(state.coordinator.driver().get_listeners()?))
}

pub async fn get_listener(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Listener>> {
    Ok(Json(state.coordinator.driver().get_listener(&name)?))
}

pub async fn create_listener(
    State(state): State<AdminState>,
    payload: Result<Json<ListenerSpec>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(spec) = payload?;
    let coordinator = state.coordinator.clone();
    let committed = detached(async move { coordinator.create_listener(spec).await }).await?;
    Ok((StatusCode::CREATED, Json(mutation_body("listener", &committed))))
}

pub async fn update_listener(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    payload: Result<Json<ListenerUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = payload?;
    let coordinator = state.coordinator.clone();
    let committed =
        detached(async move { coordinator.update_listener(&name, update).await }).await?;
    Ok(Json(mutation_body("listener", &committed)))
}

pub async fn delete_listener(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let coordinator = state.coordinator.clone();
    let target = name.clone();
    let committed = detached(async move { coordinator.delete_listener(&target).await }).await?;
    Ok(Json(deletion_body(&name, &committed)))
}

// ── Members ────────────────────────────────────────────────────────

pub async fn create_member(
    State(state): State<AdminState>,
    Path(listener): Path<String>,
    payload: Result<Json<MemberSpec>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(spec) = payload?;
    let coordinator = state.coordinator.clone();
    let committed =
        detached(async move { coordinator.create_member(&listener, spec).await }).await?;
    Ok((StatusCode::CREATED, Json(mutation_body("member", &committed))))
}

pub async fn list_members(State(state): State<AdminState>) -> ApiResult<Json<Vec<Member>>> {
    Ok(Json(state.coordinator.driver().get_members()?))
}

pub async fn get_member(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Member>> {
    Ok(Json(state.coordinator.driver().get_member(&name)?))
}

pub async fn update_member(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    payload: Result<Json<MemberUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = payload?;
    let coordinator = state.coordinator.clone();
    let committed = detached(async move { coordinator.update_member(&name, update).await }).await?;
    Ok(Json(mutation_body("member", &committed)))
}

pub async fn delete_member(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let coordinator = state.coordinator.clone();
    let target = name.clone();
    let committed = detached(async move { coordinator.delete_member(&target).await }).await?;
    Ok(Json(deletion_body(&name, &committed)))
}

// ── Apply & status ─────────────────────────────────────────────────

pub async fn apply_changes(State(state): State<AdminState>) -> ApiResult<Json<ApplyResult>> {
    let coordinator = state.coordinator.clone();
    let result = detached(async move { coordinator.apply_changes().await }).await?;
    Ok(Json(result))
}

pub async fn get_status(State(state): State<AdminState>) -> ApiResult<Json<ApplyStatus>> {
    Ok(Json(state.coordinator.status()?))
}
