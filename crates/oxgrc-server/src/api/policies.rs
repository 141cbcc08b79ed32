//! 内部制度接口。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxgrc_common::types::{InternalPolicy, PolicyStatus};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, record_audit, storage_error_response, success_paginated_response,
    success_response, ApiError,
};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePolicyRequest {
    /// 制度编号（如 POL-001）
    pub policy_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub owner: String,
    /// 制度状态（默认 Active）
    #[serde(default = "default_status")]
    pub status: PolicyStatus,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review_at: Option<DateTime<Utc>>,
}

fn default_status() -> PolicyStatus {
    PolicyStatus::Active
}

/// 制度列表
#[utoipa::path(
    get,
    path = "/v1/policies",
    tag = "Policies",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "制度列表", body = [InternalPolicy])
    )
)]
async fn list_policies(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_policies(limit, offset),
        state.store.count_policies(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list policies", &e),
    }
}

/// 创建制度
#[utoipa::path(
    post,
    path = "/v1/policies",
    tag = "Policies",
    security(("bearer_auth" = [])),
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "创建成功", body = InternalPolicy),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_policy(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreatePolicyRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let policy = InternalPolicy {
        id: oxgrc_common::id::next_id(),
        policy_id: req.policy_id,
        name: req.name,
        description: req.description,
        category: req.category,
        owner: req.owner,
        status: req.status,
        last_reviewed_at: req.last_reviewed_at,
        next_review_at: req.next_review_at,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_policy(&policy) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "policy",
                &format!("created policy '{}'", created.policy_id),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create policy", &e),
    }
}

/// 制度详情
#[utoipa::path(
    get,
    path = "/v1/policies/{id}",
    tag = "Policies",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "制度 ID")),
    responses(
        (status = 200, description = "制度详情", body = InternalPolicy),
        (status = 404, description = "制度不存在", body = ApiError)
    )
)]
async fn get_policy(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_policy(&id) {
        Ok(Some(p)) => success_response(StatusCode::OK, &trace_id, p),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "policy not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get policy", &e),
    }
}

pub fn policy_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_policies, create_policy))
        .routes(routes!(get_policy))
}
