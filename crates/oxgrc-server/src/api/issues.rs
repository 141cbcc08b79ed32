//! 整改问题接口：创建、状态流转、例外批准。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxgrc_common::types::{Issue, IssueSeverity, IssueStatus};
use oxgrc_core::lifecycle;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::pagination::PaginationParams;
use crate::api::{
    core_error_response, error_response, record_audit, storage_error_response,
    success_paginated_response, success_response, ApiError,
};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIssueRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: IssueSeverity,
    /// 初始状态（默认 Open）
    #[serde(default = "default_status")]
    pub status: IssueStatus,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unified_control_id: Option<String>,
}

fn default_status() -> IssueStatus {
    IssueStatus::Open
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIssueStatusRequest {
    pub status: IssueStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantExceptionRequest {
    /// 例外详情（原因、批准人、到期时间等，透传存储）
    pub details: serde_json::Value,
}

/// 问题列表
#[utoipa::path(
    get,
    path = "/v1/issues",
    tag = "Issues",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "问题列表", body = [Issue])
    )
)]
async fn list_issues(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_issues(limit, offset),
        state.store.count_issues(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list issues", &e),
    }
}

/// 手工创建问题
#[utoipa::path(
    post,
    path = "/v1/issues",
    tag = "Issues",
    security(("bearer_auth" = [])),
    request_body = CreateIssueRequest,
    responses(
        (status = 201, description = "创建成功", body = Issue),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_issue(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateIssueRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let issue = Issue {
        id: oxgrc_common::id::next_id(),
        title: req.title,
        description: req.description,
        severity: req.severity,
        status: req.status,
        assigned_to: req.assigned_to,
        due_date: req.due_date,
        unified_control_id: req.unified_control_id,
        control_test_id: None,
        has_exception: false,
        exception_details: None,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_issue(&issue) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "issue",
                &format!("created issue '{}'", created.title),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create issue", &e),
    }
}

/// 问题详情
#[utoipa::path(
    get,
    path = "/v1/issues/{id}",
    tag = "Issues",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "问题 ID")),
    responses(
        (status = 200, description = "问题详情", body = Issue),
        (status = 404, description = "问题不存在", body = ApiError)
    )
)]
async fn get_issue(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_issue(&id) {
        Ok(Some(issue)) => success_response(StatusCode::OK, &trace_id, issue),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "issue not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get issue", &e),
    }
}

/// 更新问题状态。状态流转不设限制，已关闭的问题可以重新打开。
#[utoipa::path(
    patch,
    path = "/v1/issues/{id}/status",
    tag = "Issues",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "问题 ID")),
    request_body = UpdateIssueStatusRequest,
    responses(
        (status = 200, description = "更新后的问题", body = Issue),
        (status = 404, description = "问题不存在", body = ApiError)
    )
)]
async fn update_issue_status(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateIssueStatusRequest>,
) -> impl IntoResponse {
    match lifecycle::update_issue_status(&state.store, &id, req.status) {
        Ok(issue) => {
            record_audit(
                &state,
                &claims.username,
                "update",
                "issue",
                &format!("moved issue '{}' to {}", issue.title, issue.status.as_str()),
            );
            success_response(StatusCode::OK, &trace_id, issue)
        }
        Err(e) => core_error_response(&trace_id, "Failed to update issue status", &e),
    }
}

/// 批准问题例外（风险接受）。仅允许对未终止的问题操作，
/// 批准不改变问题状态。
#[utoipa::path(
    patch,
    path = "/v1/issues/{id}/exception",
    tag = "Issues",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "问题 ID")),
    request_body = GrantExceptionRequest,
    responses(
        (status = 200, description = "更新后的问题", body = Issue),
        (status = 400, description = "问题已处于终止状态", body = ApiError),
        (status = 404, description = "问题不存在", body = ApiError)
    )
)]
async fn grant_issue_exception(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GrantExceptionRequest>,
) -> impl IntoResponse {
    match lifecycle::grant_issue_exception(&state.store, &id, &req.details) {
        Ok(issue) => {
            record_audit(
                &state,
                &claims.username,
                "update",
                "issue",
                &format!("granted exception on issue '{}'", issue.title),
            );
            success_response(StatusCode::OK, &trace_id, issue)
        }
        Err(e) => core_error_response(&trace_id, "Failed to grant issue exception", &e),
    }
}

pub fn issue_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_issues, create_issue))
        .routes(routes!(get_issue))
        .routes(routes!(update_issue_status))
        .routes(routes!(grant_issue_exception))
}
