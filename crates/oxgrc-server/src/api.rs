pub mod admin;
pub mod ai;
pub mod ai_models;
pub mod audit_logs;
pub mod connectors;
pub mod control_tests;
pub mod dashboard;
pub mod evidence;
pub mod frameworks;
pub mod issues;
pub mod kcis;
pub mod kris;
pub mod pagination;
pub mod policies;
pub mod risks;
pub mod unified_controls;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::AuditLog;
use oxgrc_core::CoreError;
use oxgrc_storage::StorageError;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 错误码
    pub err_code: i32,
    /// 错误信息
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 错误码（成功时为 0）
    pub err_code: i32,
    /// 错误信息（成功时为 success）
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
    /// 业务数据（有数据时返回）
    pub data: Option<T>,
}

/// 分页数据结构
#[derive(Serialize, ToSchema)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    /// 数据项列表
    pub items: Vec<T>,
    /// 总数
    pub total: u64,
    /// 每页数量
    pub limit: usize,
    /// 偏移量
    pub offset: usize,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

pub fn success_paginated_response<T>(
    status: StatusCode,
    trace_id: &str,
    items: Vec<T>,
    total: u64,
    limit: usize,
    offset: usize,
) -> Response
where
    T: Serialize,
{
    success_response(
        status,
        trace_id,
        PaginatedData {
            items,
            total,
            limit,
            offset,
        },
    )
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "token_expired" => 1003,
        "not_found" => 1004,
        "conflict" => 1005,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// 存储层错误 → HTTP 响应
pub fn storage_error_response(trace_id: &str, context: &str, e: &StorageError) -> Response {
    match e {
        StorageError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &e.to_string())
        }
        StorageError::Validation(msg) => {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", msg)
        }
        // UNIQUE 冲突映射为 409
        StorageError::Sqlite(inner) if inner.to_string().contains("UNIQUE constraint") => {
            error_response(
                StatusCode::CONFLICT,
                trace_id,
                "conflict",
                "record already exists",
            )
        }
        _ => {
            tracing::error!(error = %e, "{context}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 领域层错误 → HTTP 响应
pub fn core_error_response(trace_id: &str, context: &str, e: &CoreError) -> Response {
    match e {
        CoreError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &e.to_string())
        }
        CoreError::Validation(msg) => {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", msg)
        }
        CoreError::Storage(inner) => storage_error_response(trace_id, context, inner),
    }
}

/// 写入审计日志。失败仅记录，不影响业务请求。
pub fn record_audit(state: &AppState, actor: &str, action: &str, resource_type: &str, detail: &str) {
    let log = AuditLog {
        id: oxgrc_common::id::next_id(),
        actor: actor.to_string(),
        action: action.to_string(),
        resource_type: resource_type.to_string(),
        detail: detail.to_string(),
        created_at: Utc::now(),
    };
    if let Err(e) = state.store.insert_audit_log(&log) {
        tracing::warn!(error = %e, action, resource_type, "Failed to write audit log");
    }
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// 服务版本号
    version: String,
    /// 运行时长（秒）
    uptime_secs: i64,
    /// 存储状态
    storage_status: String,
    /// AI 分析是否启用
    ai_enabled: bool,
}

/// 获取服务健康状态。无需鉴权。
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务健康状态", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let storage_status = match state.store.count_frameworks() {
        Ok(_) => "ok".to_string(),
        Err(_) => "error".to_string(),
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            storage_status,
            ai_enabled: state.analyzer.is_enabled(),
        },
    )
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health))
}

pub fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(crate::auth::login))
}

pub fn protected_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(crate::auth::change_password))
        .merge(frameworks::framework_routes())
        .merge(unified_controls::unified_control_routes())
        .merge(policies::policy_routes())
        .merge(control_tests::control_test_routes())
        .merge(evidence::evidence_routes())
        .merge(issues::issue_routes())
        .merge(risks::risk_routes())
        .merge(kris::kri_routes())
        .merge(kcis::kci_routes())
        .merge(ai_models::ai_model_routes())
        .merge(connectors::connector_routes())
        .merge(audit_logs::audit_log_routes())
        .merge(dashboard::dashboard_routes())
        .merge(ai::ai_routes())
        .merge(admin::admin_routes())
}
