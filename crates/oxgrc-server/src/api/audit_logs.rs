//! 审计日志查询接口（仅追加，不提供写入端点）。

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use oxgrc_common::types::AuditLog;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::pagination::PaginationParams;
use crate::api::{storage_error_response, success_paginated_response};
use crate::logging::TraceId;
use crate::state::AppState;

/// 审计日志列表（新在前）
#[utoipa::path(
    get,
    path = "/v1/audit-logs",
    tag = "AuditLogs",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "审计日志列表", body = [AuditLog])
    )
)]
async fn list_audit_logs(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_audit_logs(limit, offset),
        state.store.count_audit_logs(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list audit logs", &e)
        }
    }
}

pub fn audit_log_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_audit_logs))
}
