//! 关键控制指标（KCI）接口。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::Kci;
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
pub struct CreateKciRequest {
    /// 所属 KRI ID
    pub kri_id: String,
    /// 关联统一控制 ID
    pub unified_control_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub current_value: f64,
    /// 目标值
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub status: String,
}

/// KCI 列表
#[utoipa::path(
    get,
    path = "/v1/kcis",
    tag = "Kcis",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "KCI 列表", body = [Kci])
    )
)]
async fn list_kcis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_kcis(limit, offset),
        state.store.count_kcis(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list KCIs", &e),
    }
}

/// 创建 KCI
#[utoipa::path(
    post,
    path = "/v1/kcis",
    tag = "Kcis",
    security(("bearer_auth" = [])),
    request_body = CreateKciRequest,
    responses(
        (status = 201, description = "创建成功", body = Kci),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "所属 KRI 或统一控制不存在", body = ApiError)
    )
)]
async fn create_kci(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateKciRequest>,
) -> impl IntoResponse {
    match state.store.get_kri(&req.kri_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "KRI not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get KRI", &e),
    }
    match state.store.get_unified_control(&req.unified_control_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "unified control not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get unified control", &e),
    }

    let now = Utc::now();
    let kci = Kci {
        id: oxgrc_common::id::next_id(),
        kri_id: req.kri_id,
        unified_control_id: req.unified_control_id,
        name: req.name,
        description: req.description,
        current_value: req.current_value,
        target: req.target,
        threshold: req.threshold,
        unit: req.unit,
        status: req.status,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_kci(&kci) {
        Ok(created) => {
            // 维护所属 KRI 的反向列表；第二次单行写入，失败仅记录日志
            if let Err(e) = state.store.append_kri_kci(&created.kri_id, &created.id) {
                tracing::error!(error = %e, kci_id = %created.id, "Failed to link KCI to its KRI");
            }
            record_audit(
                &state,
                &claims.username,
                "create",
                "kci",
                &format!("created KCI '{}'", created.name),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create KCI", &e),
    }
}

/// KCI 详情
#[utoipa::path(
    get,
    path = "/v1/kcis/{id}",
    tag = "Kcis",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "KCI ID")),
    responses(
        (status = 200, description = "KCI 详情", body = Kci),
        (status = 404, description = "KCI 不存在", body = ApiError)
    )
)]
async fn get_kci(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_kci(&id) {
        Ok(Some(k)) => success_response(StatusCode::OK, &trace_id, k),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "KCI not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get KCI", &e),
    }
}

pub fn kci_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_kcis, create_kci))
        .routes(routes!(get_kci))
}
