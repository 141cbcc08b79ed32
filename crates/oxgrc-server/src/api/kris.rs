//! 关键风险指标（KRI）接口。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::Kri;
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
pub struct CreateKriRequest {
    /// 所属风险 ID
    pub risk_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub green_max: Option<f64>,
    #[serde(default)]
    pub yellow_max: Option<f64>,
    /// true 表示值越高越差（默认 true）
    #[serde(default = "default_higher_is_worse")]
    pub higher_is_worse: bool,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub trend: String,
}

fn default_higher_is_worse() -> bool {
    true
}

/// KRI 列表
#[utoipa::path(
    get,
    path = "/v1/kris",
    tag = "Kris",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "KRI 列表", body = [Kri])
    )
)]
async fn list_kris(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_kris(limit, offset),
        state.store.count_kris(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list KRIs", &e),
    }
}

/// 创建 KRI
#[utoipa::path(
    post,
    path = "/v1/kris",
    tag = "Kris",
    security(("bearer_auth" = [])),
    request_body = CreateKriRequest,
    responses(
        (status = 201, description = "创建成功", body = Kri),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "所属风险不存在", body = ApiError)
    )
)]
async fn create_kri(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateKriRequest>,
) -> impl IntoResponse {
    match state.store.get_risk(&req.risk_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "risk not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get risk", &e),
    }

    let now = Utc::now();
    let kri = Kri {
        id: oxgrc_common::id::next_id(),
        risk_id: req.risk_id,
        name: req.name,
        description: req.description,
        current_value: req.current_value,
        threshold: req.threshold,
        green_max: req.green_max,
        yellow_max: req.yellow_max,
        higher_is_worse: req.higher_is_worse,
        unit: req.unit,
        trend: req.trend,
        kci_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_kri(&kri) {
        Ok(created) => {
            // 维护父风险的反向列表；第二次单行写入，失败仅记录日志
            if let Err(e) = state.store.append_risk_kri(&created.risk_id, &created.id) {
                tracing::error!(error = %e, kri_id = %created.id, "Failed to link KRI to its risk");
            }
            record_audit(
                &state,
                &claims.username,
                "create",
                "kri",
                &format!("created KRI '{}'", created.name),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create KRI", &e),
    }
}

/// KRI 详情
#[utoipa::path(
    get,
    path = "/v1/kris/{id}",
    tag = "Kris",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "KRI ID")),
    responses(
        (status = 200, description = "KRI 详情", body = Kri),
        (status = 404, description = "KRI 不存在", body = ApiError)
    )
)]
async fn get_kri(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_kri(&id) {
        Ok(Some(k)) => success_response(StatusCode::OK, &trace_id, k),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "KRI not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get KRI", &e),
    }
}

pub fn kri_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_kris, create_kri))
        .routes(routes!(get_kri))
}
