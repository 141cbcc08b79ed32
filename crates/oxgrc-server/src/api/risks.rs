//! 风险接口，含 Risk → KRI → KCI 链路查询。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::Risk;
use oxgrc_core::mapping::{self, KriChainEntry};
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
pub struct CreateRiskRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// 固有风险评分（约定 0-10）
    pub inherent_risk_score: f64,
    /// 剩余风险评分（约定 residual <= inherent）
    pub residual_risk_score: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub linked_control_ids: Vec<String>,
}

/// 风险列表
#[utoipa::path(
    get,
    path = "/v1/risks",
    tag = "Risks",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "风险列表", body = [Risk])
    )
)]
async fn list_risks(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_risks(limit, offset),
        state.store.count_risks(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list risks", &e),
    }
}

/// 创建风险
#[utoipa::path(
    post,
    path = "/v1/risks",
    tag = "Risks",
    security(("bearer_auth" = [])),
    request_body = CreateRiskRequest,
    responses(
        (status = 201, description = "创建成功", body = Risk),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_risk(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateRiskRequest>,
) -> impl IntoResponse {
    // 约定 residual <= inherent；超出仅告警，不拒绝
    if req.residual_risk_score > req.inherent_risk_score {
        tracing::warn!(
            name = %req.name,
            inherent = req.inherent_risk_score,
            residual = req.residual_risk_score,
            "Residual risk score exceeds inherent risk score"
        );
    }

    let now = Utc::now();
    let risk = Risk {
        id: oxgrc_common::id::next_id(),
        name: req.name,
        description: req.description,
        category: req.category,
        inherent_risk_score: req.inherent_risk_score,
        residual_risk_score: req.residual_risk_score,
        status: req.status,
        owner: req.owner,
        kri_ids: Vec::new(),
        linked_control_ids: req.linked_control_ids,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_risk(&risk) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "risk",
                &format!("created risk '{}'", created.name),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create risk", &e),
    }
}

/// 风险详情
#[utoipa::path(
    get,
    path = "/v1/risks/{id}",
    tag = "Risks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "风险 ID")),
    responses(
        (status = 200, description = "风险详情", body = Risk),
        (status = 404, description = "风险不存在", body = ApiError)
    )
)]
async fn get_risk(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_risk(&id) {
        Ok(Some(r)) => success_response(StatusCode::OK, &trace_id, r),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "risk not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get risk", &e),
    }
}

/// Risk → KRI → KCI 链路，按创建顺序返回
#[utoipa::path(
    get,
    path = "/v1/risks/{id}/kri-chain",
    tag = "Risks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "风险 ID")),
    responses(
        (status = 200, description = "KRI / KCI 链路", body = [KriChainEntry]),
        (status = 404, description = "风险不存在", body = ApiError)
    )
)]
async fn get_kri_chain(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match mapping::resolve_kri_kci_chain(&state.store, &id) {
        Ok(chain) => success_response(StatusCode::OK, &trace_id, chain),
        Err(e) => core_error_response(&trace_id, "Failed to resolve KRI chain", &e),
    }
}

pub fn risk_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_risks, create_risk))
        .routes(routes!(get_risk))
        .routes(routes!(get_kri_chain))
}
