//! 统一控制（CCF）接口：创建、查询、框架 / 制度映射维护。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::{ControlType, UnifiedControl};
use oxgrc_core::mapping::{self, MappingView, ReferencePolicy};
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
pub struct CreateUnifiedControlRequest {
    /// CCF 编号（如 CCF-001）
    pub ccf_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub control_type: ControlType,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub mapped_framework_controls: Vec<String>,
    #[serde(default)]
    pub mapped_policies: Vec<String>,
    #[serde(default)]
    pub automation_possible: bool,
    #[serde(default)]
    pub automation_config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MapFrameworkRequest {
    /// 框架控制项 ID 列表（整体替换现有映射）
    pub framework_control_ids: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MapPolicyRequest {
    /// 内部制度 ID 列表（整体替换现有映射）
    pub policy_ids: Vec<String>,
}

/// 统一控制列表
#[utoipa::path(
    get,
    path = "/v1/unified-controls",
    tag = "UnifiedControls",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "统一控制列表", body = [UnifiedControl])
    )
)]
async fn list_unified_controls(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_unified_controls(limit, offset),
        state.store.count_unified_controls(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list unified controls", &e)
        }
    }
}

/// 创建统一控制。请求中携带的映射列表按严格引用校验处理。
#[utoipa::path(
    post,
    path = "/v1/unified-controls",
    tag = "UnifiedControls",
    security(("bearer_auth" = [])),
    request_body = CreateUnifiedControlRequest,
    responses(
        (status = 201, description = "创建成功", body = UnifiedControl),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_unified_control(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateUnifiedControlRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let uc = UnifiedControl {
        id: oxgrc_common::id::next_id(),
        ccf_id: req.ccf_id,
        name: req.name,
        description: req.description,
        control_type: req.control_type,
        frequency: req.frequency,
        owner: req.owner,
        mapped_framework_controls: Vec::new(),
        mapped_policies: Vec::new(),
        automation_possible: req.automation_possible,
        automation_config: req.automation_config,
        created_at: now,
        updated_at: now,
    };
    let created = match state.store.insert_unified_control(&uc) {
        Ok(created) => created,
        Err(e) => {
            return storage_error_response(&trace_id, "Failed to create unified control", &e);
        }
    };

    // 创建后立刻套用请求中的映射，走同一套严格校验
    if !req.mapped_framework_controls.is_empty() {
        if let Err(e) = mapping::set_framework_mapping(
            &state.store,
            &created.id,
            &req.mapped_framework_controls,
            ReferencePolicy::Strict,
        ) {
            return core_error_response(&trace_id, "Failed to map framework controls", &e);
        }
    }
    if !req.mapped_policies.is_empty() {
        if let Err(e) = mapping::set_policy_mapping(
            &state.store,
            &created.id,
            &req.mapped_policies,
            ReferencePolicy::Strict,
        ) {
            return core_error_response(&trace_id, "Failed to map policies", &e);
        }
    }

    match state.store.get_unified_control(&created.id) {
        Ok(Some(fresh)) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "unified_control",
                &format!("created unified control '{}'", fresh.ccf_id),
            );
            success_response(StatusCode::CREATED, &trace_id, fresh)
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "unified control not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to reload unified control", &e),
    }
}

/// 统一控制详情
#[utoipa::path(
    get,
    path = "/v1/unified-controls/{id}",
    tag = "UnifiedControls",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "统一控制 ID")),
    responses(
        (status = 200, description = "统一控制详情", body = UnifiedControl),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn get_unified_control(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_unified_control(&id) {
        Ok(Some(uc)) => success_response(StatusCode::OK, &trace_id, uc),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "unified control not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get unified control", &e),
    }
}

/// 替换统一控制的框架控制项映射
#[utoipa::path(
    patch,
    path = "/v1/unified-controls/{id}/map-framework",
    tag = "UnifiedControls",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "统一控制 ID")),
    request_body = MapFrameworkRequest,
    responses(
        (status = 200, description = "更新后的统一控制", body = UnifiedControl),
        (status = 400, description = "存在未知的框架控制项 ID", body = ApiError),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn map_framework_controls(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MapFrameworkRequest>,
) -> impl IntoResponse {
    match mapping::set_framework_mapping(
        &state.store,
        &id,
        &req.framework_control_ids,
        ReferencePolicy::Strict,
    ) {
        Ok(uc) => {
            record_audit(
                &state,
                &claims.username,
                "update",
                "unified_control",
                &format!(
                    "mapped {} framework controls to '{}'",
                    uc.mapped_framework_controls.len(),
                    uc.ccf_id
                ),
            );
            success_response(StatusCode::OK, &trace_id, uc)
        }
        Err(e) => core_error_response(&trace_id, "Failed to map framework controls", &e),
    }
}

/// 替换统一控制的内部制度映射
#[utoipa::path(
    patch,
    path = "/v1/unified-controls/{id}/map-policy",
    tag = "UnifiedControls",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "统一控制 ID")),
    request_body = MapPolicyRequest,
    responses(
        (status = 200, description = "更新后的统一控制", body = UnifiedControl),
        (status = 400, description = "存在未知的制度 ID", body = ApiError),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn map_policies(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MapPolicyRequest>,
) -> impl IntoResponse {
    match mapping::set_policy_mapping(&state.store, &id, &req.policy_ids, ReferencePolicy::Strict) {
        Ok(uc) => {
            record_audit(
                &state,
                &claims.username,
                "update",
                "unified_control",
                &format!(
                    "mapped {} policies to '{}'",
                    uc.mapped_policies.len(),
                    uc.ccf_id
                ),
            );
            success_response(StatusCode::OK, &trace_id, uc)
        }
        Err(e) => core_error_response(&trace_id, "Failed to map policies", &e),
    }
}

/// 映射展示视图：解析后的框架控制项与制度信息
#[utoipa::path(
    get,
    path = "/v1/unified-controls/{id}/mapping",
    tag = "UnifiedControls",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "统一控制 ID")),
    responses(
        (status = 200, description = "映射展示视图", body = MappingView),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn get_mapping_view(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match mapping::resolve_mapping_view(&state.store, &id) {
        Ok(view) => success_response(StatusCode::OK, &trace_id, view),
        Err(e) => core_error_response(&trace_id, "Failed to resolve mapping view", &e),
    }
}

pub fn unified_control_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_unified_controls, create_unified_control))
        .routes(routes!(get_unified_control))
        .routes(routes!(map_framework_controls))
        .routes(routes!(map_policies))
        .routes(routes!(get_mapping_view))
}
