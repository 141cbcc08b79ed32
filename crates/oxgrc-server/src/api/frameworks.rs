//! 合规框架及其控制项接口。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::{Framework, FrameworkControl};
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
pub struct CreateFrameworkRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category: String,
    /// 是否纳入合规范围（默认 true）
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub total_controls: u32,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleFrameworkRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFrameworkControlRequest {
    /// 框架定义的控制编号（如 A.8.2、CC6.1）
    pub control_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub testing_procedure: Option<String>,
}

/// 框架列表
#[utoipa::path(
    get,
    path = "/v1/frameworks",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "框架列表", body = [Framework])
    )
)]
async fn list_frameworks(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_frameworks(limit, offset),
        state.store.count_frameworks(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list frameworks", &e)
        }
    }
}

/// 创建框架
#[utoipa::path(
    post,
    path = "/v1/frameworks",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    request_body = CreateFrameworkRequest,
    responses(
        (status = 201, description = "创建成功", body = Framework),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_framework(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateFrameworkRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let fw = Framework {
        id: oxgrc_common::id::next_id(),
        name: req.name,
        description: req.description,
        version: req.version,
        category: req.category,
        enabled: req.enabled,
        total_controls: req.total_controls,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_framework(&fw) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "framework",
                &format!("created framework '{}'", created.name),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create framework", &e),
    }
}

/// 框架详情
#[utoipa::path(
    get,
    path = "/v1/frameworks/{id}",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "框架 ID")),
    responses(
        (status = 200, description = "框架详情", body = Framework),
        (status = 404, description = "框架不存在", body = ApiError)
    )
)]
async fn get_framework(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_framework(&id) {
        Ok(Some(fw)) => success_response(StatusCode::OK, &trace_id, fw),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "framework not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get framework", &e),
    }
}

/// 切换框架合规范围（启用 / 停用）
#[utoipa::path(
    patch,
    path = "/v1/frameworks/{id}/toggle",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "框架 ID")),
    request_body = ToggleFrameworkRequest,
    responses(
        (status = 200, description = "更新后的框架", body = Framework),
        (status = 404, description = "框架不存在", body = ApiError)
    )
)]
async fn toggle_framework(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleFrameworkRequest>,
) -> impl IntoResponse {
    match state.store.set_framework_enabled(&id, req.enabled) {
        Ok(Some(fw)) => {
            record_audit(
                &state,
                &claims.username,
                "update",
                "framework",
                &format!(
                    "set framework '{}' enabled = {}",
                    fw.name, fw.enabled
                ),
            );
            success_response(StatusCode::OK, &trace_id, fw)
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "framework not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to toggle framework", &e),
    }
}

/// 框架下的控制项列表
#[utoipa::path(
    get,
    path = "/v1/frameworks/{id}/controls",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "框架 ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "控制项列表", body = [FrameworkControl]),
        (status = 404, description = "框架不存在", body = ApiError)
    )
)]
async fn list_framework_controls(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    match state.store.get_framework(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "framework not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get framework", &e),
    }

    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_framework_controls(Some(&id), limit, offset),
        state.store.count_framework_controls(Some(&id)),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list framework controls", &e)
        }
    }
}

/// 在框架下创建控制项
#[utoipa::path(
    post,
    path = "/v1/frameworks/{id}/controls",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "框架 ID")),
    request_body = CreateFrameworkControlRequest,
    responses(
        (status = 201, description = "创建成功", body = FrameworkControl),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "框架不存在", body = ApiError)
    )
)]
async fn create_framework_control(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateFrameworkControlRequest>,
) -> impl IntoResponse {
    match state.store.get_framework(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "framework not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get framework", &e),
    }

    let now = Utc::now();
    let fc = FrameworkControl {
        id: oxgrc_common::id::next_id(),
        framework_id: id,
        control_id: req.control_id,
        title: req.title,
        description: req.description,
        category: req.category,
        testing_procedure: req.testing_procedure,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_framework_control(&fc) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "framework_control",
                &format!("created framework control '{}'", created.control_id),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create framework control", &e),
    }
}

/// 框架控制项详情
#[utoipa::path(
    get,
    path = "/v1/framework-controls/{id}",
    tag = "Frameworks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "框架控制项 ID")),
    responses(
        (status = 200, description = "控制项详情", body = FrameworkControl),
        (status = 404, description = "控制项不存在", body = ApiError)
    )
)]
async fn get_framework_control(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_framework_control(&id) {
        Ok(Some(fc)) => success_response(StatusCode::OK, &trace_id, fc),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "framework control not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get framework control", &e),
    }
}

pub fn framework_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_frameworks, create_framework))
        .routes(routes!(get_framework))
        .routes(routes!(toggle_framework))
        .routes(routes!(list_framework_controls, create_framework_control))
        .routes(routes!(get_framework_control))
}
