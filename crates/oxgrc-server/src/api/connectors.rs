//! 自动化测试连接器接口。配置内容透传存储，本服务不解释。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::Connector;
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
pub struct CreateConnectorRequest {
    pub name: String,
    /// 连接器类型（aws / github / jira 等）
    pub connector_type: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}

fn default_enabled() -> bool {
    true
}

/// 连接器列表
#[utoipa::path(
    get,
    path = "/v1/connectors",
    tag = "Connectors",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "连接器列表", body = [Connector])
    )
)]
async fn list_connectors(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_connectors(limit, offset),
        state.store.count_connectors(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list connectors", &e)
        }
    }
}

/// 创建连接器
#[utoipa::path(
    post,
    path = "/v1/connectors",
    tag = "Connectors",
    security(("bearer_auth" = [])),
    request_body = CreateConnectorRequest,
    responses(
        (status = 201, description = "创建成功", body = Connector),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_connector(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateConnectorRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let connector = Connector {
        id: oxgrc_common::id::next_id(),
        name: req.name,
        connector_type: req.connector_type,
        config: req.config,
        enabled: req.enabled,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_connector(&connector) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "connector",
                &format!("created {} connector '{}'", created.connector_type, created.name),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create connector", &e),
    }
}

/// 连接器详情
#[utoipa::path(
    get,
    path = "/v1/connectors/{id}",
    tag = "Connectors",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "连接器 ID")),
    responses(
        (status = 200, description = "连接器详情", body = Connector),
        (status = 404, description = "连接器不存在", body = ApiError)
    )
)]
async fn get_connector(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_connector(&id) {
        Ok(Some(c)) => success_response(StatusCode::OK, &trace_id, c),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "connector not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get connector", &e),
    }
}

pub fn connector_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_connectors, create_connector))
        .routes(routes!(get_connector))
}
