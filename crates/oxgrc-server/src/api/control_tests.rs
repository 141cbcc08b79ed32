//! 控制测试接口。Fail 结果会自动生成整改问题。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxgrc_common::types::{ControlTest, Issue, TestResult};
use oxgrc_core::lifecycle::{self, NewControlTest};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::{
    core_error_response, error_response, record_audit, storage_error_response,
    success_paginated_response, success_response, ApiError,
};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordControlTestRequest {
    /// 调用方指定的测试 ID（可选）。重试时携带同一 ID 可复用已有
    /// 测试记录及其整改问题，不会重复创建。
    #[serde(default)]
    pub test_id: Option<String>,
    /// 被测统一控制 ID
    pub unified_control_id: String,
    /// 测试人（缺省为当前登录用户）
    #[serde(default)]
    pub tester: Option<String>,
    /// 测试时间（缺省为当前时间）
    #[serde(default)]
    pub tested_at: Option<DateTime<Utc>>,
    pub result: TestResult,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
    #[serde(default)]
    pub automated: bool,
    #[serde(default)]
    pub connector_id: Option<String>,
}

/// 测试记录及其自动生成的问题（仅 Fail 时存在）
#[derive(Debug, Serialize, ToSchema)]
pub struct ControlTestResponse {
    pub test: ControlTest,
    pub auto_issue: Option<Issue>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ControlTestListParams {
    /// 按统一控制过滤
    #[serde(default)]
    pub unified_control_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

/// 控制测试列表
#[utoipa::path(
    get,
    path = "/v1/control-tests",
    tag = "ControlTests",
    security(("bearer_auth" = [])),
    params(ControlTestListParams),
    responses(
        (status = 200, description = "控制测试列表", body = [ControlTest])
    )
)]
async fn list_control_tests(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ControlTestListParams>,
) -> impl IntoResponse {
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let filter = params.unified_control_id.as_deref();
    match (
        state.store.list_control_tests(filter, limit, offset),
        state.store.count_control_tests(filter),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list control tests", &e)
        }
    }
}

/// 记录控制测试。结果为 Fail 时自动创建 Open / High 整改问题，
/// 指派给测试人；响应同时返回测试记录与该问题。
#[utoipa::path(
    post,
    path = "/v1/control-tests",
    tag = "ControlTests",
    security(("bearer_auth" = [])),
    request_body = RecordControlTestRequest,
    responses(
        (status = 201, description = "测试已记录", body = ControlTestResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn record_control_test(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<RecordControlTestRequest>,
) -> impl IntoResponse {
    let tester = req
        .tester
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| claims.username.clone());
    let input = NewControlTest {
        id: req.test_id,
        unified_control_id: req.unified_control_id,
        tester,
        tested_at: req.tested_at,
        result: req.result,
        notes: req.notes,
        evidence_ids: req.evidence_ids,
        automated: req.automated,
        connector_id: req.connector_id,
    };
    match lifecycle::record_control_test(&state.store, input) {
        Ok(outcome) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "control_test",
                &format!(
                    "recorded {} test for control {}",
                    outcome.test.result.as_str(),
                    outcome.test.unified_control_id
                ),
            );
            success_response(
                StatusCode::CREATED,
                &trace_id,
                ControlTestResponse {
                    test: outcome.test,
                    auto_issue: outcome.auto_issue,
                },
            )
        }
        Err(e) => core_error_response(&trace_id, "Failed to record control test", &e),
    }
}

/// 控制测试详情
#[utoipa::path(
    get,
    path = "/v1/control-tests/{id}",
    tag = "ControlTests",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "控制测试 ID")),
    responses(
        (status = 200, description = "测试详情", body = ControlTest),
        (status = 404, description = "测试不存在", body = ApiError)
    )
)]
async fn get_control_test(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_control_test(&id) {
        Ok(Some(t)) => success_response(StatusCode::OK, &trace_id, t),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "control test not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get control test", &e),
    }
}

pub fn control_test_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_control_tests, record_control_test))
        .routes(routes!(get_control_test))
}
