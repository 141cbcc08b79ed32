//! AI 模型登记与评估记录接口（AI 治理扩展）。

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use oxgrc_common::types::{AiAssessment, AiModel, ModelRiskLevel, ModelStatus};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::{
    error_response, record_audit, storage_error_response, success_paginated_response,
    success_response, ApiError,
};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAiModelRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    pub status: ModelStatus,
    pub risk_level: ModelRiskLevel,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAiAssessmentRequest {
    /// 被评估模型 ID
    pub ai_model_id: String,
    /// 评估人（缺省为当前登录用户）
    #[serde(default)]
    pub assessor: Option<String>,
    #[serde(default)]
    pub assessed_at: Option<DateTime<Utc>>,
    /// 评估结论
    pub result: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AiAssessmentListParams {
    /// 按模型过滤
    #[serde(default)]
    pub ai_model_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

/// AI 模型列表
#[utoipa::path(
    get,
    path = "/v1/ai-models",
    tag = "AiGovernance",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "AI 模型列表", body = [AiModel])
    )
)]
async fn list_ai_models(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_ai_models(limit, offset),
        state.store.count_ai_models(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list AI models", &e),
    }
}

/// 登记 AI 模型
#[utoipa::path(
    post,
    path = "/v1/ai-models",
    tag = "AiGovernance",
    security(("bearer_auth" = [])),
    request_body = CreateAiModelRequest,
    responses(
        (status = 201, description = "创建成功", body = AiModel),
        (status = 400, description = "请求参数错误", body = ApiError)
    )
)]
async fn create_ai_model(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateAiModelRequest>,
) -> impl IntoResponse {
    let now = Utc::now();
    let model = AiModel {
        id: oxgrc_common::id::next_id(),
        name: req.name,
        description: req.description,
        owner: req.owner,
        status: req.status,
        risk_level: req.risk_level,
        version: req.version,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_ai_model(&model) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "ai_model",
                &format!("registered AI model '{}'", created.name),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create AI model", &e),
    }
}

/// AI 模型详情
#[utoipa::path(
    get,
    path = "/v1/ai-models/{id}",
    tag = "AiGovernance",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "AI 模型 ID")),
    responses(
        (status = 200, description = "AI 模型详情", body = AiModel),
        (status = 404, description = "AI 模型不存在", body = ApiError)
    )
)]
async fn get_ai_model(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_ai_model(&id) {
        Ok(Some(m)) => success_response(StatusCode::OK, &trace_id, m),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "AI model not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get AI model", &e),
    }
}

/// 评估记录列表
#[utoipa::path(
    get,
    path = "/v1/ai-assessments",
    tag = "AiGovernance",
    security(("bearer_auth" = [])),
    params(AiAssessmentListParams),
    responses(
        (status = 200, description = "评估记录列表", body = [AiAssessment])
    )
)]
async fn list_ai_assessments(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<AiAssessmentListParams>,
) -> impl IntoResponse {
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = (page.limit(), page.offset());
    let filter = params.ai_model_id.as_deref();
    match (
        state.store.list_ai_assessments(filter, limit, offset),
        state.store.count_ai_assessments(filter),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => {
            storage_error_response(&trace_id, "Failed to list AI assessments", &e)
        }
    }
}

/// 记录模型评估
#[utoipa::path(
    post,
    path = "/v1/ai-assessments",
    tag = "AiGovernance",
    security(("bearer_auth" = [])),
    request_body = CreateAiAssessmentRequest,
    responses(
        (status = 201, description = "创建成功", body = AiAssessment),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "AI 模型不存在", body = ApiError)
    )
)]
async fn create_ai_assessment(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateAiAssessmentRequest>,
) -> impl IntoResponse {
    match state.store.get_ai_model(&req.ai_model_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "AI model not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get AI model", &e),
    }

    let now = Utc::now();
    let assessment = AiAssessment {
        id: oxgrc_common::id::next_id(),
        ai_model_id: req.ai_model_id,
        assessor: req
            .assessor
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| claims.username.clone()),
        assessed_at: req.assessed_at.unwrap_or(now),
        result: req.result,
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_ai_assessment(&assessment) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "ai_assessment",
                &format!("assessed AI model {}", created.ai_model_id),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create AI assessment", &e),
    }
}

pub fn ai_model_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_ai_models, create_ai_model))
        .routes(routes!(get_ai_model))
        .routes(routes!(list_ai_assessments, create_ai_assessment))
}
