//! AI 辅助分析接口。模型不可用或输出不合规时降级为固定文案，
//! 接口本身不对外暴露错误。

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use oxgrc_ai::{AnalysisOutcome, AnalysisRequest};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{record_audit, success_response};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;

/// 运行一次 AI 分析。`analysis_type` 支持 control_health_impact /
/// risk_kri_mapping / ccf_mapping，其余类型走通用提示词。
#[utoipa::path(
    post,
    path = "/v1/ai/analyze",
    tag = "Ai",
    security(("bearer_auth" = [])),
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "分析结果（模型不可用时为降级文案）", body = AnalysisOutcome)
    )
)]
async fn analyze(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> impl IntoResponse {
    let analysis_type = req.analysis_type.clone();
    let outcome = state.analyzer.analyze(req).await;
    record_audit(
        &state,
        &claims.username,
        "analyze",
        "ai_analysis",
        &format!("ran '{analysis_type}' analysis"),
    );
    success_response(StatusCode::OK, &trace_id, outcome)
}

pub fn ai_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(analyze))
}
