//! 管理接口：演示数据重置。

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{error_response, record_audit, success_response, ApiError};
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::seed;
use crate::state::AppState;

/// 清空业务数据并重新写入演示数据。用户与审计日志保留。
#[utoipa::path(
    post,
    path = "/v1/admin/reseed",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "重置结果", body = seed::ReseedSummary),
        (status = 500, description = "重置失败", body = ApiError)
    )
)]
async fn reseed(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match seed::reseed_demo_data(&state.store) {
        Ok(summary) => {
            record_audit(
                &state,
                &claims.username,
                "reseed",
                "database",
                &format!(
                    "reseeded demo data: {} frameworks, {} unified controls",
                    summary.frameworks, summary.unified_controls
                ),
            );
            success_response(StatusCode::OK, &trace_id, summary)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reseed demo data");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "internal_error",
                "failed to reseed demo data",
            )
        }
    }
}

pub fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(reseed))
}
