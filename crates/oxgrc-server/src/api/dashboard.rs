//! 合规仪表盘接口。每次请求基于当前数据快照重新计算。

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use oxgrc_core::stats::{compute_dashboard_stats, DashboardStats};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{storage_error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;

/// 仪表盘汇总数据
#[utoipa::path(
    get,
    path = "/v1/dashboard/stats",
    tag = "Dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "仪表盘汇总", body = DashboardStats)
    )
)]
async fn get_dashboard_stats(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let frameworks = match state.store.list_frameworks_all() {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, "Failed to snapshot frameworks", &e),
    };
    let unified_controls = match state.store.list_unified_controls_all() {
        Ok(v) => v,
        Err(e) => {
            return storage_error_response(&trace_id, "Failed to snapshot unified controls", &e)
        }
    };
    let control_tests = match state.store.list_control_tests_all() {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, "Failed to snapshot control tests", &e),
    };
    let issues = match state.store.list_issues_all() {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, "Failed to snapshot issues", &e),
    };
    let risks = match state.store.list_risks_all() {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, "Failed to snapshot risks", &e),
    };
    let ai_models = match state.store.list_ai_models_all() {
        Ok(v) => v,
        Err(e) => return storage_error_response(&trace_id, "Failed to snapshot AI models", &e),
    };

    let stats = compute_dashboard_stats(
        &frameworks,
        &unified_controls,
        &control_tests,
        &issues,
        &risks,
        &ai_models,
    );
    success_response(StatusCode::OK, &trace_id, stats)
}

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_dashboard_stats))
}
