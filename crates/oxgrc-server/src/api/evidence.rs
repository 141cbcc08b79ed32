//! 证据接口：元数据登记与手工文件上传。

use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use oxgrc_common::types::Evidence;
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
pub struct CreateEvidenceRequest {
    /// 关联统一控制 ID
    pub unified_control_id: String,
    #[serde(default)]
    pub control_test_id: Option<String>,
    /// 证据类型标签（截图 / 导出 / 配置快照等）
    #[serde(default)]
    pub evidence_type: String,
    #[serde(default)]
    pub description: String,
    /// 是否自动采集
    #[serde(default)]
    pub automated: bool,
}

/// 证据列表
#[utoipa::path(
    get,
    path = "/v1/evidence",
    tag = "Evidence",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "证据列表", body = [Evidence])
    )
)]
async fn list_evidence(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (limit, offset) = (params.limit(), params.offset());
    match (
        state.store.list_evidence(limit, offset),
        state.store.count_evidence(),
    ) {
        (Ok(items), Ok(total)) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        (Err(e), _) | (_, Err(e)) => storage_error_response(&trace_id, "Failed to list evidence", &e),
    }
}

/// 登记证据（仅元数据，不含文件）
#[utoipa::path(
    post,
    path = "/v1/evidence",
    tag = "Evidence",
    security(("bearer_auth" = [])),
    request_body = CreateEvidenceRequest,
    responses(
        (status = 201, description = "创建成功", body = Evidence),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn create_evidence(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateEvidenceRequest>,
) -> impl IntoResponse {
    match state.store.get_unified_control(&req.unified_control_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "unified control not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get unified control", &e),
    }

    let now = Utc::now();
    let ev = Evidence {
        id: oxgrc_common::id::next_id(),
        unified_control_id: req.unified_control_id,
        control_test_id: req.control_test_id,
        evidence_type: req.evidence_type,
        description: req.description,
        automated: req.automated,
        file_path: None,
        file_name: None,
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_evidence(&ev) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "evidence",
                &format!("registered evidence for control {}", created.unified_control_id),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create evidence", &e),
    }
}

/// 证据详情
#[utoipa::path(
    get,
    path = "/v1/evidence/{id}",
    tag = "Evidence",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "证据 ID")),
    responses(
        (status = 200, description = "证据详情", body = Evidence),
        (status = 404, description = "证据不存在", body = ApiError)
    )
)]
async fn get_evidence(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_evidence(&id) {
        Ok(Some(ev)) => success_response(StatusCode::OK, &trace_id, ev),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "evidence not found",
        ),
        Err(e) => storage_error_response(&trace_id, "Failed to get evidence", &e),
    }
}

/// 上传手工证据文件。multipart 表单：
/// `unified_control_id`（必填）、`control_test_id`、`evidence_type`、
/// `description` 文本字段与一个 `file` 文件字段。
#[utoipa::path(
    post,
    path = "/v1/evidence/upload",
    tag = "Evidence",
    security(("bearer_auth" = [])),
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "上传成功", body = Evidence),
        (status = 400, description = "缺少必填字段或文件", body = ApiError),
        (status = 404, description = "统一控制不存在", body = ApiError)
    )
)]
async fn upload_evidence(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut unified_control_id = String::new();
    let mut control_test_id: Option<String> = None;
    let mut evidence_type = String::new();
    let mut description = String::new();
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &trace_id,
                    "bad_request",
                    &format!("invalid multipart body: {e}"),
                );
            }
        };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "unified_control_id" => {
                unified_control_id = field.text().await.unwrap_or_default();
            }
            "control_test_id" => {
                let v = field.text().await.unwrap_or_default();
                if !v.is_empty() {
                    control_test_id = Some(v);
                }
            }
            "evidence_type" => {
                evidence_type = field.text().await.unwrap_or_default();
            }
            "description" => {
                description = field.text().await.unwrap_or_default();
            }
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => file_bytes = Some(bytes.to_vec()),
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &trace_id,
                            "bad_request",
                            &format!("failed to read uploaded file: {e}"),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    if unified_control_id.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "unified_control_id is required",
        );
    }
    let (file_name, file_bytes) = match (file_name, file_bytes) {
        (Some(n), Some(b)) if !b.is_empty() => (n, b),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                "a non-empty file field is required",
            );
        }
    };

    match state.store.get_unified_control(&unified_control_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "unified control not found",
            );
        }
        Err(e) => return storage_error_response(&trace_id, "Failed to get unified control", &e),
    }

    let evidence_id = oxgrc_common::id::next_id();
    // 以证据 ID 为前缀落盘，避免同名文件互相覆盖
    let safe_name = sanitize_file_name(&file_name);
    let stored_path = state.uploads_dir.join(format!("{evidence_id}_{safe_name}"));
    if let Err(e) = tokio::fs::create_dir_all(state.uploads_dir.as_ref()).await {
        tracing::error!(error = %e, "Failed to create uploads directory");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "internal_error",
            "failed to store uploaded file",
        );
    }
    if let Err(e) = tokio::fs::write(&stored_path, &file_bytes).await {
        tracing::error!(error = %e, path = %stored_path.display(), "Failed to write uploaded file");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "internal_error",
            "failed to store uploaded file",
        );
    }

    let now = Utc::now();
    let ev = Evidence {
        id: evidence_id,
        unified_control_id,
        control_test_id,
        evidence_type,
        description,
        automated: false,
        file_path: Some(stored_path.to_string_lossy().into_owned()),
        file_name: Some(file_name),
        created_at: now,
        updated_at: now,
    };
    match state.store.insert_evidence(&ev) {
        Ok(created) => {
            record_audit(
                &state,
                &claims.username,
                "create",
                "evidence",
                &format!("uploaded evidence file for control {}", created.unified_control_id),
            );
            success_response(StatusCode::CREATED, &trace_id, created)
        }
        Err(e) => storage_error_response(&trace_id, "Failed to create evidence", &e),
    }
}

/// 只保留文件名本身，剥掉路径分隔符等危险字符
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn evidence_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_evidence, create_evidence))
        .routes(routes!(get_evidence))
        .routes(routes!(upload_evidence))
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn test_sanitize_file_name_strips_paths() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("a b?.png"), "a_b_.png");
        assert_eq!(sanitize_file_name("C:\\docs\\scan.jpg"), "scan.jpg");
    }
}
