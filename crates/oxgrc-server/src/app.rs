use crate::state::AppState;
use crate::{api, auth, logging};
use axum::middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "oxgrc API",
        description = "oxgrc 统一控制映射与合规聚合 REST API",
    ),
    tags(
        (name = "Health", description = "服务健康检查"),
        (name = "Auth", description = "认证鉴权"),
        (name = "Frameworks", description = "合规框架与框架控制项"),
        (name = "UnifiedControls", description = "统一控制（CCF）与映射"),
        (name = "Policies", description = "内部制度"),
        (name = "ControlTests", description = "控制测试"),
        (name = "Evidence", description = "证据管理"),
        (name = "Issues", description = "整改问题"),
        (name = "Risks", description = "风险管理"),
        (name = "Kris", description = "关键风险指标"),
        (name = "Kcis", description = "关键控制指标"),
        (name = "AiGovernance", description = "AI 模型治理"),
        (name = "Connectors", description = "自动化测试连接器"),
        (name = "AuditLogs", description = "审计日志"),
        (name = "Dashboard", description = "合规仪表盘"),
        (name = "Ai", description = "AI 辅助分析"),
        (name = "Admin", description = "系统管理")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (login_router, login_spec) = api::auth_routes().split_for_parts();
    let (protected_router, protected_spec) = api::protected_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(login_spec);
    merged_spec.merge(protected_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public_router
        .merge(login_router)
        .merge(protected_router.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_middleware,
        )))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/v1/openapi.json", merged_spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
