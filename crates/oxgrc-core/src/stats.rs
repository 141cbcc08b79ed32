//! 合规仪表盘聚合。
//!
//! Pure functions over in-memory snapshots of the entity collections. The
//! dashboard is recomputed from scratch on every call; nothing here caches.

use oxgrc_common::types::{AiModel, ControlTest, Framework, Issue, ModelRiskLevel, ModelStatus, Risk, TestResult, UnifiedControl};
use serde::Serialize;
use utoipa::ToSchema;

/// 仪表盘汇总数据
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardStats {
    /// 已纳入合规范围的框架数
    pub enabled_frameworks: u64,
    /// 统一控制总数
    pub total_unified_controls: u64,
    /// 控制有效性：测试通过率（百分比，一位小数；无测试记录时为 0）
    pub control_effectiveness: f64,
    /// 未关闭问题数（状态不是 Resolved / Closed）
    pub open_issues: u64,
    /// 平均剩余风险评分（一位小数；无风险记录时为 0）
    pub avg_residual_risk: f64,
    /// 生产状态的 AI 模型数
    pub production_ai_models: u64,
    /// 高风险 AI 模型数
    pub high_risk_ai_models: u64,
}

/// 四舍五入到一位小数（仅用于展示值）
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn compute_dashboard_stats(
    frameworks: &[Framework],
    unified_controls: &[UnifiedControl],
    control_tests: &[ControlTest],
    issues: &[Issue],
    risks: &[Risk],
    ai_models: &[AiModel],
) -> DashboardStats {
    let enabled_frameworks = frameworks.iter().filter(|f| f.enabled).count() as u64;

    let total_tests = control_tests.len();
    let passed_tests = control_tests
        .iter()
        .filter(|t| t.result == TestResult::Pass)
        .count();
    let control_effectiveness = if total_tests == 0 {
        0.0
    } else {
        round_one_decimal(100.0 * passed_tests as f64 / total_tests as f64)
    };

    let open_issues = issues.iter().filter(|i| !i.status.is_terminal()).count() as u64;

    let avg_residual_risk = if risks.is_empty() {
        0.0
    } else {
        let sum: f64 = risks.iter().map(|r| r.residual_risk_score).sum();
        round_one_decimal(sum / risks.len() as f64)
    };

    let production_ai_models = ai_models
        .iter()
        .filter(|m| m.status == ModelStatus::Production)
        .count() as u64;
    let high_risk_ai_models = ai_models
        .iter()
        .filter(|m| m.risk_level == ModelRiskLevel::High)
        .count() as u64;

    DashboardStats {
        enabled_frameworks,
        total_unified_controls: unified_controls.len() as u64,
        control_effectiveness,
        open_issues,
        avg_residual_risk,
        production_ai_models,
        high_risk_ai_models,
    }
}
