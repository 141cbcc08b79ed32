use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// AI 分析输入
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    /// 分析类型（control_health_impact / risk_kri_mapping / ccf_mapping 等）
    pub analysis_type: String,
    /// 上下文数据，原样嵌入 prompt
    pub context: serde_json::Value,
}

/// AI 分析结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisOutcome {
    /// 分析正文
    pub analysis: String,
    /// 建议列表
    pub recommendations: Vec<String>,
}

/// 文本生成 Provider trait（支持多模型扩展）
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 模型提供商名称
    fn provider(&self) -> &str;

    /// 模型名称
    fn model_name(&self) -> &str;

    /// 单次请求/响应的文本生成，无重试
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// 外部服务不可用时的固定降级文案
pub const FALLBACK_ANALYSIS: &str = "AI analysis temporarily unavailable";

fn fallback_recommendations() -> Vec<String> {
    vec![
        "Review control test results and open issues manually.".to_string(),
        "Retry the analysis once the AI service is reachable.".to_string(),
    ]
}

/// Wraps an optional provider behind an infallible `analyze` call.
///
/// A transport or auth failure from the provider must never block the rest
/// of the application, so every failure path degrades to a fixed payload
/// instead of returning an error.
pub struct NarrativeService {
    provider: Option<Box<dyn TextGenerator>>,
}

impl NarrativeService {
    pub fn new(provider: Option<Box<dyn TextGenerator>>) -> Self {
        Self { provider }
    }

    /// 未配置 Provider 时构造（仅返回降级文案）
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let Some(provider) = &self.provider else {
            tracing::debug!("AI analysis requested but no provider is configured");
            return AnalysisOutcome {
                analysis: FALLBACK_ANALYSIS.to_string(),
                recommendations: fallback_recommendations(),
            };
        };

        let prompt = crate::prompt::build_analysis_prompt(&request.analysis_type, &request.context);
        tracing::debug!(
            provider = provider.provider(),
            model = provider.model_name(),
            analysis_type = %request.analysis_type,
            prompt_length = prompt.len(),
            "Requesting AI analysis"
        );

        match provider.generate(&prompt).await {
            Ok(raw) => parse_outcome(&raw),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    provider = provider.provider(),
                    "AI provider call failed, returning fallback payload"
                );
                AnalysisOutcome {
                    analysis: FALLBACK_ANALYSIS.to_string(),
                    recommendations: fallback_recommendations(),
                }
            }
        }
    }
}

/// Parses the provider's raw text as the expected two-key JSON shape. On
/// parse failure the raw text becomes the analysis body with one generic
/// recommendation.
fn parse_outcome(raw: &str) -> AnalysisOutcome {
    let stripped = strip_code_fences(raw);
    match serde_json::from_str::<AnalysisOutcome>(stripped) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(error = %e, "AI response was not valid JSON, using raw text");
            AnalysisOutcome {
                analysis: raw.trim().to_string(),
                recommendations: vec![
                    "Review the analysis above and validate it against current GRC data."
                        .to_string(),
                ],
            }
        }
    }
}

/// 去掉 ```json ... ``` 代码围栏
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 跳过语言标签行（如 "json"）
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outcome_plain_json() {
        let raw = r#"{"analysis": "Two controls failing", "recommendations": ["Fix MFA"]}"#;
        let outcome = parse_outcome(raw);
        assert_eq!(outcome.analysis, "Two controls failing");
        assert_eq!(outcome.recommendations, vec!["Fix MFA"]);
    }

    #[test]
    fn test_parse_outcome_fenced_json() {
        let raw = "```json\n{\"analysis\": \"ok\", \"recommendations\": []}\n```";
        let outcome = parse_outcome(raw);
        assert_eq!(outcome.analysis, "ok");
        assert!(outcome.recommendations.is_empty());
    }

    #[test]
    fn test_parse_outcome_raw_text_fallback() {
        let raw = "The control posture looks weak overall.";
        let outcome = parse_outcome(raw);
        assert_eq!(outcome.analysis, raw);
        assert_eq!(outcome.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_service_returns_fallback() {
        let service = NarrativeService::disabled();
        let outcome = service
            .analyze(AnalysisRequest {
                analysis_type: "control_health_impact".to_string(),
                context: serde_json::json!({}),
            })
            .await;
        assert_eq!(outcome.analysis, FALLBACK_ANALYSIS);
        assert!(!outcome.recommendations.is_empty());
    }
}
