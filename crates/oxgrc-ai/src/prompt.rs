//! Prompt templates for the narrative analysis types. The context payload
//! is embedded verbatim as formatted JSON.

/// 构建分析 prompt
pub fn build_analysis_prompt(analysis_type: &str, context: &serde_json::Value) -> String {
    let template = match analysis_type {
        "control_health_impact" => CONTROL_HEALTH_PROMPT,
        "risk_kri_mapping" => RISK_KRI_PROMPT,
        "ccf_mapping" => CCF_MAPPING_PROMPT,
        _ => GENERIC_PROMPT,
    };

    let context_json =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
    template.replace("{{CONTEXT_JSON}}", &context_json)
}

/// 固定的输出格式要求，附加在每个模板末尾
const OUTPUT_INSTRUCTION: &str = r#"Respond with a single JSON object of exactly this shape, and nothing else:
{"analysis": "<your analysis as plain text>", "recommendations": ["<recommendation 1>", "<recommendation 2>"]}"#;

const CONTROL_HEALTH_PROMPT: &str = r#"You are a GRC (governance, risk and compliance) analyst. Review the control health data below and explain how failing or partially effective controls impact the organization's compliance posture across the mapped frameworks.

Control health data:
{{CONTEXT_JSON}}

Respond with a single JSON object of exactly this shape, and nothing else:
{"analysis": "<your analysis as plain text>", "recommendations": ["<recommendation 1>", "<recommendation 2>"]}"#;

const RISK_KRI_PROMPT: &str = r#"You are a GRC analyst. Review the risk and key-risk-indicator data below. Explain which KRIs are trending toward their thresholds, what that implies for the associated risks, and whether the linked key-control-indicators suggest the mitigating controls are operating effectively.

Risk and indicator data:
{{CONTEXT_JSON}}

Respond with a single JSON object of exactly this shape, and nothing else:
{"analysis": "<your analysis as plain text>", "recommendations": ["<recommendation 1>", "<recommendation 2>"]}"#;

const CCF_MAPPING_PROMPT: &str = r#"You are a GRC analyst working with a common control framework (CCF). Review the unified control and its mappings below. Identify framework requirements that appear under-covered, overlapping mappings that could be consolidated, and internal policies that should be linked but are not.

Mapping data:
{{CONTEXT_JSON}}

Respond with a single JSON object of exactly this shape, and nothing else:
{"analysis": "<your analysis as plain text>", "recommendations": ["<recommendation 1>", "<recommendation 2>"]}"#;

const GENERIC_PROMPT: &str = r#"You are a GRC (governance, risk and compliance) analyst. Analyze the following data and summarize the most important findings for a compliance manager.

Data:
{{CONTEXT_JSON}}

Respond with a single JSON object of exactly this shape, and nothing else:
{"analysis": "<your analysis as plain text>", "recommendations": ["<recommendation 1>", "<recommendation 2>"]}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_embedded_in_prompt() {
        let context = serde_json::json!({"failing_controls": 2});
        let prompt = build_analysis_prompt("control_health_impact", &context);
        assert!(prompt.contains("\"failing_controls\": 2"));
        assert!(!prompt.contains("{{CONTEXT_JSON}}"));
    }

    #[test]
    fn test_unknown_type_uses_generic_template() {
        let prompt = build_analysis_prompt("something_else", &serde_json::json!({}));
        assert!(prompt.contains("compliance manager"));
    }

    #[test]
    fn test_all_templates_demand_json_shape() {
        for t in ["control_health_impact", "risk_kri_mapping", "ccf_mapping", "other"] {
            let prompt = build_analysis_prompt(t, &serde_json::json!({}));
            assert!(prompt.contains(OUTPUT_INSTRUCTION), "template {t} missing output instruction");
        }
    }
}
