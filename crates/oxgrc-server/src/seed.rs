//! 初始数据：默认管理员、框架目录与演示数据。
//!
//! Seed writes go through the same core-layer entry points as the API, with
//! the Lenient reference policy so catalog rows can be loaded in any order.

use anyhow::Result;
use chrono::Utc;
use oxgrc_common::types::{
    AiModel, Connector, Framework, FrameworkControl, InternalPolicy, Kci, Kri, ModelRiskLevel,
    ModelStatus, PolicyStatus, Risk, TestResult, UnifiedControl,
};
use oxgrc_core::lifecycle::{self, NewControlTest};
use oxgrc_core::mapping::{self, ReferencePolicy};
use oxgrc_storage::GrcStore;
use serde::Serialize;
use utoipa::ToSchema;

/// 重置演示数据的写入统计
#[derive(Debug, Serialize, ToSchema)]
pub struct ReseedSummary {
    pub frameworks: u64,
    pub framework_controls: u64,
    pub unified_controls: u64,
    pub policies: u64,
    pub control_tests: u64,
    pub risks: u64,
    pub kris: u64,
    pub kcis: u64,
    pub ai_models: u64,
    pub connectors: u64,
}

/// 首次启动时创建默认管理员。已有任意用户时不做任何事。
pub fn ensure_default_admin(store: &GrcStore, username: &str, password: &str) -> Result<bool> {
    if store.count_users()? > 0 {
        return Ok(false);
    }
    let hash = crate::auth::hash_password(password)?;
    let user = store.create_user(username, &hash)?;
    tracing::info!(username = %user.username, "Created default admin user");
    Ok(true)
}

fn new_framework(name: &str, description: &str, version: &str, category: &str, total: u32) -> Framework {
    let now = Utc::now();
    Framework {
        id: oxgrc_common::id::next_id(),
        name: name.to_string(),
        description: description.to_string(),
        version: version.to_string(),
        category: category.to_string(),
        enabled: true,
        total_controls: total,
        created_at: now,
        updated_at: now,
    }
}

fn new_framework_control(
    framework_id: &str,
    control_id: &str,
    title: &str,
    category: &str,
) -> FrameworkControl {
    let now = Utc::now();
    FrameworkControl {
        id: oxgrc_common::id::next_id(),
        framework_id: framework_id.to_string(),
        control_id: control_id.to_string(),
        title: title.to_string(),
        description: String::new(),
        category: category.to_string(),
        testing_procedure: None,
        created_at: now,
        updated_at: now,
    }
}

fn new_policy(policy_id: &str, name: &str, category: &str, owner: &str) -> InternalPolicy {
    let now = Utc::now();
    InternalPolicy {
        id: oxgrc_common::id::next_id(),
        policy_id: policy_id.to_string(),
        name: name.to_string(),
        description: String::new(),
        category: category.to_string(),
        owner: owner.to_string(),
        status: PolicyStatus::Active,
        last_reviewed_at: Some(now),
        next_review_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// 框架目录为空时写入六套标准框架及代表性控制项。
pub fn seed_framework_catalogs(store: &GrcStore) -> Result<(u64, u64)> {
    if store.count_frameworks()? > 0 {
        return Ok((0, 0));
    }

    let catalogs: [(Framework, &[(&str, &str, &str)]); 6] = [
        (
            new_framework(
                "ISO 27001",
                "Information security management system requirements",
                "2022",
                "Information Security",
                93,
            ),
            &[
                ("A.5.15", "Access control", "Organizational"),
                ("A.8.2", "Privileged access rights", "Technological"),
                ("A.8.15", "Logging", "Technological"),
            ],
        ),
        (
            new_framework(
                "ISO 42001",
                "Artificial intelligence management system requirements",
                "2023",
                "AI Governance",
                39,
            ),
            &[
                ("6.1.2", "AI risk assessment", "Planning"),
                ("8.4", "AI system impact assessment", "Operation"),
            ],
        ),
        (
            new_framework(
                "PCI-DSS",
                "Payment card industry data security standard",
                "v4.0",
                "Payment Security",
                277,
            ),
            &[
                ("8.3.1", "Strong authentication for all access", "Requirement 8"),
                ("10.2.1", "Audit logs capture all access", "Requirement 10"),
            ],
        ),
        (
            new_framework(
                "SOC 2",
                "Trust services criteria for service organizations",
                "2017",
                "Assurance",
                61,
            ),
            &[
                ("CC6.1", "Logical access security", "Common Criteria"),
                ("CC7.2", "Anomaly monitoring", "Common Criteria"),
            ],
        ),
        (
            new_framework(
                "NIST CSF",
                "Cybersecurity framework core functions",
                "2.0",
                "Cybersecurity",
                106,
            ),
            &[
                ("PR.AA-01", "Identities and credentials are managed", "Protect"),
                ("DE.CM-01", "Networks are monitored", "Detect"),
            ],
        ),
        (
            new_framework(
                "GDPR",
                "General Data Protection Regulation",
                "2018",
                "Privacy",
                45,
            ),
            &[
                ("Article 5", "Principles relating to processing of personal data", "Data Processing"),
                ("Article 25", "Data protection by design and default", "Data Protection"),
                ("Article 30", "Records of processing activities", "Documentation"),
            ],
        ),
    ];

    let mut frameworks = 0u64;
    let mut controls = 0u64;
    for (fw, fcs) in catalogs {
        let created = store.insert_framework(&fw)?;
        frameworks += 1;
        for (control_id, title, category) in fcs {
            store.insert_framework_control(&new_framework_control(
                &created.id,
                control_id,
                title,
                category,
            ))?;
            controls += 1;
        }
    }
    tracing::info!(frameworks, controls, "Seeded framework catalogs");
    Ok((frameworks, controls))
}

/// 清空业务数据并写入演示数据集。用户与审计日志保留。
pub fn reseed_demo_data(store: &GrcStore) -> Result<ReseedSummary> {
    store.clear_entity_collections()?;
    let (frameworks, framework_controls) = seed_framework_catalogs(store)?;

    // 内部制度
    let policies = [
        new_policy("POL-001", "Access Control Policy", "Security", "CISO"),
        new_policy("POL-002", "Logging and Monitoring Policy", "Security", "Security Ops"),
        new_policy("POL-003", "AI Acceptable Use Policy", "AI Governance", "CTO"),
    ];
    let mut policy_ids = Vec::new();
    for p in &policies {
        policy_ids.push(store.insert_policy(p)?.id);
    }

    // 选出两个框架控制项用于演示映射
    let all_fcs = store.list_framework_controls(None, 1000, 0)?;
    let mfa_fc_ids: Vec<String> = all_fcs
        .iter()
        .filter(|fc| matches!(fc.control_id.as_str(), "A.8.2" | "8.3.1" | "CC6.1" | "PR.AA-01"))
        .map(|fc| fc.id.clone())
        .collect();
    let logging_fc_ids: Vec<String> = all_fcs
        .iter()
        .filter(|fc| matches!(fc.control_id.as_str(), "A.8.15" | "10.2.1" | "CC7.2" | "DE.CM-01"))
        .map(|fc| fc.id.clone())
        .collect();

    let now = Utc::now();
    let unified = [
        UnifiedControl {
            id: oxgrc_common::id::next_id(),
            ccf_id: "CCF-001".to_string(),
            name: "Multi-Factor Authentication".to_string(),
            description: "MFA is enforced for all privileged and remote access.".to_string(),
            control_type: oxgrc_common::types::ControlType::Preventive,
            frequency: "Quarterly".to_string(),
            owner: "IAM Team".to_string(),
            mapped_framework_controls: Vec::new(),
            mapped_policies: Vec::new(),
            automation_possible: true,
            automation_config: Some(serde_json::json!({"check": "mfa_enforced"})),
            created_at: now,
            updated_at: now,
        },
        UnifiedControl {
            id: oxgrc_common::id::next_id(),
            ccf_id: "CCF-002".to_string(),
            name: "Centralized Audit Logging".to_string(),
            description: "Security-relevant events are collected centrally and retained."
                .to_string(),
            control_type: oxgrc_common::types::ControlType::Detective,
            frequency: "Monthly".to_string(),
            owner: "Security Ops".to_string(),
            mapped_framework_controls: Vec::new(),
            mapped_policies: Vec::new(),
            automation_possible: true,
            automation_config: None,
            created_at: now,
            updated_at: now,
        },
        UnifiedControl {
            id: oxgrc_common::id::next_id(),
            ccf_id: "CCF-003".to_string(),
            name: "AI Model Pre-Deployment Review".to_string(),
            description: "Models are risk-assessed before promotion to production.".to_string(),
            control_type: oxgrc_common::types::ControlType::Preventive,
            frequency: "Per release".to_string(),
            owner: "AI Governance Board".to_string(),
            mapped_framework_controls: Vec::new(),
            mapped_policies: Vec::new(),
            automation_possible: false,
            automation_config: None,
            created_at: now,
            updated_at: now,
        },
    ];
    let mut uc_ids = Vec::new();
    for uc in &unified {
        uc_ids.push(store.insert_unified_control(uc)?.id);
    }
    // 目录数据整体加载，映射走宽松校验
    mapping::set_framework_mapping(store, &uc_ids[0], &mfa_fc_ids, ReferencePolicy::Lenient)?;
    mapping::set_policy_mapping(
        store,
        &uc_ids[0],
        &policy_ids[..1],
        ReferencePolicy::Lenient,
    )?;
    mapping::set_framework_mapping(store, &uc_ids[1], &logging_fc_ids, ReferencePolicy::Lenient)?;
    mapping::set_policy_mapping(
        store,
        &uc_ids[1],
        &policy_ids[1..2],
        ReferencePolicy::Lenient,
    )?;
    mapping::set_policy_mapping(
        store,
        &uc_ids[2],
        &policy_ids[2..3],
        ReferencePolicy::Lenient,
    )?;

    // 控制测试：一条通过、一条失败（失败自动生成整改问题）
    lifecycle::record_control_test(
        store,
        NewControlTest {
            id: None,
            unified_control_id: uc_ids[1].clone(),
            tester: "bob".to_string(),
            tested_at: None,
            result: TestResult::Pass,
            notes: "Log pipeline verified against sample events.".to_string(),
            evidence_ids: Vec::new(),
            automated: false,
            connector_id: None,
        },
    )?;
    lifecycle::record_control_test(
        store,
        NewControlTest {
            id: None,
            unified_control_id: uc_ids[0].clone(),
            tester: "alice".to_string(),
            tested_at: None,
            result: TestResult::Fail,
            notes: "Two service accounts bypass MFA.".to_string(),
            evidence_ids: Vec::new(),
            automated: false,
            connector_id: None,
        },
    )?;

    // 风险与指标链
    let risk = store.insert_risk(&Risk {
        id: oxgrc_common::id::next_id(),
        name: "Unauthorized Access".to_string(),
        description: "Credential compromise leading to unauthorized system access.".to_string(),
        category: "Security".to_string(),
        inherent_risk_score: 8.0,
        residual_risk_score: 4.5,
        status: "Active".to_string(),
        owner: "CISO".to_string(),
        kri_ids: Vec::new(),
        linked_control_ids: vec![uc_ids[0].clone()],
        created_at: now,
        updated_at: now,
    })?;
    let kri = store.insert_kri(&Kri {
        id: oxgrc_common::id::next_id(),
        risk_id: risk.id.clone(),
        name: "Failed Login Attempts".to_string(),
        description: "Daily failed logins across production systems.".to_string(),
        current_value: 120.0,
        threshold: 500.0,
        green_max: Some(200.0),
        yellow_max: Some(500.0),
        higher_is_worse: true,
        unit: "attempts/day".to_string(),
        trend: "stable".to_string(),
        kci_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    })?;
    store.append_risk_kri(&risk.id, &kri.id)?;
    let kci = store.insert_kci(&Kci {
        id: oxgrc_common::id::next_id(),
        kri_id: kri.id.clone(),
        unified_control_id: uc_ids[0].clone(),
        name: "MFA Coverage".to_string(),
        description: "Share of accounts with MFA enforced.".to_string(),
        current_value: 97.5,
        target: 100.0,
        threshold: 95.0,
        unit: "%".to_string(),
        status: "green".to_string(),
        created_at: now,
        updated_at: now,
    })?;
    store.append_kri_kci(&kri.id, &kci.id)?;

    // AI 治理
    let ai_models = [
        AiModel {
            id: oxgrc_common::id::next_id(),
            name: "Fraud Scoring Model".to_string(),
            description: "Transaction fraud scoring".to_string(),
            owner: "Risk Analytics".to_string(),
            status: ModelStatus::Production,
            risk_level: ModelRiskLevel::High,
            version: "2.3".to_string(),
            created_at: now,
            updated_at: now,
        },
        AiModel {
            id: oxgrc_common::id::next_id(),
            name: "Support Ticket Classifier".to_string(),
            description: "Routes inbound tickets".to_string(),
            owner: "Platform".to_string(),
            status: ModelStatus::Development,
            risk_level: ModelRiskLevel::Low,
            version: "0.9".to_string(),
            created_at: now,
            updated_at: now,
        },
    ];
    for m in &ai_models {
        store.insert_ai_model(m)?;
    }

    store.insert_connector(&Connector {
        id: oxgrc_common::id::next_id(),
        name: "AWS Config".to_string(),
        connector_type: "aws".to_string(),
        config: serde_json::json!({"region": "us-east-1"}),
        enabled: true,
        created_at: now,
        updated_at: now,
    })?;

    let summary = ReseedSummary {
        frameworks,
        framework_controls,
        unified_controls: store.count_unified_controls()?,
        policies: store.count_policies()?,
        control_tests: store.count_control_tests(None)?,
        risks: store.count_risks()?,
        kris: store.count_kris()?,
        kcis: store.count_kcis()?,
        ai_models: store.count_ai_models()?,
        connectors: store.count_connectors()?,
    };
    tracing::info!(
        unified_controls = summary.unified_controls,
        policies = summary.policies,
        "Reseeded demo data"
    );
    Ok(summary)
}
