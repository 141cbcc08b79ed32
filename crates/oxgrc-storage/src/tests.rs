use crate::store::GrcStore;
use crate::StorageError;
use chrono::Utc;
use oxgrc_common::types::*;
use tempfile::TempDir;

fn setup() -> (TempDir, GrcStore) {
    let dir = TempDir::new().unwrap();
    let store = GrcStore::new(dir.path()).unwrap();
    (dir, store)
}

fn sample_framework(name: &str) -> Framework {
    let now = Utc::now();
    Framework {
        id: oxgrc_common::id::next_id(),
        name: name.to_string(),
        description: "test framework".to_string(),
        version: "2022".to_string(),
        category: "Information Security".to_string(),
        enabled: false,
        total_controls: 93,
        created_at: now,
        updated_at: now,
    }
}

fn sample_unified_control(ccf_id: &str, name: &str) -> UnifiedControl {
    let now = Utc::now();
    UnifiedControl {
        id: oxgrc_common::id::next_id(),
        ccf_id: ccf_id.to_string(),
        name: name.to_string(),
        description: "test control".to_string(),
        control_type: ControlType::Preventive,
        frequency: "Quarterly".to_string(),
        owner: "alice".to_string(),
        mapped_framework_controls: vec![],
        mapped_policies: vec![],
        automation_possible: false,
        automation_config: None,
        created_at: now,
        updated_at: now,
    }
}

fn sample_control_test(control_id: &str, result: TestResult) -> ControlTest {
    let now = Utc::now();
    ControlTest {
        id: oxgrc_common::id::next_id(),
        unified_control_id: control_id.to_string(),
        tester: "bob".to_string(),
        tested_at: now,
        result,
        notes: "checked settings".to_string(),
        evidence_ids: vec![],
        automated: false,
        connector_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn sample_issue(title: &str, control_test_id: Option<&str>) -> Issue {
    let now = Utc::now();
    Issue {
        id: oxgrc_common::id::next_id(),
        title: title.to_string(),
        description: "test issue".to_string(),
        severity: IssueSeverity::High,
        status: IssueStatus::Open,
        assigned_to: "alice".to_string(),
        due_date: None,
        unified_control_id: None,
        control_test_id: control_test_id.map(|s| s.to_string()),
        has_exception: false,
        exception_details: None,
        created_at: now,
        updated_at: now,
    }
}

fn sample_risk(name: &str) -> Risk {
    let now = Utc::now();
    Risk {
        id: oxgrc_common::id::next_id(),
        name: name.to_string(),
        description: "test risk".to_string(),
        category: "Cyber".to_string(),
        inherent_risk_score: 7.5,
        residual_risk_score: 4.2,
        status: "Open".to_string(),
        owner: "carol".to_string(),
        kri_ids: vec![],
        linked_control_ids: vec![],
        created_at: now,
        updated_at: now,
    }
}

fn sample_kri(risk_id: &str, name: &str) -> Kri {
    let now = Utc::now();
    Kri {
        id: oxgrc_common::id::next_id(),
        risk_id: risk_id.to_string(),
        name: name.to_string(),
        description: "test kri".to_string(),
        current_value: 12.0,
        threshold: 20.0,
        green_max: Some(10.0),
        yellow_max: Some(20.0),
        higher_is_worse: true,
        unit: "count".to_string(),
        trend: "stable".to_string(),
        kci_ids: vec![],
        created_at: now,
        updated_at: now,
    }
}

fn sample_kci(kri_id: &str, control_id: &str, name: &str) -> Kci {
    let now = Utc::now();
    Kci {
        id: oxgrc_common::id::next_id(),
        kri_id: kri_id.to_string(),
        unified_control_id: control_id.to_string(),
        name: name.to_string(),
        description: "test kci".to_string(),
        current_value: 98.0,
        target: 100.0,
        threshold: 95.0,
        unit: "%".to_string(),
        status: "green".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_framework_crud() {
    let (_dir, store) = setup();

    let fw = store.insert_framework(&sample_framework("ISO 27001")).unwrap();
    assert_eq!(fw.name, "ISO 27001");
    assert!(!fw.enabled);

    let fetched = store.get_framework(&fw.id).unwrap().unwrap();
    assert_eq!(fetched.version, "2022");
    assert_eq!(fetched.total_controls, 93);

    assert!(store.get_framework("nope").unwrap().is_none());
    assert_eq!(store.count_frameworks().unwrap(), 1);
}

#[test]
fn test_framework_enable_toggle() {
    let (_dir, store) = setup();
    let fw = store.insert_framework(&sample_framework("SOC 2")).unwrap();

    let enabled = store.set_framework_enabled(&fw.id, true).unwrap().unwrap();
    assert!(enabled.enabled);

    let disabled = store.set_framework_enabled(&fw.id, false).unwrap().unwrap();
    assert!(!disabled.enabled);

    assert!(store.set_framework_enabled("missing", true).unwrap().is_none());
}

#[test]
fn test_insert_framework_rejects_empty_name() {
    let (_dir, store) = setup();
    let mut fw = sample_framework("x");
    fw.name = "  ".to_string();
    let err = store.insert_framework(&fw).unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}

#[test]
fn test_framework_controls_filtered_by_framework() {
    let (_dir, store) = setup();
    let fw = store.insert_framework(&sample_framework("ISO 27001")).unwrap();
    let now = Utc::now();

    for control_id in ["A.5.1", "A.8.2"] {
        store
            .insert_framework_control(&FrameworkControl {
                id: oxgrc_common::id::next_id(),
                framework_id: fw.id.clone(),
                control_id: control_id.to_string(),
                title: format!("Control {control_id}"),
                description: String::new(),
                category: "Organizational".to_string(),
                testing_procedure: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }

    let all = store.list_framework_controls(None, 100, 0).unwrap();
    assert_eq!(all.len(), 2);

    let filtered = store
        .list_framework_controls(Some(&fw.id), 100, 0)
        .unwrap();
    assert_eq!(filtered.len(), 2);
    assert_eq!(store.count_framework_controls(Some("other")).unwrap(), 0);
}

#[test]
fn test_unified_control_mapping_lists_round_trip() {
    let (_dir, store) = setup();
    let uc = store
        .insert_unified_control(&sample_unified_control("CCF-001", "MFA Enforcement"))
        .unwrap();
    assert!(uc.mapped_framework_controls.is_empty());

    let updated = store
        .set_unified_control_framework_mapping(
            &uc.id,
            &["fc-1".to_string(), "fc-2".to_string()],
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.mapped_framework_controls, vec!["fc-1", "fc-2"]);
    assert!(updated.updated_at >= uc.updated_at);

    let updated = store
        .set_unified_control_policy_mapping(&uc.id, &["pol-1".to_string()])
        .unwrap()
        .unwrap();
    assert_eq!(updated.mapped_policies, vec!["pol-1"]);
    // 框架映射不受制度映射更新影响
    assert_eq!(updated.mapped_framework_controls, vec!["fc-1", "fc-2"]);

    assert!(store
        .set_unified_control_framework_mapping("missing", &[])
        .unwrap()
        .is_none());
}

#[test]
fn test_policy_crud() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let p = store
        .insert_policy(&InternalPolicy {
            id: oxgrc_common::id::next_id(),
            policy_id: "POL-001".to_string(),
            name: "Access Control Policy".to_string(),
            description: String::new(),
            category: "Security".to_string(),
            owner: "ciso".to_string(),
            status: PolicyStatus::Active,
            last_reviewed_at: Some(now),
            next_review_at: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let fetched = store.get_policy(&p.id).unwrap().unwrap();
    assert_eq!(fetched.status, PolicyStatus::Active);
    assert!(fetched.last_reviewed_at.is_some());
    assert!(fetched.next_review_at.is_none());
    assert_eq!(store.count_policies().unwrap(), 1);
}

#[test]
fn test_control_test_insert_and_filter() {
    let (_dir, store) = setup();
    let uc = store
        .insert_unified_control(&sample_unified_control("CCF-001", "MFA"))
        .unwrap();

    store
        .insert_control_test(&sample_control_test(&uc.id, TestResult::Pass))
        .unwrap();
    store
        .insert_control_test(&sample_control_test(&uc.id, TestResult::Fail))
        .unwrap();
    store
        .insert_control_test(&sample_control_test("other-control", TestResult::Pass))
        .unwrap();

    let for_control = store.list_control_tests(Some(&uc.id), 100, 0).unwrap();
    assert_eq!(for_control.len(), 2);
    assert_eq!(store.count_control_tests(None).unwrap(), 3);

    let all = store.list_control_tests_all().unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn test_evidence_crud() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let ev = store
        .insert_evidence(&Evidence {
            id: oxgrc_common::id::next_id(),
            unified_control_id: "ctrl-1".to_string(),
            control_test_id: None,
            evidence_type: "screenshot".to_string(),
            description: "console settings".to_string(),
            automated: false,
            file_path: Some("/data/uploads/a.png".to_string()),
            file_name: Some("a.png".to_string()),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let fetched = store.get_evidence(&ev.id).unwrap().unwrap();
    assert_eq!(fetched.file_name.as_deref(), Some("a.png"));
    assert_eq!(store.count_evidence().unwrap(), 1);
}

#[test]
fn test_issue_status_update_and_exception() {
    let (_dir, store) = setup();
    let issue = store.insert_issue(&sample_issue("Patch backlog", None)).unwrap();
    assert_eq!(issue.status, IssueStatus::Open);

    let resolved = store
        .update_issue_status(&issue.id, IssueStatus::Resolved)
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, IssueStatus::Resolved);

    // 终止状态可被重新打开
    let reopened = store
        .update_issue_status(&issue.id, IssueStatus::Open)
        .unwrap()
        .unwrap();
    assert_eq!(reopened.status, IssueStatus::Open);

    let details = serde_json::json!({"reason": "compensating control", "approved_by": "ciso"});
    let excepted = store.set_issue_exception(&issue.id, &details).unwrap().unwrap();
    assert!(excepted.has_exception);
    assert_eq!(
        excepted.exception_details.unwrap()["approved_by"],
        "ciso"
    );

    assert!(store
        .update_issue_status("missing", IssueStatus::Closed)
        .unwrap()
        .is_none());
}

#[test]
fn test_issue_lookup_by_control_test() {
    let (_dir, store) = setup();
    store
        .insert_issue(&sample_issue("From test", Some("test-42")))
        .unwrap();
    store.insert_issue(&sample_issue("Manual", None)).unwrap();

    let found = store.get_issue_by_control_test("test-42").unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().title, "From test");
    assert!(store.get_issue_by_control_test("test-43").unwrap().is_none());
}

#[test]
fn test_risk_scores_round_trip() {
    let (_dir, store) = setup();
    let r = store.insert_risk(&sample_risk("Vendor breach")).unwrap();
    let fetched = store.get_risk(&r.id).unwrap().unwrap();
    assert_eq!(fetched.inherent_risk_score, 7.5);
    assert_eq!(fetched.residual_risk_score, 4.2);
}

#[test]
fn test_kri_kci_chain_ordering() {
    let (_dir, store) = setup();
    let risk = store.insert_risk(&sample_risk("Phishing")).unwrap();

    let kri_a = store.insert_kri(&sample_kri(&risk.id, "Failed logins")).unwrap();
    let kri_b = store.insert_kri(&sample_kri(&risk.id, "Reported emails")).unwrap();
    store.insert_kri(&sample_kri("other-risk", "Unrelated")).unwrap();

    let kris = store.list_kris_by_risk(&risk.id).unwrap();
    assert_eq!(kris.len(), 2);
    assert_eq!(kris[0].id, kri_a.id);
    assert_eq!(kris[1].id, kri_b.id);

    let kci_1 = store.insert_kci(&sample_kci(&kri_a.id, "ctrl-1", "MFA coverage")).unwrap();
    let kci_2 = store.insert_kci(&sample_kci(&kri_a.id, "ctrl-2", "Training rate")).unwrap();

    let kcis = store.list_kcis_by_kri(&kri_a.id).unwrap();
    assert_eq!(kcis.len(), 2);
    assert_eq!(kcis[0].id, kci_1.id);
    assert_eq!(kcis[1].id, kci_2.id);
    assert!(store.list_kcis_by_kri(&kri_b.id).unwrap().is_empty());
}

#[test]
fn test_append_links_maintain_parent_lists() {
    let (_dir, store) = setup();
    let risk = store.insert_risk(&sample_risk("Phishing")).unwrap();
    let kri = store.insert_kri(&sample_kri(&risk.id, "Failed logins")).unwrap();

    let updated = store.append_risk_kri(&risk.id, &kri.id).unwrap().unwrap();
    assert_eq!(updated.kri_ids, vec![kri.id.clone()]);
    // 重复追加不产生重复项
    let updated = store.append_risk_kri(&risk.id, &kri.id).unwrap().unwrap();
    assert_eq!(updated.kri_ids.len(), 1);

    let kci = store.insert_kci(&sample_kci(&kri.id, "ctrl-1", "MFA coverage")).unwrap();
    let updated = store.append_kri_kci(&kri.id, &kci.id).unwrap().unwrap();
    assert_eq!(updated.kci_ids, vec![kci.id.clone()]);

    assert!(store.append_risk_kri("missing", &kri.id).unwrap().is_none());
    assert!(store.append_kri_kci("missing", &kci.id).unwrap().is_none());
}

#[test]
fn test_ai_model_and_assessment() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let model = store
        .insert_ai_model(&AiModel {
            id: oxgrc_common::id::next_id(),
            name: "fraud-scorer".to_string(),
            description: String::new(),
            owner: "ml-team".to_string(),
            status: ModelStatus::Production,
            risk_level: ModelRiskLevel::High,
            version: "1.4.0".to_string(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    store
        .insert_ai_assessment(&AiAssessment {
            id: oxgrc_common::id::next_id(),
            ai_model_id: model.id.clone(),
            assessor: "alice".to_string(),
            assessed_at: now,
            result: "Approved".to_string(),
            notes: "bias review passed".to_string(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let fetched = store.get_ai_model(&model.id).unwrap().unwrap();
    assert_eq!(fetched.status, ModelStatus::Production);
    assert_eq!(fetched.risk_level, ModelRiskLevel::High);

    let assessments = store.list_ai_assessments(Some(&model.id), 100, 0).unwrap();
    assert_eq!(assessments.len(), 1);
    assert_eq!(store.count_ai_assessments(None).unwrap(), 1);
}

#[test]
fn test_connector_config_round_trip() {
    let (_dir, store) = setup();
    let now = Utc::now();
    let c = store
        .insert_connector(&Connector {
            id: oxgrc_common::id::next_id(),
            name: "aws-config".to_string(),
            connector_type: "aws".to_string(),
            config: serde_json::json!({"region": "us-east-1", "role_arn": "arn:aws:iam::1:role/x"}),
            enabled: true,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let fetched = store.get_connector(&c.id).unwrap().unwrap();
    assert_eq!(fetched.config["region"], "us-east-1");
    assert!(fetched.enabled);
}

#[test]
fn test_audit_log_append_and_list_newest_first() {
    let (_dir, store) = setup();
    for (i, action) in ["create", "update"].iter().enumerate() {
        store
            .insert_audit_log(&AuditLog {
                id: oxgrc_common::id::next_id(),
                actor: "admin".to_string(),
                action: action.to_string(),
                resource_type: "framework".to_string(),
                detail: format!("entry {i}"),
                created_at: Utc::now() + chrono::Duration::seconds(i as i64),
            })
            .unwrap();
    }

    let logs = store.list_audit_logs(10, 0).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action, "update");
    assert_eq!(store.count_audit_logs().unwrap(), 2);
}

#[test]
fn test_user_crud_and_unique_username() {
    let (_dir, store) = setup();
    let user = store.create_user("admin", "hash1").unwrap();
    assert_eq!(user.username, "admin");

    let dup = store.create_user("admin", "hash2");
    assert!(dup.is_err());
    assert!(dup.unwrap_err().to_string().contains("UNIQUE constraint"));

    assert!(store.update_user_password(&user.id, "hash3").unwrap());
    let fetched = store.get_user_by_id(&user.id).unwrap().unwrap();
    assert_eq!(fetched.password_hash, "hash3");
    assert_eq!(store.count_users().unwrap(), 1);
}

#[test]
fn test_clear_entity_collections_keeps_users_and_audit() {
    let (_dir, store) = setup();
    store.insert_framework(&sample_framework("ISO 27001")).unwrap();
    store
        .insert_unified_control(&sample_unified_control("CCF-001", "MFA"))
        .unwrap();
    store.create_user("admin", "hash").unwrap();
    store
        .insert_audit_log(&AuditLog {
            id: oxgrc_common::id::next_id(),
            actor: "admin".to_string(),
            action: "reseed".to_string(),
            resource_type: "system".to_string(),
            detail: String::new(),
            created_at: Utc::now(),
        })
        .unwrap();

    store.clear_entity_collections().unwrap();

    assert_eq!(store.count_frameworks().unwrap(), 0);
    assert_eq!(store.count_unified_controls().unwrap(), 0);
    assert_eq!(store.count_users().unwrap(), 1);
    assert_eq!(store.count_audit_logs().unwrap(), 1);
}

#[test]
fn test_pagination_limit_offset() {
    let (_dir, store) = setup();
    for i in 0..5 {
        store
            .insert_framework(&sample_framework(&format!("FW {i}")))
            .unwrap();
    }

    let page = store.list_frameworks(2, 0).unwrap();
    assert_eq!(page.len(), 2);
    let page = store.list_frameworks(2, 4).unwrap();
    assert_eq!(page.len(), 1);
    let page = store.list_frameworks(2, 10).unwrap();
    assert!(page.is_empty());
}
