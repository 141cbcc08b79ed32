mod common;

use axum::http::StatusCode;
use common::*;

/// 端到端：建框架 → 映射统一控制 → 测试失败自动生成问题 →
/// 整改关闭后仪表盘开口问题数下降。
#[tokio::test]
async fn test_failed_control_test_through_remediation() {
    let ctx = build_test_context().expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let fw_id = create_framework(&ctx.app, &token, "ISO 27001").await;
    let fc_id = create_framework_control(&ctx.app, &token, &fw_id, "A.8.2").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/unified-controls",
        Some(&token),
        Some(serde_json::json!({
            "ccf_id": "CCF-001",
            "name": "Multi-Factor Authentication",
            "control_type": "Preventive",
            "frequency": "Quarterly",
            "owner": "IAM Team",
            "mapped_framework_controls": [fc_id],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    let uc_id = body["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(body["data"]["mapped_framework_controls"][0], fc_id);

    // 映射视图带展示信息
    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/unified-controls/{uc_id}/mapping"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["framework_control_count"], 1);
    assert_eq!(body["data"]["framework_controls"][0]["control_id"], "A.8.2");
    assert_eq!(body["data"]["framework_controls"][0]["framework_name"], "ISO 27001");
    assert!(body["data"]["unresolved_framework_controls"]
        .as_array()
        .expect("array")
        .is_empty());

    // 失败的测试自动生成 Open / High 问题并指派给测试人
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/control-tests",
        Some(&token),
        Some(serde_json::json!({
            "unified_control_id": uc_id,
            "tester": "alice",
            "result": "Fail",
            "notes": "Two service accounts bypass MFA.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let issue = &body["data"]["auto_issue"];
    assert_eq!(
        issue["title"],
        "Control Test Failed: Multi-Factor Authentication"
    );
    assert_eq!(issue["severity"], "High");
    assert_eq!(issue["status"], "Open");
    assert_eq!(issue["assigned_to"], "alice");
    assert_eq!(issue["unified_control_id"], uc_id);
    let issue_id = issue["id"].as_str().expect("issue id").to_string();

    // 通过的测试不产生问题
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/control-tests",
        Some(&token),
        Some(serde_json::json!({
            "unified_control_id": uc_id,
            "tester": "alice",
            "result": "Pass",
            "notes": "Re-test after remediation.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["auto_issue"].is_null());

    // 仪表盘：1 框架启用、1 控制、50% 有效性、1 个未关闭问题
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/dashboard/stats", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled_frameworks"], 1);
    assert_eq!(body["data"]["total_unified_controls"], 1);
    assert_eq!(body["data"]["control_effectiveness"], 50.0);
    assert_eq!(body["data"]["open_issues"], 1);

    // 问题整改关闭
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/issues/{issue_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "Resolved"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Resolved");

    let (_, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/dashboard/stats", Some(&token)).await;
    assert_eq!(body["data"]["open_issues"], 0);
}

#[tokio::test]
async fn test_strict_mapping_rejects_unknown_ids() {
    let ctx = build_test_context().expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let uc_id = create_unified_control(&ctx.app, &token, "CCF-010").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/unified-controls/{uc_id}/map-framework"),
        Some(&token),
        Some(serde_json::json!({"framework_control_ids": ["missing-id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
    assert!(body["err_msg"]
        .as_str()
        .expect("message")
        .contains("missing-id"));
}

#[tokio::test]
async fn test_mapping_replace_is_idempotent_and_deduplicated() {
    let ctx = build_test_context().expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let fw_id = create_framework(&ctx.app, &token, "SOC 2").await;
    let fc_a = create_framework_control(&ctx.app, &token, &fw_id, "CC6.1").await;
    let fc_b = create_framework_control(&ctx.app, &token, &fw_id, "CC7.2").await;
    let uc_id = create_unified_control(&ctx.app, &token, "CCF-020").await;

    // 重复 ID 去重，保持首次出现顺序
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/unified-controls/{uc_id}/map-framework"),
        Some(&token),
        Some(serde_json::json!({"framework_control_ids": [fc_a, fc_b, fc_a]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mapped = body["data"]["mapped_framework_controls"]
        .as_array()
        .expect("array");
    assert_eq!(mapped.len(), 2);
    assert_eq!(mapped[0], fc_a);
    assert_eq!(mapped[1], fc_b);

    // 同样的集合重复提交是无操作
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/unified-controls/{uc_id}/map-framework"),
        Some(&token),
        Some(serde_json::json!({"framework_control_ids": [fc_a, fc_b]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["mapped_framework_controls"]
            .as_array()
            .expect("array")
            .len(),
        2
    );

    // 整体替换为单元素
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/unified-controls/{uc_id}/map-framework"),
        Some(&token),
        Some(serde_json::json!({"framework_control_ids": [fc_b]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mapped = body["data"]["mapped_framework_controls"]
        .as_array()
        .expect("array");
    assert_eq!(mapped.len(), 1);
    assert_eq!(mapped[0], fc_b);
}

#[tokio::test]
async fn test_control_test_retry_with_client_id_is_idempotent() {
    let ctx = build_test_context().expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let uc_id = create_unified_control(&ctx.app, &token, "CCF-040").await;
    let payload = serde_json::json!({
        "test_id": "ct-client-7",
        "unified_control_id": uc_id,
        "tester": "alice",
        "result": "Fail",
        "notes": "Expired root certificate.",
    });

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/control-tests",
        Some(&token),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["test"]["id"], "ct-client-7");
    let issue_id = body["data"]["auto_issue"]["id"]
        .as_str()
        .expect("issue id")
        .to_string();

    // 原样重发同一请求：复用已有测试记录与问题
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/control-tests",
        Some(&token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["test"]["id"], "ct-client-7");
    assert_eq!(body["data"]["auto_issue"]["id"], issue_id);

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/control-tests?unified_control_id={uc_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/issues", Some(&token)).await;
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn test_issue_reopen_and_exception_rules() {
    let ctx = build_test_context().expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/issues",
        Some(&token),
        Some(serde_json::json!({
            "title": "Stale firewall rules",
            "severity": "Medium",
            "assigned_to": "bob",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let issue_id = body["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(body["data"]["status"], "Open");

    // 例外批准不改变状态
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/issues/{issue_id}/exception"),
        Some(&token),
        Some(serde_json::json!({"details": {"reason": "compensating control", "approved_by": "ciso"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["has_exception"], true);
    assert_eq!(body["data"]["status"], "Open");
    assert_eq!(body["data"]["exception_details"]["approved_by"], "ciso");

    // 关闭后不能再批准例外
    let (_, _, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/issues/{issue_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "Closed"})),
    )
    .await;
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/issues/{issue_id}/exception"),
        Some(&token),
        Some(serde_json::json!({"details": {"reason": "late"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    // 已关闭的问题可以重新打开
    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/v1/issues/{issue_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "In Progress"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "In Progress");
}

#[tokio::test]
async fn test_mapping_view_reports_dangling_references() {
    let ctx = build_test_context().expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let uc_id = create_unified_control(&ctx.app, &token, "CCF-030").await;
    // 直接走存储层造一条悬挂引用，展示接口必须容忍
    ctx.state
        .store
        .set_unified_control_framework_mapping(&uc_id, &["ghost-id".to_string()])
        .expect("mapping update should succeed")
        .expect("unified control should exist");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/unified-controls/{uc_id}/mapping"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["framework_control_count"], 0);
    assert_eq!(body["data"]["unresolved_framework_controls"][0], "ghost-id");
}
