//! 控制测试与整改问题生命周期。
//!
//! Recording a failed control test automatically materializes a remediation
//! issue. Issue creation is idempotent on `control_test_id`: a request
//! retried with the same caller-supplied test id reuses the stored test
//! record and its issue instead of creating duplicates.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use oxgrc_common::types::{ControlTest, Issue, IssueSeverity, IssueStatus, TestResult};
use oxgrc_storage::GrcStore;

/// Input for recording a control test. Test records are immutable once
/// created.
#[derive(Debug, Clone)]
pub struct NewControlTest {
    /// 调用方指定的测试 ID。重试时携带同一 ID 可复用已落库的记录。
    /// 缺省由服务端生成。
    pub id: Option<String>,
    pub unified_control_id: String,
    pub tester: String,
    /// 缺省为当前时间
    pub tested_at: Option<DateTime<Utc>>,
    pub result: TestResult,
    pub notes: String,
    pub evidence_ids: Vec<String>,
    pub automated: bool,
    pub connector_id: Option<String>,
}

/// The recorded test plus the auto-created issue, when the result was Fail.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub test: ControlTest,
    pub auto_issue: Option<Issue>,
}

/// Records a control test outcome against an existing unified control.
///
/// On `Fail` an Open / High issue is created, assigned to the tester and
/// back-referencing both the control and the test. The test write is
/// committed first; an issue-insert failure is logged and accepted rather
/// than rolled back. When `input.id` names an already-stored test the call
/// is a retry: the existing record is returned and, for a Fail result, the
/// issue is looked up or created exactly once.
pub fn record_control_test(store: &GrcStore, input: NewControlTest) -> Result<TestOutcome> {
    let control = store
        .get_unified_control(&input.unified_control_id)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "unified_control",
            id: input.unified_control_id.clone(),
        })?;

    // 重试路径：同一测试 ID 已落库时复用原记录，不再新增
    if let Some(id) = &input.id {
        if let Some(existing) = store.get_control_test(id)? {
            let auto_issue = if existing.result == TestResult::Fail {
                create_issue_for_failed_test(store, &existing, &control.name)
            } else {
                None
            };
            return Ok(TestOutcome {
                test: existing,
                auto_issue,
            });
        }
    }

    let now = Utc::now();
    let test = store.insert_control_test(&ControlTest {
        id: input.id.unwrap_or_else(oxgrc_common::id::next_id),
        unified_control_id: input.unified_control_id,
        tester: input.tester,
        tested_at: input.tested_at.unwrap_or(now),
        result: input.result,
        notes: input.notes,
        evidence_ids: input.evidence_ids,
        automated: input.automated,
        connector_id: input.connector_id,
        created_at: now,
        updated_at: now,
    })?;

    let auto_issue = if test.result == TestResult::Fail {
        create_issue_for_failed_test(store, &test, &control.name)
    } else {
        None
    };

    Ok(TestOutcome { test, auto_issue })
}

fn create_issue_for_failed_test(
    store: &GrcStore,
    test: &ControlTest,
    control_name: &str,
) -> Option<Issue> {
    // 幂等：同一测试最多产生一个问题
    match store.get_issue_by_control_test(&test.id) {
        Ok(Some(existing)) => return Some(existing),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, test_id = %test.id, "Failed to check for existing auto-issue");
            return None;
        }
    }

    let description = if test.notes.trim().is_empty() {
        "Control test failed; no additional notes were provided.".to_string()
    } else {
        format!("Test notes: {}", test.notes)
    };
    let now = Utc::now();
    let issue = Issue {
        id: oxgrc_common::id::next_id(),
        title: format!("Control Test Failed: {control_name}"),
        description,
        severity: IssueSeverity::High,
        status: IssueStatus::Open,
        assigned_to: test.tester.clone(),
        due_date: None,
        unified_control_id: Some(test.unified_control_id.clone()),
        control_test_id: Some(test.id.clone()),
        has_exception: false,
        exception_details: None,
        created_at: now,
        updated_at: now,
    };

    match store.insert_issue(&issue) {
        Ok(created) => {
            tracing::info!(
                issue_id = %created.id,
                test_id = %test.id,
                "Auto-created remediation issue for failed control test"
            );
            Some(created)
        }
        // 测试记录已落库，问题创建失败仅记录日志
        Err(e) => {
            tracing::error!(error = %e, test_id = %test.id, "Failed to auto-create issue");
            None
        }
    }
}

/// Moves an issue to a new status. Transitions are caller-driven and
/// unrestricted, so a Resolved or Closed issue can be reopened.
pub fn update_issue_status(store: &GrcStore, issue_id: &str, status: IssueStatus) -> Result<Issue> {
    store
        .update_issue_status(issue_id, status)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "issue",
            id: issue_id.to_string(),
        })
}

/// Attaches an exception (risk acceptance) payload to a non-terminal issue
/// without changing its status.
pub fn grant_issue_exception(
    store: &GrcStore,
    issue_id: &str,
    details: &serde_json::Value,
) -> Result<Issue> {
    let issue = store
        .get_issue(issue_id)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "issue",
            id: issue_id.to_string(),
        })?;
    if issue.status.is_terminal() {
        return Err(CoreError::Validation(format!(
            "cannot grant an exception on a {} issue",
            issue.status.as_str()
        )));
    }
    store
        .set_issue_exception(issue_id, details)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "issue",
            id: issue_id.to_string(),
        })
}
