//! 控制映射：框架控制项 ↔ 统一控制 ↔ 内部制度，以及 Risk → KRI → KCI 链。
//!
//! Mapping lists store bare ids; display labels are joined against the live
//! collections at read time by [`resolve_mapping_view`].

use crate::error::{CoreError, Result};
use oxgrc_common::types::{Kci, Kri, PolicyStatus, UnifiedControl};
use oxgrc_storage::GrcStore;
use serde::Serialize;
use utoipa::ToSchema;

/// How strictly mapped ids are checked against the referenced collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Every referenced id must exist. Default for API writes.
    #[default]
    Strict,
    /// Unknown ids are accepted as-is. Used by bulk seed loads.
    Lenient,
}

/// 去重并保持首次出现顺序
fn dedupe_ids(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Replaces the unified control's framework-control mapping list.
///
/// Replace, not merge: the stored list becomes exactly the (deduplicated)
/// input, so repeating the call with the same set is a no-op.
pub fn set_framework_mapping(
    store: &GrcStore,
    unified_control_id: &str,
    framework_control_ids: &[String],
    policy: ReferencePolicy,
) -> Result<UnifiedControl> {
    let ids = dedupe_ids(framework_control_ids);
    if policy == ReferencePolicy::Strict {
        for id in &ids {
            if store.get_framework_control(id)?.is_none() {
                return Err(CoreError::Validation(format!(
                    "unknown framework control id '{id}'"
                )));
            }
        }
    }
    store
        .set_unified_control_framework_mapping(unified_control_id, &ids)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "unified_control",
            id: unified_control_id.to_string(),
        })
}

/// Replaces the unified control's policy mapping list. Same replace
/// semantics as [`set_framework_mapping`].
pub fn set_policy_mapping(
    store: &GrcStore,
    unified_control_id: &str,
    policy_ids: &[String],
    policy: ReferencePolicy,
) -> Result<UnifiedControl> {
    let ids = dedupe_ids(policy_ids);
    if policy == ReferencePolicy::Strict {
        for id in &ids {
            if store.get_policy(id)?.is_none() {
                return Err(CoreError::Validation(format!("unknown policy id '{id}'")));
            }
        }
    }
    store
        .set_unified_control_policy_mapping(unified_control_id, &ids)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "unified_control",
            id: unified_control_id.to_string(),
        })
}

/// 映射展示视图中的框架控制项条目
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedFrameworkControl {
    pub id: String,
    pub framework_id: String,
    /// 所属框架名称（框架本身被删除时为空）
    pub framework_name: Option<String>,
    pub control_id: String,
    pub title: String,
}

/// 映射展示视图中的制度条目
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedPolicy {
    pub id: String,
    pub policy_id: String,
    pub name: String,
    pub status: PolicyStatus,
}

/// Read-only projection of one unified control's mappings with display
/// labels joined in. Dangling ids land in the `unresolved_*` lists instead
/// of failing the projection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MappingView {
    pub unified_control_id: String,
    pub ccf_id: String,
    pub name: String,
    pub framework_controls: Vec<ResolvedFrameworkControl>,
    pub policies: Vec<ResolvedPolicy>,
    pub unresolved_framework_controls: Vec<String>,
    pub unresolved_policies: Vec<String>,
    pub framework_control_count: usize,
    pub policy_count: usize,
}

pub fn resolve_mapping_view(store: &GrcStore, unified_control_id: &str) -> Result<MappingView> {
    let control = store
        .get_unified_control(unified_control_id)?
        .ok_or_else(|| CoreError::NotFound {
            entity: "unified_control",
            id: unified_control_id.to_string(),
        })?;

    let mut framework_controls = Vec::new();
    let mut unresolved_framework_controls = Vec::new();
    for id in &control.mapped_framework_controls {
        match store.get_framework_control(id)? {
            Some(fc) => {
                let framework_name = store
                    .get_framework(&fc.framework_id)?
                    .map(|fw| fw.name);
                framework_controls.push(ResolvedFrameworkControl {
                    id: fc.id,
                    framework_id: fc.framework_id,
                    framework_name,
                    control_id: fc.control_id,
                    title: fc.title,
                });
            }
            None => unresolved_framework_controls.push(id.clone()),
        }
    }

    let mut policies = Vec::new();
    let mut unresolved_policies = Vec::new();
    for id in &control.mapped_policies {
        match store.get_policy(id)? {
            Some(p) => policies.push(ResolvedPolicy {
                id: p.id,
                policy_id: p.policy_id,
                name: p.name,
                status: p.status,
            }),
            None => unresolved_policies.push(id.clone()),
        }
    }

    if !unresolved_framework_controls.is_empty() || !unresolved_policies.is_empty() {
        tracing::warn!(
            unified_control_id,
            dangling_framework_controls = unresolved_framework_controls.len(),
            dangling_policies = unresolved_policies.len(),
            "Mapping view contains dangling references"
        );
    }

    Ok(MappingView {
        unified_control_id: control.id,
        ccf_id: control.ccf_id,
        name: control.name,
        framework_control_count: framework_controls.len(),
        policy_count: policies.len(),
        framework_controls,
        policies,
        unresolved_framework_controls,
        unresolved_policies,
    })
}

/// 一个 KRI 及其下属 KCI 列表
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KriChainEntry {
    pub kri: Kri,
    pub kcis: Vec<Kci>,
}

/// Resolves the Risk → KRI → KCI chain for one risk in stable creation
/// order. The chain is a strict three-level tree, so no cycle handling is
/// needed.
pub fn resolve_kri_kci_chain(store: &GrcStore, risk_id: &str) -> Result<Vec<KriChainEntry>> {
    if store.get_risk(risk_id)?.is_none() {
        return Err(CoreError::NotFound {
            entity: "risk",
            id: risk_id.to_string(),
        });
    }

    let mut chain = Vec::new();
    for kri in store.list_kris_by_risk(risk_id)? {
        let kcis = store.list_kcis_by_kri(&kri.id)?;
        chain.push(KriChainEntry { kri, kcis });
    }
    Ok(chain)
}
