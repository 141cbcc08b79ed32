use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use oxgrc_common::types::{
    AiAssessment, AiModel, AuditLog, Connector, ControlTest, Evidence, Framework,
    FrameworkControl, InternalPolicy, Issue, IssueStatus, Kci, Kri, Risk, UnifiedControl, User,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const FRAMEWORKS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS frameworks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    version TEXT NOT NULL,
    category TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 0,
    total_controls INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_frameworks_enabled ON frameworks(enabled);
";

const FRAMEWORK_CONTROLS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS framework_controls (
    id TEXT PRIMARY KEY,
    framework_id TEXT NOT NULL,
    control_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    testing_procedure TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_framework_controls_framework ON framework_controls(framework_id);
";

const UNIFIED_CONTROLS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS unified_controls (
    id TEXT PRIMARY KEY,
    ccf_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    control_type TEXT NOT NULL,
    frequency TEXT NOT NULL,
    owner TEXT NOT NULL,
    mapped_framework_controls TEXT NOT NULL DEFAULT '[]',
    mapped_policies TEXT NOT NULL DEFAULT '[]',
    automation_possible INTEGER NOT NULL DEFAULT 0,
    automation_config TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_unified_controls_ccf ON unified_controls(ccf_id);
";

const POLICIES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS policies (
    id TEXT PRIMARY KEY,
    policy_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    owner TEXT NOT NULL,
    status TEXT NOT NULL,
    last_reviewed_at INTEGER,
    next_review_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const CONTROL_TESTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS control_tests (
    id TEXT PRIMARY KEY,
    unified_control_id TEXT NOT NULL,
    tester TEXT NOT NULL,
    tested_at INTEGER NOT NULL,
    result TEXT NOT NULL,
    notes TEXT NOT NULL,
    evidence_ids TEXT NOT NULL DEFAULT '[]',
    automated INTEGER NOT NULL DEFAULT 0,
    connector_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_control_tests_control ON control_tests(unified_control_id);
CREATE INDEX IF NOT EXISTS idx_control_tests_result ON control_tests(result);
";

const EVIDENCE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS evidence (
    id TEXT PRIMARY KEY,
    unified_control_id TEXT NOT NULL,
    control_test_id TEXT,
    evidence_type TEXT NOT NULL,
    description TEXT NOT NULL,
    automated INTEGER NOT NULL DEFAULT 0,
    file_path TEXT,
    file_name TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_evidence_control ON evidence(unified_control_id);
";

const ISSUES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    assigned_to TEXT NOT NULL,
    due_date INTEGER,
    unified_control_id TEXT,
    control_test_id TEXT,
    has_exception INTEGER NOT NULL DEFAULT 0,
    exception_details TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
CREATE INDEX IF NOT EXISTS idx_issues_control_test ON issues(control_test_id);
";

const RISKS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS risks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    inherent_risk_score REAL NOT NULL,
    residual_risk_score REAL NOT NULL,
    status TEXT NOT NULL,
    owner TEXT NOT NULL,
    kri_ids TEXT NOT NULL DEFAULT '[]',
    linked_control_ids TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const KRIS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kris (
    id TEXT PRIMARY KEY,
    risk_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    current_value REAL NOT NULL,
    threshold REAL NOT NULL,
    green_max REAL,
    yellow_max REAL,
    higher_is_worse INTEGER NOT NULL DEFAULT 1,
    unit TEXT NOT NULL,
    trend TEXT NOT NULL,
    kci_ids TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kris_risk ON kris(risk_id);
";

const KCIS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kcis (
    id TEXT PRIMARY KEY,
    kri_id TEXT NOT NULL,
    unified_control_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    current_value REAL NOT NULL,
    target REAL NOT NULL,
    threshold REAL NOT NULL,
    unit TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kcis_kri ON kcis(kri_id);
";

const AI_MODELS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ai_models (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    owner TEXT NOT NULL,
    status TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    version TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const AI_ASSESSMENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ai_assessments (
    id TEXT PRIMARY KEY,
    ai_model_id TEXT NOT NULL,
    assessor TEXT NOT NULL,
    assessed_at INTEGER NOT NULL,
    result TEXT NOT NULL,
    notes TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ai_assessments_model ON ai_assessments(ai_model_id);
";

const CONNECTORS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS connectors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    connector_type TEXT NOT NULL,
    config TEXT NOT NULL DEFAULT '{}',
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

const AUDIT_LOGS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    detail TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs(created_at);
";

const USERS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// Entity tables wiped by an administrative reseed. Users and audit logs
/// survive a reseed.
const RESEED_TABLES: &[&str] = &[
    "frameworks",
    "framework_controls",
    "unified_controls",
    "policies",
    "control_tests",
    "evidence",
    "issues",
    "risks",
    "kris",
    "kcis",
    "ai_models",
    "ai_assessments",
    "connectors",
];

/// Single-database store for every GRC entity collection.
pub struct GrcStore {
    conn: Mutex<Connection>,
    _db_path: PathBuf,
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

fn opt_ts(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(ts)
}

fn ids_to_json(ids: &[String]) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

/// Tolerant read of a JSON id-list column: malformed text reads as empty.
fn ids_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn opt_json_value(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn parse_enum<T>(raw: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(StorageError::Other)
}

fn require_field(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StorageError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl GrcStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::Other(format!("failed to create data dir: {e}")))?;
        let db_path = data_dir.join("grc.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(FRAMEWORKS_SCHEMA)?;
        conn.execute_batch(FRAMEWORK_CONTROLS_SCHEMA)?;
        conn.execute_batch(UNIFIED_CONTROLS_SCHEMA)?;
        conn.execute_batch(POLICIES_SCHEMA)?;
        conn.execute_batch(CONTROL_TESTS_SCHEMA)?;
        conn.execute_batch(EVIDENCE_SCHEMA)?;
        conn.execute_batch(ISSUES_SCHEMA)?;
        conn.execute_batch(RISKS_SCHEMA)?;
        conn.execute_batch(KRIS_SCHEMA)?;
        conn.execute_batch(KCIS_SCHEMA)?;
        conn.execute_batch(AI_MODELS_SCHEMA)?;
        conn.execute_batch(AI_ASSESSMENTS_SCHEMA)?;
        conn.execute_batch(CONNECTORS_SCHEMA)?;
        conn.execute_batch(AUDIT_LOGS_SCHEMA)?;
        conn.execute_batch(USERS_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized GRC store");
        Ok(Self {
            conn: Mutex::new(conn),
            _db_path: db_path,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn count_table(&self, sql: &str) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ---- frameworks ----

    fn row_to_framework(row: &rusqlite::Row<'_>) -> Result<Framework> {
        Ok(Framework {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            version: row.get(3)?,
            category: row.get(4)?,
            enabled: row.get::<_, i64>(5)? != 0,
            total_controls: row.get::<_, i64>(6)? as u32,
            created_at: ts(row.get(7)?),
            updated_at: ts(row.get(8)?),
        })
    }

    const FRAMEWORK_COLS: &'static str =
        "id, name, description, version, category, enabled, total_controls, created_at, updated_at";

    pub fn insert_framework(&self, fw: &Framework) -> Result<Framework> {
        require_field(&fw.name, "name")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO frameworks (id, name, description, version, category, enabled, total_controls, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                fw.id,
                fw.name,
                fw.description,
                fw.version,
                fw.category,
                fw.enabled as i64,
                fw.total_controls as i64,
                fw.created_at.timestamp(),
                fw.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_framework(&fw.id)?
            .ok_or(StorageError::InsertReadback { entity: "framework" })
    }

    pub fn get_framework(&self, id: &str) -> Result<Option<Framework>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM frameworks WHERE id = ?1",
            Self::FRAMEWORK_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_framework(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_frameworks(&self, limit: usize, offset: usize) -> Result<Vec<Framework>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM frameworks ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::FRAMEWORK_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_framework(row)?);
        }
        Ok(out)
    }

    pub fn list_frameworks_all(&self) -> Result<Vec<Framework>> {
        self.list_frameworks(usize::MAX >> 1, 0)
    }

    pub fn count_frameworks(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM frameworks")
    }

    pub fn set_framework_enabled(&self, id: &str, enabled: bool) -> Result<Option<Framework>> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE frameworks SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![enabled as i64, Utc::now().timestamp(), id],
        )?;
        drop(conn);
        if changed == 0 {
            return Ok(None);
        }
        self.get_framework(id)
    }

    // ---- framework controls ----

    fn row_to_framework_control(row: &rusqlite::Row<'_>) -> Result<FrameworkControl> {
        Ok(FrameworkControl {
            id: row.get(0)?,
            framework_id: row.get(1)?,
            control_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            category: row.get(5)?,
            testing_procedure: row.get(6)?,
            created_at: ts(row.get(7)?),
            updated_at: ts(row.get(8)?),
        })
    }

    const FRAMEWORK_CONTROL_COLS: &'static str =
        "id, framework_id, control_id, title, description, category, testing_procedure, created_at, updated_at";

    pub fn insert_framework_control(&self, fc: &FrameworkControl) -> Result<FrameworkControl> {
        require_field(&fc.title, "title")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO framework_controls (id, framework_id, control_id, title, description, category, testing_procedure, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                fc.id,
                fc.framework_id,
                fc.control_id,
                fc.title,
                fc.description,
                fc.category,
                fc.testing_procedure,
                fc.created_at.timestamp(),
                fc.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_framework_control(&fc.id)?
            .ok_or(StorageError::InsertReadback {
                entity: "framework_control",
            })
    }

    pub fn get_framework_control(&self, id: &str) -> Result<Option<FrameworkControl>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM framework_controls WHERE id = ?1",
            Self::FRAMEWORK_CONTROL_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_framework_control(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_framework_controls(
        &self,
        framework_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FrameworkControl>> {
        let conn = self.conn();
        let mut out = Vec::new();
        match framework_id {
            Some(fid) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM framework_controls WHERE framework_id = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2 OFFSET ?3",
                    Self::FRAMEWORK_CONTROL_COLS
                ))?;
                let mut rows = stmt.query(rusqlite::params![fid, limit as i64, offset as i64])?;
                while let Some(row) = rows.next()? {
                    out.push(Self::row_to_framework_control(row)?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM framework_controls ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
                    Self::FRAMEWORK_CONTROL_COLS
                ))?;
                let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
                while let Some(row) = rows.next()? {
                    out.push(Self::row_to_framework_control(row)?);
                }
            }
        }
        Ok(out)
    }

    pub fn count_framework_controls(&self, framework_id: Option<&str>) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = match framework_id {
            Some(fid) => conn.query_row(
                "SELECT COUNT(*) FROM framework_controls WHERE framework_id = ?1",
                rusqlite::params![fid],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM framework_controls", [], |row| {
                row.get(0)
            })?,
        };
        Ok(count as u64)
    }

    // ---- unified controls ----

    fn row_to_unified_control(row: &rusqlite::Row<'_>) -> Result<UnifiedControl> {
        Ok(UnifiedControl {
            id: row.get(0)?,
            ccf_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            control_type: parse_enum(&row.get::<_, String>(4)?)?,
            frequency: row.get(5)?,
            owner: row.get(6)?,
            mapped_framework_controls: ids_from_json(&row.get::<_, String>(7)?),
            mapped_policies: ids_from_json(&row.get::<_, String>(8)?),
            automation_possible: row.get::<_, i64>(9)? != 0,
            automation_config: opt_json_value(row.get(10)?),
            created_at: ts(row.get(11)?),
            updated_at: ts(row.get(12)?),
        })
    }

    const UNIFIED_CONTROL_COLS: &'static str =
        "id, ccf_id, name, description, control_type, frequency, owner, mapped_framework_controls, mapped_policies, automation_possible, automation_config, created_at, updated_at";

    pub fn insert_unified_control(&self, uc: &UnifiedControl) -> Result<UnifiedControl> {
        require_field(&uc.name, "name")?;
        require_field(&uc.ccf_id, "ccf_id")?;
        let mapped_fc = ids_to_json(&uc.mapped_framework_controls)?;
        let mapped_pol = ids_to_json(&uc.mapped_policies)?;
        let automation_config = uc
            .automation_config
            .as_ref()
            .map(|v| v.to_string());
        let conn = self.conn();
        conn.execute(
            "INSERT INTO unified_controls (id, ccf_id, name, description, control_type, frequency, owner, mapped_framework_controls, mapped_policies, automation_possible, automation_config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                uc.id,
                uc.ccf_id,
                uc.name,
                uc.description,
                uc.control_type.as_str(),
                uc.frequency,
                uc.owner,
                mapped_fc,
                mapped_pol,
                uc.automation_possible as i64,
                automation_config,
                uc.created_at.timestamp(),
                uc.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_unified_control(&uc.id)?
            .ok_or(StorageError::InsertReadback {
                entity: "unified_control",
            })
    }

    pub fn get_unified_control(&self, id: &str) -> Result<Option<UnifiedControl>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM unified_controls WHERE id = ?1",
            Self::UNIFIED_CONTROL_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_unified_control(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_unified_controls(&self, limit: usize, offset: usize) -> Result<Vec<UnifiedControl>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM unified_controls ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::UNIFIED_CONTROL_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_unified_control(row)?);
        }
        Ok(out)
    }

    pub fn list_unified_controls_all(&self) -> Result<Vec<UnifiedControl>> {
        self.list_unified_controls(usize::MAX >> 1, 0)
    }

    pub fn count_unified_controls(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM unified_controls")
    }

    /// Replaces the framework-control mapping list. The caller has already
    /// normalized and validated the ids.
    pub fn set_unified_control_framework_mapping(
        &self,
        id: &str,
        framework_control_ids: &[String],
    ) -> Result<Option<UnifiedControl>> {
        let json = ids_to_json(framework_control_ids)?;
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE unified_controls SET mapped_framework_controls = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![json, Utc::now().timestamp(), id],
        )?;
        drop(conn);
        if changed == 0 {
            return Ok(None);
        }
        self.get_unified_control(id)
    }

    /// Replaces the policy mapping list.
    pub fn set_unified_control_policy_mapping(
        &self,
        id: &str,
        policy_ids: &[String],
    ) -> Result<Option<UnifiedControl>> {
        let json = ids_to_json(policy_ids)?;
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE unified_controls SET mapped_policies = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![json, Utc::now().timestamp(), id],
        )?;
        drop(conn);
        if changed == 0 {
            return Ok(None);
        }
        self.get_unified_control(id)
    }

    // ---- policies ----

    fn row_to_policy(row: &rusqlite::Row<'_>) -> Result<InternalPolicy> {
        Ok(InternalPolicy {
            id: row.get(0)?,
            policy_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            category: row.get(4)?,
            owner: row.get(5)?,
            status: parse_enum(&row.get::<_, String>(6)?)?,
            last_reviewed_at: opt_ts(row.get(7)?),
            next_review_at: opt_ts(row.get(8)?),
            created_at: ts(row.get(9)?),
            updated_at: ts(row.get(10)?),
        })
    }

    const POLICY_COLS: &'static str =
        "id, policy_id, name, description, category, owner, status, last_reviewed_at, next_review_at, created_at, updated_at";

    pub fn insert_policy(&self, p: &InternalPolicy) -> Result<InternalPolicy> {
        require_field(&p.name, "name")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO policies (id, policy_id, name, description, category, owner, status, last_reviewed_at, next_review_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                p.id,
                p.policy_id,
                p.name,
                p.description,
                p.category,
                p.owner,
                p.status.as_str(),
                p.last_reviewed_at.map(|t| t.timestamp()),
                p.next_review_at.map(|t| t.timestamp()),
                p.created_at.timestamp(),
                p.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_policy(&p.id)?
            .ok_or(StorageError::InsertReadback { entity: "policy" })
    }

    pub fn get_policy(&self, id: &str) -> Result<Option<InternalPolicy>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM policies WHERE id = ?1",
            Self::POLICY_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_policy(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_policies(&self, limit: usize, offset: usize) -> Result<Vec<InternalPolicy>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM policies ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::POLICY_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_policy(row)?);
        }
        Ok(out)
    }

    pub fn count_policies(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM policies")
    }

    // ---- control tests ----

    fn row_to_control_test(row: &rusqlite::Row<'_>) -> Result<ControlTest> {
        Ok(ControlTest {
            id: row.get(0)?,
            unified_control_id: row.get(1)?,
            tester: row.get(2)?,
            tested_at: ts(row.get(3)?),
            result: parse_enum(&row.get::<_, String>(4)?)?,
            notes: row.get(5)?,
            evidence_ids: ids_from_json(&row.get::<_, String>(6)?),
            automated: row.get::<_, i64>(7)? != 0,
            connector_id: row.get(8)?,
            created_at: ts(row.get(9)?),
            updated_at: ts(row.get(10)?),
        })
    }

    const CONTROL_TEST_COLS: &'static str =
        "id, unified_control_id, tester, tested_at, result, notes, evidence_ids, automated, connector_id, created_at, updated_at";

    pub fn insert_control_test(&self, t: &ControlTest) -> Result<ControlTest> {
        require_field(&t.tester, "tester")?;
        let evidence_ids = ids_to_json(&t.evidence_ids)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO control_tests (id, unified_control_id, tester, tested_at, result, notes, evidence_ids, automated, connector_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                t.id,
                t.unified_control_id,
                t.tester,
                t.tested_at.timestamp(),
                t.result.as_str(),
                t.notes,
                evidence_ids,
                t.automated as i64,
                t.connector_id,
                t.created_at.timestamp(),
                t.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_control_test(&t.id)?
            .ok_or(StorageError::InsertReadback {
                entity: "control_test",
            })
    }

    pub fn get_control_test(&self, id: &str) -> Result<Option<ControlTest>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM control_tests WHERE id = ?1",
            Self::CONTROL_TEST_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_control_test(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_control_tests(
        &self,
        unified_control_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ControlTest>> {
        let conn = self.conn();
        let mut out = Vec::new();
        match unified_control_id {
            Some(cid) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM control_tests WHERE unified_control_id = ?1 ORDER BY tested_at DESC, id ASC LIMIT ?2 OFFSET ?3",
                    Self::CONTROL_TEST_COLS
                ))?;
                let mut rows = stmt.query(rusqlite::params![cid, limit as i64, offset as i64])?;
                while let Some(row) = rows.next()? {
                    out.push(Self::row_to_control_test(row)?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM control_tests ORDER BY tested_at DESC, id ASC LIMIT ?1 OFFSET ?2",
                    Self::CONTROL_TEST_COLS
                ))?;
                let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
                while let Some(row) = rows.next()? {
                    out.push(Self::row_to_control_test(row)?);
                }
            }
        }
        Ok(out)
    }

    pub fn list_control_tests_all(&self) -> Result<Vec<ControlTest>> {
        self.list_control_tests(None, usize::MAX >> 1, 0)
    }

    pub fn count_control_tests(&self, unified_control_id: Option<&str>) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = match unified_control_id {
            Some(cid) => conn.query_row(
                "SELECT COUNT(*) FROM control_tests WHERE unified_control_id = ?1",
                rusqlite::params![cid],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM control_tests", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    // ---- evidence ----

    fn row_to_evidence(row: &rusqlite::Row<'_>) -> Result<Evidence> {
        Ok(Evidence {
            id: row.get(0)?,
            unified_control_id: row.get(1)?,
            control_test_id: row.get(2)?,
            evidence_type: row.get(3)?,
            description: row.get(4)?,
            automated: row.get::<_, i64>(5)? != 0,
            file_path: row.get(6)?,
            file_name: row.get(7)?,
            created_at: ts(row.get(8)?),
            updated_at: ts(row.get(9)?),
        })
    }

    const EVIDENCE_COLS: &'static str =
        "id, unified_control_id, control_test_id, evidence_type, description, automated, file_path, file_name, created_at, updated_at";

    pub fn insert_evidence(&self, ev: &Evidence) -> Result<Evidence> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO evidence (id, unified_control_id, control_test_id, evidence_type, description, automated, file_path, file_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                ev.id,
                ev.unified_control_id,
                ev.control_test_id,
                ev.evidence_type,
                ev.description,
                ev.automated as i64,
                ev.file_path,
                ev.file_name,
                ev.created_at.timestamp(),
                ev.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_evidence(&ev.id)?
            .ok_or(StorageError::InsertReadback { entity: "evidence" })
    }

    pub fn get_evidence(&self, id: &str) -> Result<Option<Evidence>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM evidence WHERE id = ?1",
            Self::EVIDENCE_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_evidence(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_evidence(&self, limit: usize, offset: usize) -> Result<Vec<Evidence>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM evidence ORDER BY created_at DESC, id ASC LIMIT ?1 OFFSET ?2",
            Self::EVIDENCE_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_evidence(row)?);
        }
        Ok(out)
    }

    pub fn count_evidence(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM evidence")
    }

    // ---- issues ----

    fn row_to_issue(row: &rusqlite::Row<'_>) -> Result<Issue> {
        Ok(Issue {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            severity: parse_enum(&row.get::<_, String>(3)?)?,
            status: parse_enum(&row.get::<_, String>(4)?)?,
            assigned_to: row.get(5)?,
            due_date: opt_ts(row.get(6)?),
            unified_control_id: row.get(7)?,
            control_test_id: row.get(8)?,
            has_exception: row.get::<_, i64>(9)? != 0,
            exception_details: opt_json_value(row.get(10)?),
            created_at: ts(row.get(11)?),
            updated_at: ts(row.get(12)?),
        })
    }

    const ISSUE_COLS: &'static str =
        "id, title, description, severity, status, assigned_to, due_date, unified_control_id, control_test_id, has_exception, exception_details, created_at, updated_at";

    pub fn insert_issue(&self, issue: &Issue) -> Result<Issue> {
        require_field(&issue.title, "title")?;
        let exception_details = issue.exception_details.as_ref().map(|v| v.to_string());
        let conn = self.conn();
        conn.execute(
            "INSERT INTO issues (id, title, description, severity, status, assigned_to, due_date, unified_control_id, control_test_id, has_exception, exception_details, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                issue.id,
                issue.title,
                issue.description,
                issue.severity.as_str(),
                issue.status.as_str(),
                issue.assigned_to,
                issue.due_date.map(|t| t.timestamp()),
                issue.unified_control_id,
                issue.control_test_id,
                issue.has_exception as i64,
                exception_details,
                issue.created_at.timestamp(),
                issue.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_issue(&issue.id)?
            .ok_or(StorageError::InsertReadback { entity: "issue" })
    }

    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM issues WHERE id = ?1",
            Self::ISSUE_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_issue(row)?)),
            None => Ok(None),
        }
    }

    /// Lookup by the spawning control test, used to keep auto-issue creation
    /// idempotent.
    pub fn get_issue_by_control_test(&self, control_test_id: &str) -> Result<Option<Issue>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM issues WHERE control_test_id = ?1 ORDER BY created_at ASC LIMIT 1",
            Self::ISSUE_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![control_test_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_issue(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_issues(&self, limit: usize, offset: usize) -> Result<Vec<Issue>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM issues ORDER BY created_at DESC, id ASC LIMIT ?1 OFFSET ?2",
            Self::ISSUE_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_issue(row)?);
        }
        Ok(out)
    }

    pub fn list_issues_all(&self) -> Result<Vec<Issue>> {
        self.list_issues(usize::MAX >> 1, 0)
    }

    pub fn count_issues(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM issues")
    }

    pub fn update_issue_status(&self, id: &str, status: IssueStatus) -> Result<Option<Issue>> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE issues SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), Utc::now().timestamp(), id],
        )?;
        drop(conn);
        if changed == 0 {
            return Ok(None);
        }
        self.get_issue(id)
    }

    pub fn set_issue_exception(
        &self,
        id: &str,
        details: &serde_json::Value,
    ) -> Result<Option<Issue>> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE issues SET has_exception = 1, exception_details = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![details.to_string(), Utc::now().timestamp(), id],
        )?;
        drop(conn);
        if changed == 0 {
            return Ok(None);
        }
        self.get_issue(id)
    }

    // ---- risks ----

    fn row_to_risk(row: &rusqlite::Row<'_>) -> Result<Risk> {
        Ok(Risk {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            inherent_risk_score: row.get(4)?,
            residual_risk_score: row.get(5)?,
            status: row.get(6)?,
            owner: row.get(7)?,
            kri_ids: ids_from_json(&row.get::<_, String>(8)?),
            linked_control_ids: ids_from_json(&row.get::<_, String>(9)?),
            created_at: ts(row.get(10)?),
            updated_at: ts(row.get(11)?),
        })
    }

    const RISK_COLS: &'static str =
        "id, name, description, category, inherent_risk_score, residual_risk_score, status, owner, kri_ids, linked_control_ids, created_at, updated_at";

    pub fn insert_risk(&self, r: &Risk) -> Result<Risk> {
        require_field(&r.name, "name")?;
        let kri_ids = ids_to_json(&r.kri_ids)?;
        let linked = ids_to_json(&r.linked_control_ids)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO risks (id, name, description, category, inherent_risk_score, residual_risk_score, status, owner, kri_ids, linked_control_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                r.id,
                r.name,
                r.description,
                r.category,
                r.inherent_risk_score,
                r.residual_risk_score,
                r.status,
                r.owner,
                kri_ids,
                linked,
                r.created_at.timestamp(),
                r.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_risk(&r.id)?
            .ok_or(StorageError::InsertReadback { entity: "risk" })
    }

    pub fn get_risk(&self, id: &str) -> Result<Option<Risk>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM risks WHERE id = ?1",
            Self::RISK_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_risk(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_risks(&self, limit: usize, offset: usize) -> Result<Vec<Risk>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM risks ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::RISK_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_risk(row)?);
        }
        Ok(out)
    }

    pub fn list_risks_all(&self) -> Result<Vec<Risk>> {
        self.list_risks(usize::MAX >> 1, 0)
    }

    pub fn count_risks(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM risks")
    }

    /// 把 KRI 追加进所属风险的 kri_ids 反向列表。已存在时不重复写入。
    pub fn append_risk_kri(&self, risk_id: &str, kri_id: &str) -> Result<Option<Risk>> {
        let Some(risk) = self.get_risk(risk_id)? else {
            return Ok(None);
        };
        if risk.kri_ids.iter().any(|id| id == kri_id) {
            return Ok(Some(risk));
        }
        let mut ids = risk.kri_ids;
        ids.push(kri_id.to_string());
        let json = ids_to_json(&ids)?;
        let conn = self.conn();
        conn.execute(
            "UPDATE risks SET kri_ids = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![json, Utc::now().timestamp(), risk_id],
        )?;
        drop(conn);
        self.get_risk(risk_id)
    }

    // ---- kris ----

    fn row_to_kri(row: &rusqlite::Row<'_>) -> Result<Kri> {
        Ok(Kri {
            id: row.get(0)?,
            risk_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            current_value: row.get(4)?,
            threshold: row.get(5)?,
            green_max: row.get(6)?,
            yellow_max: row.get(7)?,
            higher_is_worse: row.get::<_, i64>(8)? != 0,
            unit: row.get(9)?,
            trend: row.get(10)?,
            kci_ids: ids_from_json(&row.get::<_, String>(11)?),
            created_at: ts(row.get(12)?),
            updated_at: ts(row.get(13)?),
        })
    }

    const KRI_COLS: &'static str =
        "id, risk_id, name, description, current_value, threshold, green_max, yellow_max, higher_is_worse, unit, trend, kci_ids, created_at, updated_at";

    pub fn insert_kri(&self, k: &Kri) -> Result<Kri> {
        require_field(&k.name, "name")?;
        let kci_ids = ids_to_json(&k.kci_ids)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kris (id, risk_id, name, description, current_value, threshold, green_max, yellow_max, higher_is_worse, unit, trend, kci_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            rusqlite::params![
                k.id,
                k.risk_id,
                k.name,
                k.description,
                k.current_value,
                k.threshold,
                k.green_max,
                k.yellow_max,
                k.higher_is_worse as i64,
                k.unit,
                k.trend,
                kci_ids,
                k.created_at.timestamp(),
                k.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_kri(&k.id)?
            .ok_or(StorageError::InsertReadback { entity: "kri" })
    }

    pub fn get_kri(&self, id: &str) -> Result<Option<Kri>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM kris WHERE id = ?1", Self::KRI_COLS))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_kri(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_kris(&self, limit: usize, offset: usize) -> Result<Vec<Kri>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM kris ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::KRI_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_kri(row)?);
        }
        Ok(out)
    }

    /// KRIs for a risk in stable creation order (chain resolution contract).
    pub fn list_kris_by_risk(&self, risk_id: &str) -> Result<Vec<Kri>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM kris WHERE risk_id = ?1 ORDER BY created_at ASC, id ASC",
            Self::KRI_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![risk_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_kri(row)?);
        }
        Ok(out)
    }

    pub fn count_kris(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM kris")
    }

    /// 把 KCI 追加进所属 KRI 的 kci_ids 反向列表。已存在时不重复写入。
    pub fn append_kri_kci(&self, kri_id: &str, kci_id: &str) -> Result<Option<Kri>> {
        let Some(kri) = self.get_kri(kri_id)? else {
            return Ok(None);
        };
        if kri.kci_ids.iter().any(|id| id == kci_id) {
            return Ok(Some(kri));
        }
        let mut ids = kri.kci_ids;
        ids.push(kci_id.to_string());
        let json = ids_to_json(&ids)?;
        let conn = self.conn();
        conn.execute(
            "UPDATE kris SET kci_ids = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![json, Utc::now().timestamp(), kri_id],
        )?;
        drop(conn);
        self.get_kri(kri_id)
    }

    // ---- kcis ----

    fn row_to_kci(row: &rusqlite::Row<'_>) -> Result<Kci> {
        Ok(Kci {
            id: row.get(0)?,
            kri_id: row.get(1)?,
            unified_control_id: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            current_value: row.get(5)?,
            target: row.get(6)?,
            threshold: row.get(7)?,
            unit: row.get(8)?,
            status: row.get(9)?,
            created_at: ts(row.get(10)?),
            updated_at: ts(row.get(11)?),
        })
    }

    const KCI_COLS: &'static str =
        "id, kri_id, unified_control_id, name, description, current_value, target, threshold, unit, status, created_at, updated_at";

    pub fn insert_kci(&self, k: &Kci) -> Result<Kci> {
        require_field(&k.name, "name")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kcis (id, kri_id, unified_control_id, name, description, current_value, target, threshold, unit, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                k.id,
                k.kri_id,
                k.unified_control_id,
                k.name,
                k.description,
                k.current_value,
                k.target,
                k.threshold,
                k.unit,
                k.status,
                k.created_at.timestamp(),
                k.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_kci(&k.id)?
            .ok_or(StorageError::InsertReadback { entity: "kci" })
    }

    pub fn get_kci(&self, id: &str) -> Result<Option<Kci>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM kcis WHERE id = ?1", Self::KCI_COLS))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_kci(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_kcis(&self, limit: usize, offset: usize) -> Result<Vec<Kci>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM kcis ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::KCI_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_kci(row)?);
        }
        Ok(out)
    }

    /// KCIs for a KRI in stable creation order.
    pub fn list_kcis_by_kri(&self, kri_id: &str) -> Result<Vec<Kci>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM kcis WHERE kri_id = ?1 ORDER BY created_at ASC, id ASC",
            Self::KCI_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![kri_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_kci(row)?);
        }
        Ok(out)
    }

    pub fn count_kcis(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM kcis")
    }

    // ---- ai models ----

    fn row_to_ai_model(row: &rusqlite::Row<'_>) -> Result<AiModel> {
        Ok(AiModel {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            owner: row.get(3)?,
            status: parse_enum(&row.get::<_, String>(4)?)?,
            risk_level: parse_enum(&row.get::<_, String>(5)?)?,
            version: row.get(6)?,
            created_at: ts(row.get(7)?),
            updated_at: ts(row.get(8)?),
        })
    }

    const AI_MODEL_COLS: &'static str =
        "id, name, description, owner, status, risk_level, version, created_at, updated_at";

    pub fn insert_ai_model(&self, m: &AiModel) -> Result<AiModel> {
        require_field(&m.name, "name")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO ai_models (id, name, description, owner, status, risk_level, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                m.id,
                m.name,
                m.description,
                m.owner,
                m.status.as_str(),
                m.risk_level.as_str(),
                m.version,
                m.created_at.timestamp(),
                m.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_ai_model(&m.id)?
            .ok_or(StorageError::InsertReadback { entity: "ai_model" })
    }

    pub fn get_ai_model(&self, id: &str) -> Result<Option<AiModel>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_models WHERE id = ?1",
            Self::AI_MODEL_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_ai_model(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_ai_models(&self, limit: usize, offset: usize) -> Result<Vec<AiModel>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_models ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::AI_MODEL_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_ai_model(row)?);
        }
        Ok(out)
    }

    pub fn list_ai_models_all(&self) -> Result<Vec<AiModel>> {
        self.list_ai_models(usize::MAX >> 1, 0)
    }

    pub fn count_ai_models(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM ai_models")
    }

    // ---- ai assessments ----

    fn row_to_ai_assessment(row: &rusqlite::Row<'_>) -> Result<AiAssessment> {
        Ok(AiAssessment {
            id: row.get(0)?,
            ai_model_id: row.get(1)?,
            assessor: row.get(2)?,
            assessed_at: ts(row.get(3)?),
            result: row.get(4)?,
            notes: row.get(5)?,
            created_at: ts(row.get(6)?),
            updated_at: ts(row.get(7)?),
        })
    }

    const AI_ASSESSMENT_COLS: &'static str =
        "id, ai_model_id, assessor, assessed_at, result, notes, created_at, updated_at";

    pub fn insert_ai_assessment(&self, a: &AiAssessment) -> Result<AiAssessment> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO ai_assessments (id, ai_model_id, assessor, assessed_at, result, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                a.id,
                a.ai_model_id,
                a.assessor,
                a.assessed_at.timestamp(),
                a.result,
                a.notes,
                a.created_at.timestamp(),
                a.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_ai_assessment(&a.id)?
            .ok_or(StorageError::InsertReadback {
                entity: "ai_assessment",
            })
    }

    pub fn get_ai_assessment(&self, id: &str) -> Result<Option<AiAssessment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ai_assessments WHERE id = ?1",
            Self::AI_ASSESSMENT_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_ai_assessment(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_ai_assessments(
        &self,
        ai_model_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AiAssessment>> {
        let conn = self.conn();
        let mut out = Vec::new();
        match ai_model_id {
            Some(mid) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM ai_assessments WHERE ai_model_id = ?1 ORDER BY assessed_at DESC, id ASC LIMIT ?2 OFFSET ?3",
                    Self::AI_ASSESSMENT_COLS
                ))?;
                let mut rows = stmt.query(rusqlite::params![mid, limit as i64, offset as i64])?;
                while let Some(row) = rows.next()? {
                    out.push(Self::row_to_ai_assessment(row)?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM ai_assessments ORDER BY assessed_at DESC, id ASC LIMIT ?1 OFFSET ?2",
                    Self::AI_ASSESSMENT_COLS
                ))?;
                let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
                while let Some(row) = rows.next()? {
                    out.push(Self::row_to_ai_assessment(row)?);
                }
            }
        }
        Ok(out)
    }

    pub fn count_ai_assessments(&self, ai_model_id: Option<&str>) -> Result<u64> {
        let conn = self.conn();
        let count: i64 = match ai_model_id {
            Some(mid) => conn.query_row(
                "SELECT COUNT(*) FROM ai_assessments WHERE ai_model_id = ?1",
                rusqlite::params![mid],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM ai_assessments", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    // ---- connectors ----

    fn row_to_connector(row: &rusqlite::Row<'_>) -> Result<Connector> {
        let config_raw: String = row.get(3)?;
        Ok(Connector {
            id: row.get(0)?,
            name: row.get(1)?,
            connector_type: row.get(2)?,
            config: serde_json::from_str(&config_raw).unwrap_or_else(|_| serde_json::json!({})),
            enabled: row.get::<_, i64>(4)? != 0,
            created_at: ts(row.get(5)?),
            updated_at: ts(row.get(6)?),
        })
    }

    const CONNECTOR_COLS: &'static str =
        "id, name, connector_type, config, enabled, created_at, updated_at";

    pub fn insert_connector(&self, c: &Connector) -> Result<Connector> {
        require_field(&c.name, "name")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO connectors (id, name, connector_type, config, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                c.id,
                c.name,
                c.connector_type,
                c.config.to_string(),
                c.enabled as i64,
                c.created_at.timestamp(),
                c.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_connector(&c.id)?
            .ok_or(StorageError::InsertReadback { entity: "connector" })
    }

    pub fn get_connector(&self, id: &str) -> Result<Option<Connector>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connectors WHERE id = ?1",
            Self::CONNECTOR_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_connector(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_connectors(&self, limit: usize, offset: usize) -> Result<Vec<Connector>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connectors ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
            Self::CONNECTOR_COLS
        ))?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_connector(row)?);
        }
        Ok(out)
    }

    pub fn count_connectors(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM connectors")
    }

    // ---- audit logs ----

    pub fn insert_audit_log(&self, log: &AuditLog) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO audit_logs (id, actor, action, resource_type, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                log.id,
                log.actor,
                log.action,
                log.resource_type,
                log.detail,
                log.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn list_audit_logs(&self, limit: usize, offset: usize) -> Result<Vec<AuditLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, actor, action, resource_type, detail, created_at FROM audit_logs
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let mut rows = stmt.query(rusqlite::params![limit as i64, offset as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(AuditLog {
                id: row.get(0)?,
                actor: row.get(1)?,
                action: row.get(2)?,
                resource_type: row.get(3)?,
                detail: row.get(4)?,
                created_at: ts(row.get(5)?),
            });
        }
        Ok(out)
    }

    pub fn count_audit_logs(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM audit_logs")
    }

    // ---- users ----

    fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: ts(row.get(3)?),
            updated_at: ts(row.get(4)?),
        })
    }

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        require_field(username, "username")?;
        let id = oxgrc_common::id::next_id();
        let now = Utc::now().timestamp();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, username, password_hash, now, now],
        )?;
        drop(conn);
        self.get_user_by_username(username)?
            .ok_or(StorageError::InsertReadback { entity: "user" })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, username, password_hash, created_at, updated_at FROM users WHERE username = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![username])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, username, password_hash, created_at, updated_at FROM users WHERE id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    pub fn count_users(&self) -> Result<u64> {
        self.count_table("SELECT COUNT(*) FROM users")
    }

    pub fn update_user_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![password_hash, Utc::now().timestamp(), id],
        )?;
        Ok(changed > 0)
    }

    // ---- administrative reseed ----

    /// Deletes every entity collection in one transaction. Users and audit
    /// logs are kept.
    pub fn clear_entity_collections(&self) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        for table in RESEED_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.commit()?;
        tracing::info!("Cleared all entity collections for reseed");
        Ok(())
    }
}
