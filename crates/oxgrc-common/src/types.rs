use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// 控制类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ControlType {
    Preventive,
    Detective,
    Corrective,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preventive => "Preventive",
            Self::Detective => "Detective",
            Self::Corrective => "Corrective",
        }
    }
}

impl FromStr for ControlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Preventive" => Ok(Self::Preventive),
            "Detective" => Ok(Self::Detective),
            "Corrective" => Ok(Self::Corrective),
            other => Err(format!("unknown control type '{other}'")),
        }
    }
}

/// 控制测试结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TestResult {
    Pass,
    Fail,
    Partial,
}

impl TestResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::Partial => "Partial",
        }
    }
}

impl FromStr for TestResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pass" => Ok(Self::Pass),
            "Fail" => Ok(Self::Fail),
            "Partial" => Ok(Self::Partial),
            other => Err(format!("unknown test result '{other}'")),
        }
    }
}

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// 问题状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum IssueStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    /// Resolved / Closed 为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "In Progress" => Ok(Self::InProgress),
            "Resolved" => Ok(Self::Resolved),
            "Closed" => Ok(Self::Closed),
            other => Err(format!("unknown issue status '{other}'")),
        }
    }
}

/// 内部制度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PolicyStatus {
    Active,
    Retired,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Retired => "Retired",
        }
    }
}

impl FromStr for PolicyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Retired" => Ok(Self::Retired),
            other => Err(format!("unknown policy status '{other}'")),
        }
    }
}

/// AI 模型生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ModelStatus {
    Development,
    Production,
    Retired,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "Development",
            Self::Production => "Production",
            Self::Retired => "Retired",
        }
    }
}

impl FromStr for ModelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Development" => Ok(Self::Development),
            "Production" => Ok(Self::Production),
            "Retired" => Ok(Self::Retired),
            other => Err(format!("unknown model status '{other}'")),
        }
    }
}

/// AI 模型风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ModelRiskLevel {
    Low,
    Medium,
    High,
}

impl ModelRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl FromStr for ModelRiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(format!("unknown model risk level '{other}'")),
        }
    }
}

/// 合规框架（如 ISO 27001、SOC 2）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Framework {
    pub id: String,
    /// 框架名称
    pub name: String,
    /// 框架描述
    pub description: String,
    /// 版本标签（如 2022、v4.0）
    pub version: String,
    /// 分类（信息安全 / 隐私 / AI 治理等）
    pub category: String,
    /// 是否纳入合规范围
    pub enabled: bool,
    /// 声明的控制项总数（仅供展示，不做校验）
    pub total_controls: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 框架控制项（框架自带的要求条目，如 A.8.2）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FrameworkControl {
    pub id: String,
    /// 所属框架 ID
    pub framework_id: String,
    /// 框架定义的控制编号（如 A.8.2、CC6.1）
    pub control_id: String,
    /// 控制标题
    pub title: String,
    /// 控制描述
    pub description: String,
    /// 控制分类
    pub category: String,
    /// 测试程序说明
    pub testing_procedure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 统一控制（CCF 条目，组织内部的单一控制分类）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnifiedControl {
    pub id: String,
    /// CCF 编号（约定唯一，存储层不强制）
    pub ccf_id: String,
    pub name: String,
    pub description: String,
    /// 控制类型
    pub control_type: ControlType,
    /// 测试频率（自由文本，如 Quarterly）
    pub frequency: String,
    /// 控制负责人
    pub owner: String,
    /// 映射的框架控制项 ID 列表（仅存 ID，展示信息读取时解析）
    pub mapped_framework_controls: Vec<String>,
    /// 映射的内部制度 ID 列表
    pub mapped_policies: Vec<String>,
    /// 是否可自动化测试
    pub automation_possible: bool,
    /// 自动化配置（透传给连接器，本服务不解释）
    pub automation_config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 内部制度
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InternalPolicy {
    pub id: String,
    /// 制度编号（如 POL-001）
    pub policy_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub owner: String,
    pub status: PolicyStatus,
    /// 上次评审时间
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// 下次评审时间
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 控制测试记录（创建后不可变）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ControlTest {
    pub id: String,
    /// 被测统一控制 ID
    pub unified_control_id: String,
    /// 测试人
    pub tester: String,
    /// 测试时间
    pub tested_at: DateTime<Utc>,
    pub result: TestResult,
    /// 测试说明
    pub notes: String,
    /// 证据 ID 列表
    pub evidence_ids: Vec<String>,
    /// 是否自动化测试
    pub automated: bool,
    /// 自动化测试来源连接器 ID
    pub connector_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 证据
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Evidence {
    pub id: String,
    /// 关联统一控制 ID
    pub unified_control_id: String,
    /// 关联控制测试 ID（可选）
    pub control_test_id: Option<String>,
    /// 证据类型标签（截图 / 导出 / 配置快照等）
    pub evidence_type: String,
    pub description: String,
    /// 是否自动采集
    pub automated: bool,
    /// 上传文件存储路径（手工证据）
    pub file_path: Option<String>,
    /// 原始文件名
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 整改问题
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: IssueSeverity,
    pub status: IssueStatus,
    /// 指派处理人
    pub assigned_to: String,
    /// 整改截止时间
    pub due_date: Option<DateTime<Utc>>,
    /// 关联统一控制 ID
    pub unified_control_id: Option<String>,
    /// 触发该问题的控制测试 ID（自动创建时填写）
    pub control_test_id: Option<String>,
    /// 是否已批准例外（风险接受）
    pub has_exception: bool,
    /// 例外详情（原因、批准人、到期时间等）
    pub exception_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 风险
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Risk {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// 固有风险评分（约定 0-10）
    pub inherent_risk_score: f64,
    /// 剩余风险评分（约定 residual <= inherent，不强制）
    pub residual_risk_score: f64,
    pub status: String,
    pub owner: String,
    /// 关联 KRI ID 列表
    pub kri_ids: Vec<String>,
    /// 关联统一控制 ID 列表
    pub linked_control_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 关键风险指标（KRI）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Kri {
    pub id: String,
    /// 所属风险 ID
    pub risk_id: String,
    pub name: String,
    pub description: String,
    /// 当前值
    pub current_value: f64,
    /// 告警阈值
    pub threshold: f64,
    /// 绿灯上界（三色阈值，可选）
    pub green_max: Option<f64>,
    /// 黄灯上界（三色阈值，可选）
    pub yellow_max: Option<f64>,
    /// 指标方向：true 表示值越高越差（如失败登录数）
    pub higher_is_worse: bool,
    /// 单位标签
    pub unit: String,
    /// 趋势标签（improving / stable / worsening）
    pub trend: String,
    /// 关联 KCI ID 列表
    pub kci_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 关键控制指标（KCI）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Kci {
    pub id: String,
    /// 所属 KRI ID
    pub kri_id: String,
    /// 关联统一控制 ID
    pub unified_control_id: String,
    pub name: String,
    pub description: String,
    pub current_value: f64,
    /// 目标值
    pub target: f64,
    pub threshold: f64,
    pub unit: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// AI 模型（AI 治理扩展）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiModel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub status: ModelStatus,
    pub risk_level: ModelRiskLevel,
    /// 模型版本标签
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// AI 模型评估记录
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiAssessment {
    pub id: String,
    /// 被评估模型 ID
    pub ai_model_id: String,
    /// 评估人
    pub assessor: String,
    pub assessed_at: DateTime<Utc>,
    /// 评估结论
    pub result: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 自动化测试连接器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Connector {
    pub id: String,
    pub name: String,
    /// 连接器类型（aws / github / jira 等）
    pub connector_type: String,
    /// 连接器配置（透传，不解释）
    pub config: serde_json::Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 审计日志（仅追加）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLog {
    pub id: String,
    /// 操作人
    pub actor: String,
    /// 动作（create / update / reseed 等）
    pub action: String,
    /// 资源类型
    pub resource_type: String,
    /// 详情
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

/// 用户账号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// JWT Token
    pub token: String,
    /// 过期时间（秒）
    pub expires_in: u64,
}

/// 修改密码请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}
