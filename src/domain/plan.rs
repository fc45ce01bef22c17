// ==========================================
// 矿山生产排程系统 - 排程结果领域模型
// ==========================================
// 内容: 任务、流向结果、决策解释、运行汇总
// 红线: 所有规则必须输出 reason, 决策可追溯
// ==========================================

use crate::domain::types::TaskType;
use serde::{Deserialize, Serialize};

// ==========================================
// Task - 排程任务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub schedule_version_id: String,
    pub resource_id: String,
    pub activity_id: String,
    pub period_id: String,
    pub area_id: String,
    pub planned_quantity_t: f64,
    pub task_type: TaskType,
    pub reason: Option<String>, // OptimiserDelay 必填: 节流的约束说明
}

// ==========================================
// FlowResult - 流向结果
// ==========================================
// 仅落库 tonnes > FLOW_TONNES_TOLERANCE 的记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResult {
    pub flow_id: String,
    pub schedule_version_id: String,
    pub period_id: String,
    pub parcel_id: String,
    pub arc_id: String,
    pub from_node: String,
    pub to_node: String,
    pub tonnes: f64,
    pub cost: f64,
    pub benefit: f64,
    pub penalty_cost: f64,
}

// ==========================================
// DecisionExplanation - 决策解释
// ==========================================
// 按 周期 x 目的节点 产出 (罚分非零或存在紧约束时)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionExplanation {
    pub explanation_id: String,
    pub schedule_version_id: String,
    pub period_id: String,
    pub destination_node: String,
    pub summary: String,
    pub binding_constraints: Vec<String>, // LP 近零松弛约束, 格式 "arc:<id>" / "node:<id>"
    pub penalty_breakdown: String,        // JSON: 各分配的罚分明细
}

// ==========================================
// RunTotals - 运行累计量
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub tonnes: f64,
    pub cost: f64,
    pub benefit: f64,
    pub penalty: f64,
}

impl RunTotals {
    pub fn add_allocation(&mut self, tonnes: f64, cost: f64, benefit: f64, penalty: f64) {
        self.tonnes += tonnes;
        self.cost += cost;
        self.benefit += benefit;
        self.penalty += penalty;
    }
}

// ==========================================
// ScheduleOutcome - 排程运行结果
// ==========================================
// success=false 仅用于运行前校验失败; 运行一旦开始即尽力而为,
// 中途的短缺以 diagnostics 报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    pub run_id: String,
    pub success: bool,
    pub tasks_created: usize,
    pub flows_created: usize,
    pub explanation_count: usize,
    pub totals: RunTotals,
    pub diagnostics: Vec<String>,
    pub iterations_executed: usize,
}

impl ScheduleOutcome {
    /// 运行前校验失败的结果 (唯一的 success=false 形态)
    pub fn validation_failed(run_id: String, messages: Vec<String>) -> Self {
        Self {
            run_id,
            success: false,
            tasks_created: 0,
            flows_created: 0,
            explanation_count: 0,
            totals: RunTotals::default(),
            diagnostics: messages,
            iterations_executed: 0,
        }
    }
}
