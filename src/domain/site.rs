// ==========================================
// 矿山生产排程系统 - 矿场领域模型
// ==========================================
// 内容: 日历/周期、资源、采区与切片
// 约束: 本层为只读输入, 引擎不得修改
// ==========================================

use crate::domain::quality::QualityVector;
use crate::domain::types::SliceStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Period - 排程周期
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub period_id: String,     // 周期ID
    pub index: i32,            // 时序索引 (日历内严格递增)
    pub start_date: NaiveDate, // 起始日期 (含)
    pub end_date: NaiveDate,   // 结束日期 (含)
}

impl Period {
    /// 周期天数 (起止均含)
    pub fn duration_days(&self) -> f64 {
        ((self.end_date - self.start_date).num_days() + 1).max(0) as f64
    }
}

// ==========================================
// Calendar - 排程日历
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub calendar_id: String,
    pub periods: Vec<Period>, // 按 index 升序
}

impl Calendar {
    /// 按时序返回周期, 可选按周期ID裁剪排程窗口
    ///
    /// # 参数
    /// - `start_period_id`: 窗口起点 (None 表示从头)
    /// - `end_period_id`: 窗口终点 (None 表示到尾)
    pub fn horizon(
        &self,
        start_period_id: Option<&str>,
        end_period_id: Option<&str>,
    ) -> Vec<&Period> {
        let mut sorted: Vec<&Period> = self.periods.iter().collect();
        sorted.sort_by_key(|p| p.index);

        let start_idx = start_period_id
            .and_then(|id| sorted.iter().position(|p| p.period_id == id))
            .unwrap_or(0);
        let end_idx = end_period_id
            .and_then(|id| sorted.iter().position(|p| p.period_id == id))
            .unwrap_or(sorted.len().saturating_sub(1));

        if sorted.is_empty() || start_idx > end_idx {
            return Vec::new();
        }
        sorted[start_idx..=end_idx].to_vec()
    }
}

// ==========================================
// Resource - 采矿资源 (挖机/车队)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: String,
    pub name: String,
    pub base_rate_tpd: f64,                // 基准采掘速率 (吨/日)
    pub supported_activities: Vec<String>, // 可执行的活动ID
    pub min_rate_factor: f64,              // 速率因子下限 (质量节流不得低于此值)
}

impl Resource {
    /// 单周期产能 (吨)
    pub fn period_capacity_t(&self, period: &Period) -> f64 {
        self.base_rate_tpd * period.duration_days()
    }

    /// 是否支持该活动
    pub fn supports_activity(&self, activity_id: &str) -> bool {
        self.supported_activities.iter().any(|a| a == activity_id)
    }
}

// ==========================================
// MiningSlice - 采区切片
// ==========================================
// 采区内自上而下的开采单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningSlice {
    pub slice_index: i32,
    pub status: SliceStatus,
    pub quantity_t: f64,          // 切片物料量 (吨)
    pub material_type_id: String, // 物料类型
    pub quality: QualityVector,   // 切片质量向量
}

// ==========================================
// ActivityArea - 活动采区
// ==========================================
// source_node_id: 该采区产出物料进入流向网络的入口节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityArea {
    pub area_id: String,
    pub name: String,
    pub activity_id: String,
    pub priority: i32,          // 采区优先级 (越大越先采)
    pub is_locked: bool,        // 人工锁定的采区不参与排程
    pub source_node_id: String, // 流向网络入口节点
    pub slices: Vec<MiningSlice>,
}
