// ==========================================
// 矿山生产排程系统 - 配置层
// ==========================================
// 内容: 排程运行配置
// 约定: 数值参数提供 serde 默认值, 便于从 JSON 局部覆盖
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// ScheduleRunConfig - 排程运行配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRunConfig {
    pub site_id: String,
    pub schedule_version_id: String,

    // 排程窗口 (None = 全日历)
    #[serde(default)]
    pub horizon_start_period_id: Option<String>,
    #[serde(default)]
    pub horizon_end_period_id: Option<String>,

    // 目标配置档 (预留, 由上层解释)
    #[serde(default)]
    pub objective_profile_id: Option<String>,

    /// FullPass 最大迭代次数
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// 相对改进阈值: 迭代间罚分改进低于该比例即提前收敛
    #[serde(default = "default_target_gap_percent")]
    pub target_gap_percent: f64,

    /// 优先使用 LP 路由器 (失败时回退贪心)
    #[serde(default = "default_use_lp_solver")]
    pub use_lp_solver: bool,
}

fn default_max_iterations() -> usize {
    5
}

fn default_target_gap_percent() -> f64 {
    0.01
}

fn default_use_lp_solver() -> bool {
    true
}

impl ScheduleRunConfig {
    /// 创建带默认参数的配置
    pub fn new(site_id: impl Into<String>, schedule_version_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            schedule_version_id: schedule_version_id.into(),
            horizon_start_period_id: None,
            horizon_end_period_id: None,
            objective_profile_id: None,
            max_iterations: default_max_iterations(),
            target_gap_percent: default_target_gap_percent(),
            use_lp_solver: default_use_lp_solver(),
        }
    }
}
