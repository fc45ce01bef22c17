// ==========================================
// 矿山生产排程系统 - 核心库
// ==========================================
// 系统定位: 决策支持系统 (按周期决定资源-矿块分配与物料流向)
// 核心能力: 多阶段排程引擎 + 贪心/LP 双路由器 + 配矿质量评估
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 排程运行配置
pub mod config;

// 引擎层 - 业务规则
pub mod engine;

// 数据仓储层 - 排程结果落库
pub mod repository;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BlendMethod, NodeKind, ObjectiveType, ParcelStatus, PenaltyForm, SliceStatus, TaskType,
};

// 领域实体
pub use domain::{
    ActivityArea, Allocation, ArcQualityObjective, Assignment, Calendar, Candidate,
    DecisionExplanation, FlowArc, FlowNetwork, FlowNode, FlowResult, MiningSlice, Parcel, Period,
    QualityFieldRegistry, QualityVector, Resource, ScheduleOutcome, Task,
};

// 配置
pub use config::ScheduleRunConfig;

// 引擎
pub use engine::{
    AllocationError, BlendingService, CancelToken, CandidateBuilder, EngineError, FlowOptimizer,
    LpMaterialAllocator, MaterialGenerator, ResourceAssigner, ScheduleEngine, ScheduleInputs,
};

// 仓储
pub use repository::{
    MemoryScheduleStore, RepositoryError, ScheduleRunRecord, ScheduleStore, SqliteScheduleStore,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "矿山生产排程系统";

// 吨位噪声阈值: 小于该值的流量视为数值噪声, 不落库
pub const FLOW_TONNES_TOLERANCE: f64 = 0.01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
