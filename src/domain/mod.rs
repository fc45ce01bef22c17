// ==========================================
// 矿山生产排程系统 - 领域层
// ==========================================
// 职责: 实体与值类型定义, 不含业务规则
// ==========================================

pub mod material;
pub mod network;
pub mod plan;
pub mod quality;
pub mod site;
pub mod types;

// 重导出核心实体
pub use material::{Assignment, Candidate, Parcel};
pub use network::{
    Allocation, ArcQualityObjective, FlowArc, FlowNetwork, FlowNode, ObjectiveIndex,
};
pub use plan::{DecisionExplanation, FlowResult, RunTotals, ScheduleOutcome, Task};
pub use quality::{QualityFieldRegistry, QualityVector};
pub use site::{ActivityArea, Calendar, MiningSlice, Period, Resource};
