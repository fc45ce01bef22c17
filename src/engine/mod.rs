// ==========================================
// 矿山生产排程系统 - 引擎层
// ==========================================
// 职责: 排程计算的全部业务逻辑
// 红线: 引擎无状态; 周期状态由编排器显式传递;
//       引擎不直接访问存储, 落库由编排器统一提交
// ==========================================

pub mod assigner;
pub mod blending;
pub mod cancel;
pub mod candidates;
pub mod flow_greedy;
pub mod flow_lp;
pub mod materials;
pub mod schedule;
pub mod validation;

pub use assigner::{AssignmentOutcome, PeriodUsage, ResourceAssigner};
pub use blending::{BlendingService, ComplianceResult, ObjectiveViolation};
pub use cancel::CancelToken;
pub use candidates::CandidateBuilder;
pub use flow_greedy::{FlowOptimizer, PeriodThroughput, RoutingOutcome, UnroutedParcel};
pub use flow_lp::{AllocationError, LpMaterialAllocator};
pub use materials::MaterialGenerator;
pub use schedule::{EngineError, ScheduleEngine, ScheduleInputs};
pub use validation::validate_inputs;
