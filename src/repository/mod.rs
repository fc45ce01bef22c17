// ==========================================
// 矿山生产排程系统 - 仓储层
// ==========================================
// 职责: 排程产出的持久化 (SQLite) 与内存实现
// 红线: 仓储不做业务计算, 只负责原子落库与查询
// ==========================================

pub mod error;
pub mod schedule_store;

pub use error::{RepositoryError, RepositoryResult};
pub use schedule_store::{
    MemoryScheduleStore, ScheduleRunRecord, ScheduleStore, SqliteScheduleStore,
};
