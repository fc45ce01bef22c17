// ==========================================
// 矿山生产排程系统 - 领域类型定义
// ==========================================
// 红线: 枚举制, 不使用裸字符串状态
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 切片状态 (Slice Status)
// ==========================================
// 只有 AVAILABLE / RELEASED 状态的切片可进入候选集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SliceStatus {
    Available, // 可采
    Released,  // 已释放(上覆切片完成)
    Mined,     // 已采完
    Blocked,   // 阻断(数据质量或工程原因)
}

impl fmt::Display for SliceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceStatus::Available => write!(f, "AVAILABLE"),
            SliceStatus::Released => write!(f, "RELEASED"),
            SliceStatus::Mined => write!(f, "MINED"),
            SliceStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

// ==========================================
// 料包状态 (Parcel Status)
// ==========================================
// 料包创建后不可变, 状态仅用于生命周期追踪
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatus {
    Available, // 待路由
    Committed, // 已提交路由
    Processed, // 已处理
    Depleted,  // 已耗尽
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParcelStatus::Available => write!(f, "AVAILABLE"),
            ParcelStatus::Committed => write!(f, "COMMITTED"),
            ParcelStatus::Processed => write!(f, "PROCESSED"),
            ParcelStatus::Depleted => write!(f, "DEPLETED"),
        }
    }
}

// ==========================================
// 任务类型 (Task Type)
// ==========================================
// OptimiserDelay: 质量节流产生的延迟任务, 必须携带 reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Mining,         // 采矿任务
    OptimiserDelay, // 优化器延迟任务
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Mining => write!(f, "MINING"),
            TaskType::OptimiserDelay => write!(f, "OPTIMISER_DELAY"),
        }
    }
}

// ==========================================
// 流向节点类型 (Node Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Mine,      // 采场
    Stockpile, // 堆场
    Plant,     // 选厂
    Dump,      // 排土场
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Mine => write!(f, "MINE"),
            NodeKind::Stockpile => write!(f, "STOCKPILE"),
            NodeKind::Plant => write!(f, "PLANT"),
            NodeKind::Dump => write!(f, "DUMP"),
        }
    }
}

// ==========================================
// 质量目标类型 (Objective Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveType {
    Min,    // 下限
    Max,    // 上限
    Target, // 目标值
    Range,  // 区间
}

impl fmt::Display for ObjectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveType::Min => write!(f, "MIN"),
            ObjectiveType::Max => write!(f, "MAX"),
            ObjectiveType::Target => write!(f, "TARGET"),
            ObjectiveType::Range => write!(f, "RANGE"),
        }
    }
}

// ==========================================
// 罚分形式 (Penalty Form)
// ==========================================
// penalty = f(deviation, weight)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyForm {
    Linear,    // deviation * weight
    Quadratic, // deviation^2 * weight
    Step,      // weight (deviation > 0 时)
}

impl fmt::Display for PenaltyForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PenaltyForm::Linear => write!(f, "LINEAR"),
            PenaltyForm::Quadratic => write!(f, "QUADRATIC"),
            PenaltyForm::Step => write!(f, "STEP"),
        }
    }
}

// ==========================================
// 配矿方法 (Blend Method)
// ==========================================
// 默认 WeightedAverage (质量加权平均)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendMethod {
    WeightedAverage, // 吨位加权平均
    Sum,             // 求和
    Min,             // 取最小
    Max,             // 取最大
}

impl fmt::Display for BlendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendMethod::WeightedAverage => write!(f, "WEIGHTED_AVERAGE"),
            BlendMethod::Sum => write!(f, "SUM"),
            BlendMethod::Min => write!(f, "MIN"),
            BlendMethod::Max => write!(f, "MAX"),
        }
    }
}
