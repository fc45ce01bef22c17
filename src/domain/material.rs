// ==========================================
// 矿山生产排程系统 - 物料领域模型
// ==========================================
// 内容: 候选矿块、资源分配、料包
// 红线: 料包创建后不可变
// ==========================================

use crate::domain::quality::QualityVector;
use crate::domain::types::ParcelStatus;
use serde::{Deserialize, Serialize};

// ==========================================
// Candidate - 可采候选
// ==========================================
// 由 CandidateBuilder 一次性产出, 排序决定稀缺产能的分配次序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub area_id: String,
    pub activity_id: String,
    pub slice_index: i32,
    pub quantity_t: f64,
    pub material_type_id: String,
    pub quality: QualityVector,
    pub priority: i32,          // 继承采区优先级
    pub source_node_id: String, // 继承采区入口节点
}

// ==========================================
// Assignment - 资源分配
// ==========================================
// 允许部分分配: assigned_quantity_t <= candidate.quantity_t, 余量仍为候选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub candidate: Candidate,
    pub resource_id: String,
    pub assigned_quantity_t: f64,
}

// ==========================================
// Parcel - 料包
// ==========================================
// 路由的原子单元; 创建后不可变 (节流时重建而非修改)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub parcel_id: String,
    pub source_reference: String, // "area_id/slice_index"
    pub source_node_id: String,   // 流向网络入口节点
    pub quantity_t: f64,
    pub material_type_id: String,
    pub quality: QualityVector,
    pub period_available_from: String, // 可路由起始周期ID
    pub status: ParcelStatus,
}
