// ==========================================
// 矿山生产排程系统 - 料包生成引擎
// ==========================================
// 职责: 把已提交的资源分配转化为不可变料包
// ==========================================

use crate::domain::material::{Assignment, Parcel};
use crate::domain::site::Period;
use crate::domain::types::ParcelStatus;
use uuid::Uuid;

// ==========================================
// MaterialGenerator - 料包生成引擎
// ==========================================
pub struct MaterialGenerator {
    // 无状态引擎
}

impl MaterialGenerator {
    pub fn new() -> Self {
        Self {}
    }

    /// 生成料包
    ///
    /// 每条分配产出一个料包; 零吨位分配不产包。
    /// 料包一经创建不可变 (质量节流时按比例重建, 见 ScheduleEngine)
    pub fn generate(&self, assignments: &[Assignment], period: &Period) -> Vec<Parcel> {
        assignments
            .iter()
            .filter(|a| a.assigned_quantity_t > 0.0)
            .map(|a| Parcel {
                parcel_id: Uuid::new_v4().to_string(),
                source_reference: format!("{}/{}", a.candidate.area_id, a.candidate.slice_index),
                source_node_id: a.candidate.source_node_id.clone(),
                quantity_t: a.assigned_quantity_t,
                material_type_id: a.candidate.material_type_id.clone(),
                quality: a.candidate.quality.clone(),
                period_available_from: period.period_id.clone(),
                status: ParcelStatus::Available,
            })
            .collect()
    }
}

impl Default for MaterialGenerator {
    fn default() -> Self {
        Self::new()
    }
}
