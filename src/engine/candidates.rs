// ==========================================
// 矿山生产排程系统 - 候选构建引擎
// ==========================================
// 职责: 从未锁定采区构建可采候选列表
// 红线: 优先级降序 + 同分稳定, 该次序决定稀缺产能的分配
// ==========================================

use crate::domain::material::Candidate;
use crate::domain::site::ActivityArea;
use crate::domain::types::SliceStatus;
use crate::domain::Task;
use tracing::{debug, instrument};

// ==========================================
// CandidateBuilder - 候选构建引擎
// ==========================================
pub struct CandidateBuilder {
    // 无状态引擎
}

impl CandidateBuilder {
    pub fn new() -> Self {
        Self {}
    }

    /// 构建候选列表
    ///
    /// 规则:
    /// 1) 锁定采区不参与
    /// 2) 目标版本中已有任务覆盖的采区不重复排程
    /// 3) 切片状态 AVAILABLE/RELEASED 且吨位 > 0 才成为候选
    /// 4) 输出按优先级降序, 同分保持输入顺序 (稳定排序)
    ///
    /// # 参数
    /// - `areas`: 采区列表
    /// - `existing_tasks`: 目标版本已存在的任务
    #[instrument(skip(self, areas, existing_tasks), fields(areas_count = areas.len()))]
    pub fn build(&self, areas: &[ActivityArea], existing_tasks: &[Task]) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for area in areas {
            if area.is_locked {
                debug!(area_id = %area.area_id, "采区已锁定, 跳过");
                continue;
            }
            if existing_tasks.iter().any(|t| t.area_id == area.area_id) {
                debug!(area_id = %area.area_id, "采区已有任务覆盖, 跳过");
                continue;
            }

            for slice in &area.slices {
                let mineable = matches!(
                    slice.status,
                    SliceStatus::Available | SliceStatus::Released
                );
                if !mineable || slice.quantity_t <= 0.0 {
                    continue;
                }

                candidates.push(Candidate {
                    area_id: area.area_id.clone(),
                    activity_id: area.activity_id.clone(),
                    slice_index: slice.slice_index,
                    quantity_t: slice.quantity_t,
                    material_type_id: slice.material_type_id.clone(),
                    quality: slice.quality.clone(),
                    priority: area.priority,
                    source_node_id: area.source_node_id.clone(),
                });
            }
        }

        // Vec::sort_by 为稳定排序, 同优先级保持输入顺序
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(candidates_count = candidates.len(), "候选构建完成");
        candidates
    }
}

impl Default for CandidateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
