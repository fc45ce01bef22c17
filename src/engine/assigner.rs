// ==========================================
// 矿山生产排程系统 - 资源分配引擎
// ==========================================
// 职责: 周期内候选到资源的首次适应装箱
// 红线: 单周期内一个候选不得拆分到两个资源
// 状态: 周期用量 PeriodUsage 显式传递, 不得跨周期存活
// ==========================================

use crate::domain::material::{Assignment, Candidate};
use crate::domain::site::{Period, Resource};
use std::collections::HashMap;
use tracing::instrument;

// ==========================================
// PeriodUsage - 周期资源用量
// ==========================================
// 每周期新建一个实例; 引擎不持有跨周期状态
#[derive(Debug, Default)]
pub struct PeriodUsage {
    used_t: HashMap<String, f64>,
}

impl PeriodUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 资源本周期已用产能 (吨)
    pub fn used(&self, resource_id: &str) -> f64 {
        self.used_t.get(resource_id).copied().unwrap_or(0.0)
    }

    fn add(&mut self, resource_id: &str, tonnes: f64) {
        *self.used_t.entry(resource_id.to_string()).or_insert(0.0) += tonnes;
    }
}

// ==========================================
// AssignmentOutcome - 分配结果
// ==========================================
#[derive(Debug)]
pub struct AssignmentOutcome {
    pub assignments: Vec<Assignment>,
    /// 未分配或部分分配后的余量候选 (保持优先级顺序)
    pub leftovers: Vec<Candidate>,
}

// ==========================================
// ResourceAssigner - 资源分配引擎
// ==========================================
pub struct ResourceAssigner {
    // 无状态引擎
}

impl ResourceAssigner {
    pub fn new() -> Self {
        Self {}
    }

    /// 单周期资源分配
    ///
    /// 规则:
    /// 1) 按候选给定顺序 (优先级降序) 处理
    /// 2) 按资源固定输入顺序扫描, 跳过不支持该活动的资源
    /// 3) remaining >= quantity -> 全量分配, 停止扫描
    /// 4) 0 < remaining < quantity -> 部分分配 remaining, 余量回到候选, 停止扫描
    ///
    /// # 参数
    /// - `candidates`: 候选列表 (已按优先级排序)
    /// - `resources`: 资源列表 (固定扫描顺序)
    /// - `period`: 当前周期
    /// - `usage`: 本周期用量累计 (显式传入)
    #[instrument(skip_all, fields(
        period_id = %period.period_id,
        candidates_count = candidates.len(),
        resources_count = resources.len()
    ))]
    pub fn assign_period(
        &self,
        candidates: &[Candidate],
        resources: &[Resource],
        period: &Period,
        usage: &mut PeriodUsage,
    ) -> AssignmentOutcome {
        let mut assignments = Vec::new();
        let mut leftovers = Vec::new();

        for candidate in candidates {
            let mut assigned = false;

            for resource in resources {
                if !resource.supports_activity(&candidate.activity_id) {
                    continue;
                }

                let remaining =
                    resource.period_capacity_t(period) - usage.used(&resource.resource_id);
                if remaining <= 0.0 {
                    continue;
                }

                if remaining >= candidate.quantity_t {
                    // 全量分配
                    usage.add(&resource.resource_id, candidate.quantity_t);
                    assignments.push(Assignment {
                        candidate: candidate.clone(),
                        resource_id: resource.resource_id.clone(),
                        assigned_quantity_t: candidate.quantity_t,
                    });
                } else {
                    // 部分分配, 余量仍为候选
                    usage.add(&resource.resource_id, remaining);
                    assignments.push(Assignment {
                        candidate: candidate.clone(),
                        resource_id: resource.resource_id.clone(),
                        assigned_quantity_t: remaining,
                    });
                    let mut rest = candidate.clone();
                    rest.quantity_t = candidate.quantity_t - remaining;
                    leftovers.push(rest);
                }
                // 首次适应: 无论全量还是部分, 都停止扫描
                assigned = true;
                break;
            }

            if !assigned {
                leftovers.push(candidate.clone());
            }
        }

        AssignmentOutcome {
            assignments,
            leftovers,
        }
    }
}

impl Default for ResourceAssigner {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quality::QualityVector;
    use chrono::NaiveDate;

    fn period_7d() -> Period {
        Period {
            period_id: "P1".to_string(),
            index: 1,
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
        }
    }

    fn resource(resource_id: &str, base_rate_tpd: f64, activities: &[&str]) -> Resource {
        Resource {
            resource_id: resource_id.to_string(),
            name: resource_id.to_string(),
            base_rate_tpd,
            supported_activities: activities.iter().map(|a| a.to_string()).collect(),
            min_rate_factor: 0.3,
        }
    }

    fn candidate(area_id: &str, activity_id: &str, quantity_t: f64, priority: i32) -> Candidate {
        Candidate {
            area_id: area_id.to_string(),
            activity_id: activity_id.to_string(),
            slice_index: 1,
            quantity_t,
            material_type_id: "ORE".to_string(),
            quality: QualityVector::from([("Ash", 10.0)]),
            priority,
            source_node_id: "PIT1".to_string(),
        }
    }

    #[test]
    fn test_full_assignment_stops_scan() {
        let assigner = ResourceAssigner::new();
        let resources = vec![
            resource("EX01", 100.0, &["MINE_ORE"]), // 700 t 产能
            resource("EX02", 100.0, &["MINE_ORE"]),
        ];
        let candidates = vec![candidate("A1", "MINE_ORE", 500.0, 10)];
        let mut usage = PeriodUsage::new();

        let outcome = assigner.assign_period(&candidates, &resources, &period_7d(), &mut usage);
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].resource_id, "EX01");
        assert_eq!(outcome.assignments[0].assigned_quantity_t, 500.0);
        assert!(outcome.leftovers.is_empty());
        assert_eq!(usage.used("EX02"), 0.0);
    }

    #[test]
    fn test_partial_assignment_keeps_remainder() {
        let assigner = ResourceAssigner::new();
        // 产能 700 t, 候选 1000 t -> 部分分配 700, 余量 300
        let resources = vec![
            resource("EX01", 100.0, &["MINE_ORE"]),
            resource("EX02", 100.0, &["MINE_ORE"]),
        ];
        let candidates = vec![candidate("A1", "MINE_ORE", 1000.0, 10)];
        let mut usage = PeriodUsage::new();

        let outcome = assigner.assign_period(&candidates, &resources, &period_7d(), &mut usage);
        // 部分分配后停止扫描: 不拆分到 EX02
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].assigned_quantity_t, 700.0);
        assert_eq!(outcome.leftovers.len(), 1);
        assert_eq!(outcome.leftovers[0].quantity_t, 300.0);
        assert_eq!(usage.used("EX02"), 0.0);
    }

    #[test]
    fn test_activity_eligibility() {
        let assigner = ResourceAssigner::new();
        let resources = vec![
            resource("EX01", 100.0, &["MINE_WASTE"]),
            resource("EX02", 100.0, &["MINE_ORE"]),
        ];
        let candidates = vec![candidate("A1", "MINE_ORE", 200.0, 10)];
        let mut usage = PeriodUsage::new();

        let outcome = assigner.assign_period(&candidates, &resources, &period_7d(), &mut usage);
        assert_eq!(outcome.assignments[0].resource_id, "EX02");
    }

    #[test]
    fn test_no_eligible_resource_keeps_candidate() {
        let assigner = ResourceAssigner::new();
        let resources = vec![resource("EX01", 100.0, &["MINE_WASTE"])];
        let candidates = vec![candidate("A1", "MINE_ORE", 200.0, 10)];
        let mut usage = PeriodUsage::new();

        let outcome = assigner.assign_period(&candidates, &resources, &period_7d(), &mut usage);
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.leftovers.len(), 1);
        assert_eq!(outcome.leftovers[0].quantity_t, 200.0);
    }

    #[test]
    fn test_priority_order_governs_scarcity() {
        let assigner = ResourceAssigner::new();
        // 单资源 700 t: 先到先得
        let resources = vec![resource("EX01", 100.0, &["MINE_ORE"])];
        let candidates = vec![
            candidate("HIGH", "MINE_ORE", 600.0, 9),
            candidate("LOW", "MINE_ORE", 600.0, 1),
        ];
        let mut usage = PeriodUsage::new();

        let outcome = assigner.assign_period(&candidates, &resources, &period_7d(), &mut usage);
        assert_eq!(outcome.assignments.len(), 2);
        assert_eq!(outcome.assignments[0].candidate.area_id, "HIGH");
        assert_eq!(outcome.assignments[0].assigned_quantity_t, 600.0);
        // LOW 只拿到剩余 100 t
        assert_eq!(outcome.assignments[1].candidate.area_id, "LOW");
        assert_eq!(outcome.assignments[1].assigned_quantity_t, 100.0);
        assert_eq!(outcome.leftovers[0].quantity_t, 500.0);
    }

    #[test]
    fn test_conservation_invariant() {
        let assigner = ResourceAssigner::new();
        let resources = vec![resource("EX01", 50.0, &["MINE_ORE"])];
        let candidates = vec![
            candidate("A1", "MINE_ORE", 300.0, 5),
            candidate("A2", "MINE_ORE", 300.0, 4),
        ];
        let mut usage = PeriodUsage::new();

        let outcome = assigner.assign_period(&candidates, &resources, &period_7d(), &mut usage);
        for assignment in &outcome.assignments {
            assert!(assignment.assigned_quantity_t <= assignment.candidate.quantity_t + 1e-9);
        }
        let total_assigned: f64 = outcome
            .assignments
            .iter()
            .map(|a| a.assigned_quantity_t)
            .sum();
        assert!(total_assigned <= 350.0 + 1e-9); // 不超过周期产能
    }
}
