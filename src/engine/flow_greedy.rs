// ==========================================
// 矿山生产排程系统 - 贪心流向路由器
// ==========================================
// 职责: 逐料包独立选弧 (快速/交互场景)
// 语义: 容量不足的弧被排除 (不拆包); 硬质量约束只计分不排除
//       (与 LP 路由器的硬排除语义刻意不同, 属于规定行为)
// 局限: 目的地争用下短视, O(料包 x 弧) / 周期
// ==========================================

use crate::domain::network::{FlowArc, FlowNetwork, ObjectiveIndex};
use crate::domain::{Allocation, Parcel};
use crate::engine::blending::BlendingService;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

// 同分偏好系数: score = penalty - priority * PRIORITY_BONUS
const PRIORITY_BONUS: f64 = 0.01;

// ==========================================
// PeriodThroughput - 周期吞吐量累计
// ==========================================
// 每周期新建; 弧与目的节点的已用容量, 显式传递不跨周期存活
#[derive(Debug, Default)]
pub struct PeriodThroughput {
    arc_used_t: HashMap<String, f64>,
    node_used_t: HashMap<String, f64>,
}

impl PeriodThroughput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc_used(&self, arc_id: &str) -> f64 {
        self.arc_used_t.get(arc_id).copied().unwrap_or(0.0)
    }

    pub fn node_used(&self, node_id: &str) -> f64 {
        self.node_used_t.get(node_id).copied().unwrap_or(0.0)
    }

    /// 弧剩余容量 (无约束 = +inf)
    pub fn arc_remaining(&self, arc: &FlowArc) -> f64 {
        match arc.capacity_t_per_period {
            Some(cap) => cap - self.arc_used(&arc.arc_id),
            None => f64::INFINITY,
        }
    }

    /// 目的节点剩余容量 (无约束/未知节点 = +inf)
    pub fn node_remaining(&self, network: &FlowNetwork, node_id: &str) -> f64 {
        match network.node(node_id).and_then(|n| n.capacity_t_per_period) {
            Some(cap) => cap - self.node_used(node_id),
            None => f64::INFINITY,
        }
    }

    pub fn record(&mut self, arc: &FlowArc, tonnes: f64) {
        *self.arc_used_t.entry(arc.arc_id.clone()).or_insert(0.0) += tonnes;
        *self.node_used_t.entry(arc.to_node.clone()).or_insert(0.0) += tonnes;
    }
}

// ==========================================
// RoutingOutcome - 路由结果 (贪心与 LP 共用)
// ==========================================
#[derive(Debug, Default)]
pub struct RoutingOutcome {
    pub allocations: Vec<Allocation>,
    pub unrouted: Vec<UnroutedParcel>,
    /// 路由过程的可追溯说明 (如硬违规仍被路由)
    pub notes: Vec<String>,
    /// LP 近零松弛的容量约束; 贪心路径恒为空
    pub binding_constraints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UnroutedParcel {
    pub parcel_id: String,
    pub reason: String,
}

// ==========================================
// FlowOptimizer - 贪心流向路由器
// ==========================================
pub struct FlowOptimizer {
    blending: BlendingService,
}

impl FlowOptimizer {
    pub fn new() -> Self {
        Self {
            blending: BlendingService::new(),
        }
    }

    /// 单周期贪心路由
    ///
    /// 逐料包: 枚举源节点启用出弧, 排除物料不符或剩余容量不足的弧
    /// (整包路由, 不拆分), 对剩余弧打分取最小:
    /// `score = compliance_penalty - arc.priority * 0.01`
    /// 无可用弧的料包落空 (非致命, 带 reason 上报)
    ///
    /// # 参数
    /// - `parcels`: 本周期待路由料包
    /// - `network`: 流向网络 (只读)
    /// - `index`: 请求级目标索引
    /// - `throughput`: 本周期吞吐量累计 (显式传入)
    #[instrument(skip_all, fields(parcels_count = parcels.len()))]
    pub fn route_period(
        &self,
        parcels: &[Parcel],
        network: &FlowNetwork,
        index: &ObjectiveIndex<'_>,
        throughput: &mut PeriodThroughput,
    ) -> RoutingOutcome {
        let mut outcome = RoutingOutcome::default();

        for parcel in parcels {
            let arcs = network.arcs_from(&parcel.source_node_id);
            if arcs.is_empty() {
                outcome.unrouted.push(UnroutedParcel {
                    parcel_id: parcel.parcel_id.clone(),
                    reason: format!("NO_OUTGOING_ARC: node={}", parcel.source_node_id),
                });
                continue;
            }

            // 候选弧打分, 取最小; 同分取先枚举者
            let mut best: Option<(&FlowArc, f64, f64)> = None; // (弧, score, penalty)
            for arc in arcs {
                if !arc.accepts_material(&parcel.material_type_id) {
                    continue;
                }
                if throughput.arc_remaining(arc) < parcel.quantity_t
                    || throughput.node_remaining(network, &arc.to_node) < parcel.quantity_t
                {
                    continue; // 整包不拆, 容量不足即排除
                }

                let compliance = self
                    .blending
                    .check_compliance(&parcel.quality, index.for_arc(&arc.arc_id));
                // 硬违规只计分不排除 (贪心语义)
                if !compliance.is_compliant {
                    outcome.notes.push(format!(
                        "HARD_VIOLATION_SCORED: parcel={}, arc={}, penalty={:.4}",
                        parcel.parcel_id, arc.arc_id, compliance.total_penalty
                    ));
                }

                let score = compliance.total_penalty - arc.priority as f64 * PRIORITY_BONUS;
                if best.map(|(_, s, _)| score < s).unwrap_or(true) {
                    best = Some((arc, score, compliance.total_penalty));
                }
            }

            match best {
                Some((arc, _, penalty)) => {
                    throughput.record(arc, parcel.quantity_t);
                    debug!(
                        parcel_id = %parcel.parcel_id,
                        arc_id = %arc.arc_id,
                        tonnes = parcel.quantity_t,
                        penalty,
                        "贪心路由成功"
                    );
                    outcome.allocations.push(Allocation {
                        parcel_id: parcel.parcel_id.clone(),
                        from_node: arc.from_node.clone(),
                        to_node: arc.to_node.clone(),
                        arc_id: arc.arc_id.clone(),
                        tonnes: parcel.quantity_t,
                        quality: parcel.quality.clone(),
                        cost: parcel.quantity_t * arc.cost_per_tonne,
                        benefit: parcel.quantity_t * arc.benefit_per_tonne,
                        penalty_cost: penalty,
                    });
                }
                None => {
                    warn!(parcel_id = %parcel.parcel_id, "无可用弧, 料包落空");
                    outcome.unrouted.push(UnroutedParcel {
                        parcel_id: parcel.parcel_id.clone(),
                        reason: format!(
                            "NO_FEASIBLE_ARC: node={}, material={}, quantity_t={:.3}",
                            parcel.source_node_id, parcel.material_type_id, parcel.quantity_t
                        ),
                    });
                }
            }
        }

        outcome
    }
}

impl Default for FlowOptimizer {
    fn default() -> Self {
        Self::new()
    }
}
