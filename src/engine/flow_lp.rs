// ==========================================
// 矿山生产排程系统 - LP 流向分配器
// ==========================================
// 职责: 单周期全料包联合线性规划路由
// 模型: x[i,j] = 料包 i 经弧 j 的吨位
//   min Σ x[i,j] * (cost_j + unit_penalty(i,j) - benefit_j)
//   s.t. Σ_j x[i,j] = quantity_i          (入模料包守恒, 等式)
//        Σ x 入弧/入节点 <= capacity       (受限容量)
//        0 <= x[i,j] <= quantity_i
// 简化: 罚分按 (料包,弧) 预计算并对吨位线性化 —— 共享目的地的
//       多料包混合质量本质非线性, 此处为有意的文档化近似
// 语义: 硬质量约束违反的 (料包,弧) 对直接从变量集排除;
//       无可行弧的料包不入模 (不设零成本汇), 落空上报
// ==========================================

use crate::domain::network::{FlowArc, FlowNetwork, ObjectiveIndex};
use crate::domain::{Allocation, Parcel};
use crate::engine::blending::BlendingService;
use crate::engine::flow_greedy::{RoutingOutcome, UnroutedParcel};
use good_lp::{
    constraint, default_solver, variable, variables, Expression, ResolutionError, Solution,
    SolverModel, Variable,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

// 低于该吨位的解视为数值噪声, 丢弃
const NOISE_TONNES: f64 = 0.01;

// 松弛低于该值的容量约束视为紧约束
const BINDING_SLACK: f64 = 0.01;

// ==========================================
// AllocationError - 分配错误
// ==========================================
// 显式 Result, 不以异常驱动; 调用方决定回退或中止
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("LP 不可行: {0}")]
    Infeasible(String),

    #[error("求解器失败: {0}")]
    SolverError(String),
}

// ==========================================
// LpMaterialAllocator - LP 流向分配器
// ==========================================
pub struct LpMaterialAllocator {
    blending: BlendingService,
}

// (料包, 弧) 变量及其单位系数
struct PairVar<'a> {
    parcel: &'a Parcel,
    arc: &'a FlowArc,
    var: Variable,
    unit_penalty: f64,
}

impl LpMaterialAllocator {
    pub fn new() -> Self {
        Self {
            blending: BlendingService::new(),
        }
    }

    /// 单周期 LP 联合路由
    ///
    /// 全部料包同解, 料包顺序不影响最优值。
    /// 成功时入模料包满足 Σ 分配吨位 == quantity (±0.01t);
    /// 失败返回 AllocationError, 由 ScheduleEngine 决定回退贪心
    ///
    /// # 参数
    /// - `parcels`: 本周期待路由料包
    /// - `network`: 流向网络 (只读)
    /// - `index`: 请求级目标索引 (不跨调用缓存)
    #[instrument(skip_all, fields(parcels_count = parcels.len()))]
    pub fn allocate_period(
        &self,
        parcels: &[Parcel],
        network: &FlowNetwork,
        index: &ObjectiveIndex<'_>,
    ) -> Result<RoutingOutcome, AllocationError> {
        let mut outcome = RoutingOutcome::default();
        let mut vars = variables!();
        let mut pairs: Vec<PairVar<'_>> = Vec::new();

        // ==========================================
        // 步骤1: 变量集构建 (硬约束排除在建模时完成)
        // ==========================================
        for parcel in parcels {
            if parcel.quantity_t <= 0.0 {
                continue;
            }

            let mut feasible = 0usize;
            let mut hard_excluded = 0usize;
            for arc in network.arcs_from(&parcel.source_node_id) {
                if !arc.accepts_material(&parcel.material_type_id) {
                    continue;
                }
                let compliance = self
                    .blending
                    .check_compliance(&parcel.quality, index.for_arc(&arc.arc_id));
                if !compliance.is_compliant {
                    // 硬违规: 该 (料包,弧) 对不进入模型
                    hard_excluded += 1;
                    continue;
                }

                // 罚分对吨位线性化: 整包路由恰好等于合规检查罚分
                let unit_penalty = compliance.total_penalty / parcel.quantity_t;
                let var = vars.add(variable().min(0.0).max(parcel.quantity_t));
                pairs.push(PairVar {
                    parcel,
                    arc,
                    var,
                    unit_penalty,
                });
                feasible += 1;
            }

            if feasible == 0 {
                // 不入模 (不设零成本汇), 等式行保持可行
                let reason = if hard_excluded > 0 {
                    format!(
                        "HARD_CONSTRAINT_EXCLUDED: node={}, excluded_arcs={}",
                        parcel.source_node_id, hard_excluded
                    )
                } else {
                    format!("NO_FEASIBLE_ARC: node={}", parcel.source_node_id)
                };
                warn!(parcel_id = %parcel.parcel_id, %reason, "料包不入模");
                outcome.unrouted.push(UnroutedParcel {
                    parcel_id: parcel.parcel_id.clone(),
                    reason,
                });
            }
        }

        if pairs.is_empty() {
            return Ok(outcome); // 无可建模料包
        }

        // ==========================================
        // 步骤2: 目标函数与约束
        // ==========================================
        let mut objective = Expression::from(0.0);
        for pair in &pairs {
            let unit_cost =
                pair.arc.cost_per_tonne + pair.unit_penalty - pair.arc.benefit_per_tonne;
            objective += unit_cost * pair.var;
        }

        let mut problem = vars.minimise(objective).using(default_solver);

        // 料包守恒 (等式)
        let mut parcel_sums: HashMap<&str, (Expression, f64)> = HashMap::new();
        // 受限弧/节点容量 (不等式)
        let mut arc_sums: HashMap<&str, (Expression, f64)> = HashMap::new();
        let mut node_sums: HashMap<&str, (Expression, f64)> = HashMap::new();

        for pair in &pairs {
            parcel_sums
                .entry(pair.parcel.parcel_id.as_str())
                .and_modify(|(e, _)| *e += pair.var)
                .or_insert_with(|| (Expression::from(pair.var), pair.parcel.quantity_t));

            if let Some(cap) = pair.arc.capacity_t_per_period {
                arc_sums
                    .entry(pair.arc.arc_id.as_str())
                    .and_modify(|(e, _)| *e += pair.var)
                    .or_insert_with(|| (Expression::from(pair.var), cap));
            }
            if let Some(cap) = network
                .node(&pair.arc.to_node)
                .and_then(|n| n.capacity_t_per_period)
            {
                node_sums
                    .entry(pair.arc.to_node.as_str())
                    .and_modify(|(e, _)| *e += pair.var)
                    .or_insert_with(|| (Expression::from(pair.var), cap));
            }
        }

        for (_, (expr, quantity)) in parcel_sums {
            problem = problem.with(constraint!(expr == quantity));
        }
        for (_, (expr, cap)) in arc_sums {
            problem = problem.with(constraint!(expr <= cap));
        }
        for (_, (expr, cap)) in node_sums {
            problem = problem.with(constraint!(expr <= cap));
        }

        // ==========================================
        // 步骤3: 求解
        // ==========================================
        let solution = problem.solve().map_err(|err| match err {
            ResolutionError::Infeasible => {
                AllocationError::Infeasible("周期容量/守恒约束联合不可行".to_string())
            }
            other => AllocationError::SolverError(other.to_string()),
        })?;

        // ==========================================
        // 步骤4: 解提取 (噪声过滤 + 紧约束识别)
        // ==========================================
        let mut arc_used: HashMap<String, f64> = HashMap::new();
        let mut node_used: HashMap<String, f64> = HashMap::new();

        for pair in &pairs {
            let tonnes = solution.value(pair.var);
            if tonnes < NOISE_TONNES {
                continue;
            }
            *arc_used.entry(pair.arc.arc_id.clone()).or_insert(0.0) += tonnes;
            *node_used.entry(pair.arc.to_node.clone()).or_insert(0.0) += tonnes;

            outcome.allocations.push(Allocation {
                parcel_id: pair.parcel.parcel_id.clone(),
                from_node: pair.arc.from_node.clone(),
                to_node: pair.arc.to_node.clone(),
                arc_id: pair.arc.arc_id.clone(),
                tonnes,
                quality: pair.parcel.quality.clone(),
                cost: tonnes * pair.arc.cost_per_tonne,
                benefit: tonnes * pair.arc.benefit_per_tonne,
                penalty_cost: tonnes * pair.unit_penalty,
            });
        }

        // 紧约束 = 近零松弛的容量行
        for arc in &network.arcs {
            if let Some(cap) = arc.capacity_t_per_period {
                let used = arc_used.get(&arc.arc_id).copied().unwrap_or(0.0);
                if used > 0.0 && cap - used <= BINDING_SLACK {
                    outcome.binding_constraints.push(format!("arc:{}", arc.arc_id));
                }
            }
        }
        for node in &network.nodes {
            if let Some(cap) = node.capacity_t_per_period {
                let used = node_used.get(&node.node_id).copied().unwrap_or(0.0);
                if used > 0.0 && cap - used <= BINDING_SLACK {
                    outcome
                        .binding_constraints
                        .push(format!("node:{}", node.node_id));
                }
            }
        }

        debug!(
            allocations = outcome.allocations.len(),
            unrouted = outcome.unrouted.len(),
            binding = outcome.binding_constraints.len(),
            "LP 路由完成"
        );
        Ok(outcome)
    }
}

impl Default for LpMaterialAllocator {
    fn default() -> Self {
        Self::new()
    }
}
