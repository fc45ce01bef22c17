// ==========================================
// 矿山生产排程系统 - 排程引擎编排器
// ==========================================
// 用途: 协调候选构建/资源分配/料包生成/流向路由
// 模式: FastPass (单次贪心扫描, 无路由)
//       FullPass (迭代优化 + 收敛检查 + 事务提交)
// 约束: 同步单线程, 阶段有序; 周期状态显式传递不跨周期存活;
//       周期/迭代边界协作式检查取消
// ==========================================

use crate::config::ScheduleRunConfig;
use crate::domain::material::{Assignment, Candidate, Parcel};
use crate::domain::network::ObjectiveIndex;
use crate::domain::plan::{DecisionExplanation, FlowResult, RunTotals, ScheduleOutcome, Task};
use crate::domain::quality::QualityFieldRegistry;
use crate::domain::site::{ActivityArea, Calendar, Period, Resource};
use crate::domain::types::TaskType;
use crate::domain::FlowNetwork;
use crate::engine::assigner::{PeriodUsage, ResourceAssigner};
use crate::engine::blending::BlendingService;
use crate::engine::cancel::CancelToken;
use crate::engine::candidates::CandidateBuilder;
use crate::engine::flow_greedy::{FlowOptimizer, PeriodThroughput, RoutingOutcome};
use crate::engine::flow_lp::LpMaterialAllocator;
use crate::engine::materials::MaterialGenerator;
use crate::engine::validation::validate_inputs;
use crate::repository::{RepositoryError, ScheduleRunRecord, ScheduleStore};
use crate::FLOW_TONNES_TOLERANCE;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// EngineError - 引擎错误
// ==========================================
// 校验失败不是 Err: 以 success=false 的结果返回 (规定形态)
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("运行已取消")]
    Cancelled,

    #[error("结果落库失败, 已回滚: {0}")]
    Store(#[from] RepositoryError),
}

// ==========================================
// ScheduleInputs - 只读排程输入
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheduleInputs {
    pub calendar: Calendar,
    pub resources: Vec<Resource>,
    pub areas: Vec<ActivityArea>,
    pub network: FlowNetwork,
    /// 目标版本已存在的任务 (避免重复排程)
    pub existing_tasks: Vec<Task>,
    /// 质量字段注册表 (配置层提供, 可缺省)
    pub field_registry: Option<QualityFieldRegistry>,
    /// 目标版本是否已发布 (已发布版本拒绝运行)
    pub version_published: bool,
}

// ==========================================
// IterationResult - 单次迭代产出
// ==========================================
#[derive(Debug, Clone, Default)]
struct IterationResult {
    tasks: Vec<Task>,
    flows: Vec<FlowResult>,
    explanations: Vec<DecisionExplanation>,
    totals: RunTotals,
    diagnostics: Vec<String>,
}

// ==========================================
// ScheduleEngine - 排程引擎编排器
// ==========================================
pub struct ScheduleEngine {
    builder: CandidateBuilder,
    assigner: ResourceAssigner,
    generator: MaterialGenerator,
    greedy: FlowOptimizer,
    lp: LpMaterialAllocator,
    blending: BlendingService,
}

impl ScheduleEngine {
    pub fn new() -> Self {
        Self {
            builder: CandidateBuilder::new(),
            assigner: ResourceAssigner::new(),
            generator: MaterialGenerator::new(),
            greedy: FlowOptimizer::new(),
            lp: LpMaterialAllocator::new(),
            blending: BlendingService::new(),
        }
    }

    // ==========================================
    // FastPass - 快速单遍排程
    // ==========================================

    /// 快速排程: 校验 -> 候选 -> 逐周期分配 -> 提交任务
    ///
    /// 不生成料包, 不做流向路由; 用于交互式预览
    #[instrument(skip_all, fields(
        site_id = %config.site_id,
        version_id = %config.schedule_version_id
    ))]
    pub fn run_fast_pass(
        &self,
        inputs: &ScheduleInputs,
        config: &ScheduleRunConfig,
        store: &mut dyn ScheduleStore,
    ) -> Result<ScheduleOutcome, EngineError> {
        let run_id = Uuid::new_v4().to_string();

        let messages = validate_inputs(inputs, config);
        if !messages.is_empty() {
            warn!(problems = messages.len(), "运行前校验失败");
            return Ok(ScheduleOutcome::validation_failed(run_id, messages));
        }

        let periods = inputs.calendar.horizon(
            config.horizon_start_period_id.as_deref(),
            config.horizon_end_period_id.as_deref(),
        );
        let mut working = self.builder.build(&inputs.areas, &inputs.existing_tasks);

        let mut tasks = Vec::new();
        let mut totals = RunTotals::default();
        for period in &periods {
            let mut usage = PeriodUsage::new();
            let assigned =
                self.assigner
                    .assign_period(&working, &inputs.resources, period, &mut usage);
            for assignment in &assigned.assignments {
                totals.tonnes += assignment.assigned_quantity_t;
                tasks.push(Self::mining_task(
                    assignment,
                    period,
                    &config.schedule_version_id,
                ));
            }
            working = assigned.leftovers;
        }

        let mut diagnostics = Vec::new();
        if !working.is_empty() {
            diagnostics.push(format!("产能不足: {} 个候选未能在窗口内分配", working.len()));
        }

        let outcome = ScheduleOutcome {
            run_id: run_id.clone(),
            success: true,
            tasks_created: tasks.len(),
            flows_created: 0,
            explanation_count: 0,
            totals,
            diagnostics,
            iterations_executed: 1,
        };
        store.commit_run(&ScheduleRunRecord {
            run_id,
            site_id: config.site_id.clone(),
            schedule_version_id: config.schedule_version_id.clone(),
            tasks,
            flows: Vec::new(),
            explanations: Vec::new(),
            outcome: outcome.clone(),
        })?;

        info!(
            tasks_created = outcome.tasks_created,
            tonnes = outcome.totals.tonnes,
            "FastPass 完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // FullPass - 迭代优化排程
    // ==========================================

    /// 完整优化排程
    ///
    /// 每次迭代对相同输入施加确定性的同优先级组内轮转扰动,
    /// 逐周期 分配 -> 料包 -> 质量节流 -> 路由 (LP 优先, 失败回退贪心),
    /// 保留总罚分更低的迭代; 零罚分或相对改进低于
    /// target_gap_percent 时提前收敛; 胜出迭代整体事务提交
    #[instrument(skip_all, fields(
        site_id = %config.site_id,
        version_id = %config.schedule_version_id,
        max_iterations = config.max_iterations
    ))]
    pub fn run_full_pass(
        &self,
        inputs: &ScheduleInputs,
        config: &ScheduleRunConfig,
        store: &mut dyn ScheduleStore,
        cancel: &CancelToken,
    ) -> Result<ScheduleOutcome, EngineError> {
        let run_id = Uuid::new_v4().to_string();

        let messages = validate_inputs(inputs, config);
        if !messages.is_empty() {
            warn!(problems = messages.len(), "运行前校验失败");
            return Ok(ScheduleOutcome::validation_failed(run_id, messages));
        }

        let periods = inputs.calendar.horizon(
            config.horizon_start_period_id.as_deref(),
            config.horizon_end_period_id.as_deref(),
        );
        let candidates = self.builder.build(&inputs.areas, &inputs.existing_tasks);

        let mut best: Option<IterationResult> = None;
        let mut iterations_executed = 0usize;

        for iteration in 0..config.max_iterations.max(1) {
            // 迭代边界取消检查 (提交前中止, 不留部分状态)
            if cancel.is_cancelled() {
                info!(iteration, "迭代边界检测到取消请求");
                return Err(EngineError::Cancelled);
            }

            let working = Self::perturb_within_priority(&candidates, iteration);
            let result = self.run_iteration(inputs, config, &periods, working, cancel)?;
            iterations_executed += 1;

            let prev_best_penalty = best.as_ref().map(|b| b.totals.penalty);
            debug!(
                iteration,
                penalty = result.totals.penalty,
                prev_best = ?prev_best_penalty,
                "迭代完成"
            );

            // 严格更优才替换 (同分保留先到者, 结果确定)
            if prev_best_penalty
                .map(|p| result.totals.penalty < p)
                .unwrap_or(true)
            {
                best = Some(result);
            }
            let best_penalty = best.as_ref().map(|b| b.totals.penalty).unwrap_or(0.0);

            if best_penalty <= 0.0 {
                debug!(iteration, "零罚分, 提前收敛");
                break;
            }
            if let Some(prev) = prev_best_penalty {
                let gap = (prev - best_penalty).max(0.0) / prev.max(f64::EPSILON);
                if gap < config.target_gap_percent {
                    debug!(iteration, gap, "相对改进低于阈值, 提前收敛");
                    break;
                }
            }
        }

        let best = best.unwrap_or_default();
        let outcome = ScheduleOutcome {
            run_id: run_id.clone(),
            success: true,
            tasks_created: best.tasks.len(),
            flows_created: best.flows.len(),
            explanation_count: best.explanations.len(),
            totals: best.totals,
            diagnostics: best.diagnostics.clone(),
            iterations_executed,
        };
        store.commit_run(&ScheduleRunRecord {
            run_id,
            site_id: config.site_id.clone(),
            schedule_version_id: config.schedule_version_id.clone(),
            tasks: best.tasks,
            flows: best.flows,
            explanations: best.explanations,
            outcome: outcome.clone(),
        })?;

        info!(
            tasks_created = outcome.tasks_created,
            flows_created = outcome.flows_created,
            penalty = outcome.totals.penalty,
            iterations = iterations_executed,
            "FullPass 完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // 单次迭代
    // ==========================================

    fn run_iteration(
        &self,
        inputs: &ScheduleInputs,
        config: &ScheduleRunConfig,
        periods: &[&Period],
        mut working: Vec<Candidate>,
        cancel: &CancelToken,
    ) -> Result<IterationResult, EngineError> {
        let mut result = IterationResult::default();
        let index = inputs.network.objective_index();
        let resource_min: HashMap<&str, f64> = inputs
            .resources
            .iter()
            .map(|r| (r.resource_id.as_str(), r.min_rate_factor))
            .collect();

        for period in periods {
            // 周期边界取消检查
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            // 周期用量每周期新建, 不跨周期存活
            let mut usage = PeriodUsage::new();
            let assigned =
                self.assigner
                    .assign_period(&working, &inputs.resources, period, &mut usage);
            working = assigned.leftovers;
            let mut assignments = assigned.assignments;
            if assignments.is_empty() {
                continue;
            }

            // 质量节流: 可行出弧容量吸收不了的吨位延迟到位
            let parcels = self.generator.generate(&assignments, period);
            let (rate_factor, binding_reason) =
                self.compute_rate_factor(&parcels, &inputs.network, &index);
            if rate_factor < 1.0 {
                let reason = binding_reason.unwrap_or_else(|| "UNKNOWN".to_string());
                assignments = self.throttle_assignments(
                    assignments,
                    rate_factor,
                    &reason,
                    &resource_min,
                    period,
                    config,
                    &mut result,
                );
            }

            for assignment in &assignments {
                if assignment.assigned_quantity_t > 0.0 {
                    result.tasks.push(Self::mining_task(
                        assignment,
                        period,
                        &config.schedule_version_id,
                    ));
                }
            }

            let parcels = if rate_factor < 1.0 {
                // 料包不可变: 节流后按缩放分配重建
                self.generator.generate(&assignments, period)
            } else {
                parcels
            };
            if parcels.is_empty() {
                continue;
            }

            // 路由: LP 优先, 失败回退贪心 (尽力而为, 运行继续)
            let routing = if config.use_lp_solver {
                match self.lp.allocate_period(&parcels, &inputs.network, &index) {
                    Ok(r) => r,
                    Err(err) => {
                        warn!(period_id = %period.period_id, %err, "LP 失败, 回退贪心路由");
                        result.diagnostics.push(format!(
                            "周期 {}: LP 分配失败, 已回退贪心: {}",
                            period.period_id, err
                        ));
                        let mut throughput = PeriodThroughput::new();
                        self.greedy
                            .route_period(&parcels, &inputs.network, &index, &mut throughput)
                    }
                }
            } else {
                let mut throughput = PeriodThroughput::new();
                self.greedy
                    .route_period(&parcels, &inputs.network, &index, &mut throughput)
            };

            Self::collect_routing(&mut result, routing, period, &config.schedule_version_id);
        }

        Ok(result)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 同优先级组内轮转扰动
    ///
    /// 迭代 0 保持原序; 迭代 k 在每个等优先级连续段内左轮转 k 位。
    /// 优先级降序整体不变, 迭代间输入确实不同 (收敛有意义)
    fn perturb_within_priority(candidates: &[Candidate], iteration: usize) -> Vec<Candidate> {
        let mut out = candidates.to_vec();
        if iteration == 0 {
            return out;
        }
        let mut start = 0;
        while start < out.len() {
            let priority = out[start].priority;
            let mut end = start + 1;
            while end < out.len() && out[end].priority == priority {
                end += 1;
            }
            let group = &mut out[start..end];
            if group.len() > 1 {
                group.rotate_left(iteration % group.len());
            }
            start = end;
        }
        out
    }

    /// 质量驱动的速率因子
    ///
    /// 按源节点统计: 本周期产出吨位 vs 硬约束可行出弧的总容量。
    /// 可行容量按目的地分组, 每个目的地贡献
    /// min(目的节点容量, 入该目的地可行弧容量之和) —— 并联弧不得
    /// 重复计入同一受限节点的容量;
    /// factor = min(1, 可行容量/吨位), 取各节点最小值。
    /// 存在完全无上限的可行路径时该源节点不构成约束
    fn compute_rate_factor(
        &self,
        parcels: &[Parcel],
        network: &FlowNetwork,
        index: &ObjectiveIndex<'_>,
    ) -> (f64, Option<String>) {
        let mut by_node: BTreeMap<&str, Vec<&Parcel>> = BTreeMap::new();
        for parcel in parcels {
            by_node
                .entry(parcel.source_node_id.as_str())
                .or_default()
                .push(parcel);
        }

        let mut factor = 1.0_f64;
        let mut binding = None;
        for (node_id, node_parcels) in by_node {
            let tonnes: f64 = node_parcels.iter().map(|p| p.quantity_t).sum();
            if tonnes <= 0.0 {
                continue;
            }

            // 可行弧容量按目的地累计 (None = 该目的地存在无上限可行弧)
            let mut dest_arc_caps: BTreeMap<&str, Option<f64>> = BTreeMap::new();
            for arc in network.arcs_from(node_id) {
                // 对任一料包质量可行 (硬约束) 且物料相符的弧计入可行容量
                let usable = node_parcels.iter().any(|p| {
                    arc.accepts_material(&p.material_type_id)
                        && self
                            .blending
                            .check_compliance(&p.quality, index.for_arc(&arc.arc_id))
                            .is_compliant
                });
                if !usable {
                    continue;
                }
                let slot = dest_arc_caps
                    .entry(arc.to_node.as_str())
                    .or_insert(Some(0.0));
                match arc.capacity_t_per_period {
                    Some(cap) => {
                        if let Some(sum) = slot.as_mut() {
                            *sum += cap;
                        }
                    }
                    None => *slot = None,
                }
            }

            let mut capacity = 0.0_f64;
            let mut unbounded = false;
            for (dest, arc_caps) in dest_arc_caps {
                let dest_cap = network.node(dest).and_then(|n| n.capacity_t_per_period);
                // 目的地贡献 = min(节点容量, 该目的地可行弧容量之和)
                match (arc_caps, dest_cap) {
                    (None, None) => {
                        unbounded = true;
                        break;
                    }
                    (None, Some(n)) => capacity += n,
                    (Some(a), None) => capacity += a,
                    (Some(a), Some(n)) => capacity += a.min(n),
                }
            }
            if unbounded {
                continue;
            }

            let node_factor = (capacity / tonnes).min(1.0);
            if node_factor < factor {
                factor = node_factor;
                binding = Some(format!(
                    "node={}, feasible_capacity_t={:.1}, mined_t={:.1}",
                    node_id, capacity, tonnes
                ));
            }
        }
        (factor.max(0.0), binding)
    }

    /// 按速率因子缩放分配, 合成 OptimiserDelay 任务
    #[allow(clippy::too_many_arguments)]
    fn throttle_assignments(
        &self,
        assignments: Vec<Assignment>,
        rate_factor: f64,
        reason: &str,
        resource_min: &HashMap<&str, f64>,
        period: &Period,
        config: &ScheduleRunConfig,
        result: &mut IterationResult,
    ) -> Vec<Assignment> {
        let mut scaled = Vec::with_capacity(assignments.len());
        for mut assignment in assignments {
            // 节流不得低于资源速率下限
            let floor = resource_min
                .get(assignment.resource_id.as_str())
                .copied()
                .unwrap_or(0.0);
            let effective = rate_factor.max(floor).min(1.0);
            let withheld = assignment.assigned_quantity_t * (1.0 - effective);

            if withheld > FLOW_TONNES_TOLERANCE {
                let delay_reason = format!("RATE_THROTTLE: {}, factor={:.3}", reason, effective);
                result.tasks.push(Task {
                    task_id: Uuid::new_v4().to_string(),
                    schedule_version_id: config.schedule_version_id.clone(),
                    resource_id: assignment.resource_id.clone(),
                    activity_id: assignment.candidate.activity_id.clone(),
                    period_id: period.period_id.clone(),
                    area_id: assignment.candidate.area_id.clone(),
                    planned_quantity_t: withheld,
                    task_type: TaskType::OptimiserDelay,
                    reason: Some(delay_reason.clone()),
                });
                result.diagnostics.push(format!(
                    "周期 {}: 资源 {} 质量节流 {:.1}t ({})",
                    period.period_id, assignment.resource_id, withheld, delay_reason
                ));
            }
            assignment.assigned_quantity_t *= effective;
            scaled.push(assignment);
        }
        scaled
    }

    /// 汇入路由结果: 流向/累计量/诊断/决策解释
    fn collect_routing(
        result: &mut IterationResult,
        routing: RoutingOutcome,
        period: &Period,
        version_id: &str,
    ) {
        // 目的地分组 (BTreeMap 保证解释输出顺序确定)
        let mut by_destination: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for (i, allocation) in routing.allocations.iter().enumerate() {
            result.totals.add_allocation(
                allocation.tonnes,
                allocation.cost,
                allocation.benefit,
                allocation.penalty_cost,
            );
            if allocation.tonnes > FLOW_TONNES_TOLERANCE {
                result.flows.push(FlowResult {
                    flow_id: Uuid::new_v4().to_string(),
                    schedule_version_id: version_id.to_string(),
                    period_id: period.period_id.clone(),
                    parcel_id: allocation.parcel_id.clone(),
                    arc_id: allocation.arc_id.clone(),
                    from_node: allocation.from_node.clone(),
                    to_node: allocation.to_node.clone(),
                    tonnes: allocation.tonnes,
                    cost: allocation.cost,
                    benefit: allocation.benefit,
                    penalty_cost: allocation.penalty_cost,
                });
            }
            by_destination
                .entry(allocation.to_node.clone())
                .or_default()
                .push(i);
        }

        for unrouted in &routing.unrouted {
            result.diagnostics.push(format!(
                "周期 {}: 料包 {} 未路由: {}",
                period.period_id, unrouted.parcel_id, unrouted.reason
            ));
        }
        for note in &routing.notes {
            result
                .diagnostics
                .push(format!("周期 {}: {}", period.period_id, note));
        }

        // 决策解释: 罚分非零或涉及紧约束的目的地
        for (destination, alloc_idx) in by_destination {
            let penalty: f64 = alloc_idx
                .iter()
                .map(|&i| routing.allocations[i].penalty_cost)
                .sum();
            let relevant_binding: Vec<String> = routing
                .binding_constraints
                .iter()
                .filter(|b| {
                    b.as_str() == format!("node:{}", destination)
                        || alloc_idx
                            .iter()
                            .any(|&i| b.as_str() == format!("arc:{}", routing.allocations[i].arc_id))
                })
                .cloned()
                .collect();
            if penalty <= 0.0 && relevant_binding.is_empty() {
                continue;
            }

            let tonnes: f64 = alloc_idx
                .iter()
                .map(|&i| routing.allocations[i].tonnes)
                .sum();
            let breakdown: Vec<_> = alloc_idx
                .iter()
                .map(|&i| {
                    let a = &routing.allocations[i];
                    json!({
                        "parcel_id": a.parcel_id,
                        "arc_id": a.arc_id,
                        "tonnes": a.tonnes,
                        "penalty_cost": a.penalty_cost,
                    })
                })
                .collect();

            result.explanations.push(DecisionExplanation {
                explanation_id: Uuid::new_v4().to_string(),
                schedule_version_id: version_id.to_string(),
                period_id: period.period_id.clone(),
                destination_node: destination.clone(),
                summary: format!(
                    "目的地 {} 周期 {} 接收 {:.1}t, 质量罚分 {:.2}, 紧约束 {} 项",
                    destination,
                    period.period_id,
                    tonnes,
                    penalty,
                    relevant_binding.len()
                ),
                binding_constraints: relevant_binding,
                penalty_breakdown: json!({ "allocations": breakdown }).to_string(),
            });
        }
    }

    fn mining_task(assignment: &Assignment, period: &Period, version_id: &str) -> Task {
        Task {
            task_id: Uuid::new_v4().to_string(),
            schedule_version_id: version_id.to_string(),
            resource_id: assignment.resource_id.clone(),
            activity_id: assignment.candidate.activity_id.clone(),
            period_id: period.period_id.clone(),
            area_id: assignment.candidate.area_id.clone(),
            planned_quantity_t: assignment.assigned_quantity_t,
            task_type: TaskType::Mining,
            reason: None,
        }
    }
}

impl Default for ScheduleEngine {
    fn default() -> Self {
        Self::new()
    }
}
