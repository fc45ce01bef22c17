// ==========================================
// 排程引擎端到端集成测试
// ==========================================
// 目标: 小型矿山场景下 FastPass / FullPass 全链路验证
// 链路: 候选构建 -> 资源分配 -> 料包生成 -> LP 路由 -> 落库
// ==========================================

use chrono::NaiveDate;
use mine_production_aps::{
    ActivityArea, ArcQualityObjective, Calendar, CancelToken, FlowArc, FlowNetwork, FlowNode,
    MiningSlice, NodeKind, ObjectiveType, PenaltyForm, Period, QualityVector, Resource,
    ScheduleEngine, ScheduleInputs, ScheduleRunConfig, SliceStatus, SqliteScheduleStore, TaskType,
};

fn period(id: &str, index: i32, day_offset: i64) -> Period {
    let base = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    Period {
        period_id: id.to_string(),
        index,
        start_date: base + chrono::Duration::days(day_offset),
        end_date: base + chrono::Duration::days(day_offset + 6),
    }
}

fn slice(quantity_t: f64, ash: f64) -> MiningSlice {
    MiningSlice {
        slice_index: 1,
        status: SliceStatus::Available,
        quantity_t,
        material_type_id: "ORE".to_string(),
        quality: QualityVector::from([("Ash", ash)]),
    }
}

fn area(area_id: &str, priority: i32, slices: Vec<MiningSlice>) -> ActivityArea {
    ActivityArea {
        area_id: area_id.to_string(),
        name: area_id.to_string(),
        activity_id: "MINE_ORE".to_string(),
        priority,
        is_locked: false,
        source_node_id: "PIT1".to_string(),
        slices,
    }
}

fn node(node_id: &str, kind: NodeKind) -> FlowNode {
    FlowNode {
        node_id: node_id.to_string(),
        name: node_id.to_string(),
        kind,
        capacity_t_per_period: None,
    }
}

fn arc(arc_id: &str, to_node: &str, benefit_per_tonne: f64) -> FlowArc {
    FlowArc {
        arc_id: arc_id.to_string(),
        from_node: "PIT1".to_string(),
        to_node: to_node.to_string(),
        allowed_material_types: vec![],
        capacity_t_per_period: None,
        cost_per_tonne: 0.0,
        benefit_per_tonne,
        priority: 0,
        enabled: true,
    }
}

fn max_ash_objective(arc_id: &str, max: f64, weight: f64) -> ArcQualityObjective {
    ArcQualityObjective {
        arc_id: arc_id.to_string(),
        field: "Ash".to_string(),
        objective_type: ObjectiveType::Max,
        min_value: None,
        max_value: Some(max),
        target_value: None,
        tolerance: 0.0,
        penalty_weight: weight,
        penalty_form: PenaltyForm::Linear,
        hard_constraint: false,
    }
}

/// 两采区 (高灰/低灰) + 选厂/排土场双目的地的小型矿山
fn small_mine(plant_penalty_weight: f64) -> ScheduleInputs {
    ScheduleInputs {
        calendar: Calendar {
            calendar_id: "CAL1".to_string(),
            periods: vec![period("P1", 1, 0), period("P2", 2, 7)],
        },
        resources: vec![Resource {
            resource_id: "EX01".to_string(),
            name: "挖机01".to_string(),
            base_rate_tpd: 100.0, // 每周期 700 t
            supported_activities: vec!["MINE_ORE".to_string()],
            min_rate_factor: 0.2,
        }],
        areas: vec![
            area("A_HIGH", 9, vec![slice(400.0, 20.0)]),
            area("A_LOW", 5, vec![slice(400.0, 5.0)]),
        ],
        network: FlowNetwork {
            network_id: "NET1".to_string(),
            nodes: vec![
                node("PIT1", NodeKind::Mine),
                node("PLANT1", NodeKind::Plant),
                node("DUMP1", NodeKind::Dump),
            ],
            arcs: vec![
                arc("ARC_PLANT", "PLANT1", 1.0),
                arc("ARC_DUMP", "DUMP1", 0.0),
            ],
            // 选厂灰分上限 10; 高灰矿 (20) 超标 10 个点
            objectives: vec![max_ash_objective("ARC_PLANT", 10.0, plant_penalty_weight)],
        },
        existing_tasks: vec![],
        field_registry: None,
        version_published: false,
    }
}

fn open_store(dir: &tempfile::TempDir) -> SqliteScheduleStore {
    SqliteScheduleStore::open(dir.path().join("schedule.db")).unwrap()
}

#[test]
fn test_full_pass_steers_high_ash_to_dump() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let engine = ScheduleEngine::new();
    // 权重 50: 高灰走选厂的单位罚分 500/400 = 1.25 > 选厂收益 1.0 -> 排土场
    let inputs = small_mine(50.0);
    let config = ScheduleRunConfig::new("SITE1", "V001");

    let outcome = engine
        .run_full_pass(&inputs, &config, &mut store, &CancelToken::new())
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.totals.penalty, 0.0);
    // 周期产能 700 t: P1 采高灰 400 + 低灰 300, P2 采低灰余量 100
    assert_eq!(outcome.tasks_created, 3);
    assert!((outcome.totals.tonnes - 800.0).abs() < 0.01);

    let flows = store.find_flows_by_version("V001").unwrap();
    assert_eq!(flows.len(), 3);
    for flow in &flows {
        match flow.to_node.as_str() {
            // 高灰 400 t 全部进排土场
            "DUMP1" => assert!((flow.tonnes - 400.0).abs() < 0.01),
            "PLANT1" => assert!(flow.tonnes <= 300.0 + 0.01),
            other => panic!("意外目的地: {}", other),
        }
    }
    let plant_total: f64 = flows
        .iter()
        .filter(|f| f.to_node == "PLANT1")
        .map(|f| f.tonnes)
        .sum();
    assert!((plant_total - 400.0).abs() < 0.01);
    // 选厂收益 1.0/t * 400 t
    assert!((outcome.totals.benefit - 400.0).abs() < 0.01);
}

#[test]
fn test_full_pass_low_weight_accepts_penalty_with_explanation() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let engine = ScheduleEngine::new();
    // 权重 10: 高灰走选厂的单位罚分 100/400 = 0.25 < 收益 1.0 -> 带罚分进选厂
    let inputs = small_mine(10.0);
    let config = ScheduleRunConfig::new("SITE1", "V002");

    let outcome = engine
        .run_full_pass(&inputs, &config, &mut store, &CancelToken::new())
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.totals.penalty > 0.0);
    assert!(outcome.explanation_count > 0);
    // 高灰偏差 10 * 权重 10 = 罚分 100
    assert!((outcome.totals.penalty - 100.0).abs() < 0.01);

    let flows = store.find_flows_by_version("V002").unwrap();
    // 全部矿量进选厂
    assert!(flows.iter().all(|f| f.to_node == "PLANT1"));
    let penalized: f64 = flows.iter().map(|f| f.penalty_cost).sum();
    assert!((penalized - 100.0).abs() < 0.01);
}

#[test]
fn test_fast_pass_creates_mining_tasks_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let engine = ScheduleEngine::new();
    let inputs = small_mine(50.0);
    let config = ScheduleRunConfig::new("SITE1", "V003");

    let outcome = engine.run_fast_pass(&inputs, &config, &mut store).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.flows_created, 0);

    let tasks = store.find_tasks_by_version("V003").unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.task_type == TaskType::Mining));
    assert!(store.find_flows_by_version("V003").unwrap().is_empty());
}

#[test]
fn test_full_pass_rerun_replaces_prior_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let engine = ScheduleEngine::new();
    let config = ScheduleRunConfig::new("SITE1", "V004");

    engine
        .run_full_pass(
            &small_mine(50.0),
            &config,
            &mut store,
            &CancelToken::new(),
        )
        .unwrap();
    let first = store.find_tasks_by_version("V004").unwrap();

    // 同版本重排: 结果整体替换而非累积
    engine
        .run_full_pass(
            &small_mine(50.0),
            &config,
            &mut store,
            &CancelToken::new(),
        )
        .unwrap();
    let second = store.find_tasks_by_version("V004").unwrap();
    assert_eq!(first.len(), second.len());
    // 新一轮生成了新的任务ID
    assert!(second.iter().all(|t| !first.iter().any(|f| f.task_id == t.task_id)));
}

#[test]
fn test_locked_area_excluded_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = open_store(&dir);
    let engine = ScheduleEngine::new();
    let mut inputs = small_mine(50.0);
    inputs.areas[0].is_locked = true; // 锁定高灰采区
    let config = ScheduleRunConfig::new("SITE1", "V005");

    let outcome = engine
        .run_full_pass(&inputs, &config, &mut store, &CancelToken::new())
        .unwrap();
    // 只剩低灰 400 t, 单周期内完成
    assert!((outcome.totals.tonnes - 400.0).abs() < 0.01);
    let tasks = store.find_tasks_by_version("V005").unwrap();
    assert!(tasks.iter().all(|t| t.area_id == "A_LOW"));
}
