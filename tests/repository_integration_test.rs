// ==========================================
// 仓储层集成测试 (文件库)
// ==========================================
// 目标: SQLite 落库跨连接持久化 + 事务原子性
// ==========================================

use mine_production_aps::domain::plan::{RunTotals, ScheduleOutcome, Task};
use mine_production_aps::{ScheduleRunRecord, ScheduleStore, SqliteScheduleStore, TaskType};

fn task(task_id: &str, version_id: &str, period_id: &str, quantity: f64) -> Task {
    Task {
        task_id: task_id.to_string(),
        schedule_version_id: version_id.to_string(),
        resource_id: "EX01".to_string(),
        activity_id: "MINE_ORE".to_string(),
        period_id: period_id.to_string(),
        area_id: "A1".to_string(),
        planned_quantity_t: quantity,
        task_type: TaskType::Mining,
        reason: None,
    }
}

fn record(run_id: &str, version_id: &str, tasks: Vec<Task>) -> ScheduleRunRecord {
    let outcome = ScheduleOutcome {
        run_id: run_id.to_string(),
        success: true,
        tasks_created: tasks.len(),
        flows_created: 0,
        explanation_count: 0,
        totals: RunTotals {
            tonnes: tasks.iter().map(|t| t.planned_quantity_t).sum(),
            ..Default::default()
        },
        diagnostics: vec!["产能不足: 1 个候选未能在窗口内分配".to_string()],
        iterations_executed: 2,
    };
    ScheduleRunRecord {
        run_id: run_id.to_string(),
        site_id: "SITE1".to_string(),
        schedule_version_id: version_id.to_string(),
        tasks,
        flows: vec![],
        explanations: vec![],
        outcome,
    }
}

#[test]
fn test_commit_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");

    {
        let mut store = SqliteScheduleStore::open(&path).unwrap();
        store
            .commit_run(&record(
                "RUN1",
                "V001",
                vec![task("T1", "V001", "P1", 500.0), task("T2", "V001", "P2", 300.0)],
            ))
            .unwrap();
    }

    // 重新打开: 数据与摘要完整可读
    let store = SqliteScheduleStore::open(&path).unwrap();
    let tasks = store.find_tasks_by_version("V001").unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].period_id, "P1");

    let outcome = store.find_run("RUN1").unwrap().unwrap();
    assert_eq!(outcome.iterations_executed, 2);
    assert!((outcome.totals.tonnes - 800.0).abs() < 1e-9);
    assert_eq!(outcome.diagnostics.len(), 1);
}

#[test]
fn test_atomic_rollback_on_mid_commit_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");
    let mut store = SqliteScheduleStore::open(&path).unwrap();

    store
        .commit_run(&record("RUN1", "V001", vec![task("T1", "V001", "P1", 500.0)]))
        .unwrap();

    // 新运行中第二条任务与已提交的 T1 冲突 -> 中途失败
    let bad = record(
        "RUN2",
        "V002",
        vec![task("T9", "V002", "P1", 100.0), task("T1", "V002", "P1", 100.0)],
    );
    assert!(store.commit_run(&bad).is_err());

    // 回滚后: RUN2 无痕迹, V001 原结果不受影响
    assert!(store.find_run("RUN2").unwrap().is_none());
    assert!(store.find_tasks_by_version("V002").unwrap().is_empty());
    assert_eq!(store.find_tasks_by_version("V001").unwrap().len(), 1);
}

#[test]
fn test_version_results_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteScheduleStore::open(dir.path().join("schedule.db")).unwrap();

    store
        .commit_run(&record("RUN1", "V001", vec![task("T1", "V001", "P1", 500.0)]))
        .unwrap();
    store
        .commit_run(&record("RUN2", "V002", vec![task("T2", "V002", "P1", 200.0)]))
        .unwrap();

    // 版本间互不覆盖
    assert_eq!(store.find_tasks_by_version("V001").unwrap().len(), 1);
    assert_eq!(store.find_tasks_by_version("V002").unwrap().len(), 1);
    assert_eq!(
        store.find_tasks_by_version("V001").unwrap()[0].task_id,
        "T1"
    );
}
