// ==========================================
// 矿山生产排程系统 - 排程结果仓储
// ==========================================
// 职责: 胜出迭代的任务/流向/决策解释整体落库
// 红线: 单事务提交, 任一失败整体回滚;
//       同版本重排覆盖旧结果 (版本内替换语义)
// ==========================================

use crate::domain::plan::{DecisionExplanation, FlowResult, RunTotals, ScheduleOutcome, Task};
use crate::domain::types::TaskType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// ScheduleRunRecord - 一次运行的完整产出
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheduleRunRecord {
    pub run_id: String,
    pub site_id: String,
    pub schedule_version_id: String,
    pub tasks: Vec<Task>,
    pub flows: Vec<FlowResult>,
    pub explanations: Vec<DecisionExplanation>,
    pub outcome: ScheduleOutcome,
}

// ==========================================
// ScheduleStore - 排程结果存储接口
// ==========================================
pub trait ScheduleStore {
    /// 整体提交一次运行的产出 (原子性: 要么全部写入要么全部不写)
    fn commit_run(&mut self, record: &ScheduleRunRecord) -> RepositoryResult<()>;
}

// ==========================================
// SqliteScheduleStore - SQLite 实现
// ==========================================
pub struct SqliteScheduleStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScheduleStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// 打开 (必要时创建) 指定路径的结果库
    pub fn open(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::new(Arc::new(Mutex::new(conn)))
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn init_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_run (
                run_id TEXT PRIMARY KEY,
                site_id TEXT NOT NULL,
                schedule_version_id TEXT NOT NULL,
                success INTEGER NOT NULL,
                tasks_created INTEGER NOT NULL,
                flows_created INTEGER NOT NULL,
                explanation_count INTEGER NOT NULL,
                total_tonnes REAL NOT NULL,
                total_cost REAL NOT NULL,
                total_benefit REAL NOT NULL,
                total_penalty REAL NOT NULL,
                iterations_executed INTEGER NOT NULL,
                diagnostics_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task (
                task_id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                schedule_version_id TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                activity_id TEXT NOT NULL,
                period_id TEXT NOT NULL,
                area_id TEXT NOT NULL,
                planned_quantity_t REAL NOT NULL,
                task_type TEXT NOT NULL,
                reason TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_task_version ON task(schedule_version_id);

            CREATE TABLE IF NOT EXISTS flow_result (
                flow_id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                schedule_version_id TEXT NOT NULL,
                period_id TEXT NOT NULL,
                parcel_id TEXT NOT NULL,
                arc_id TEXT NOT NULL,
                from_node TEXT NOT NULL,
                to_node TEXT NOT NULL,
                tonnes REAL NOT NULL,
                cost REAL NOT NULL,
                benefit REAL NOT NULL,
                penalty_cost REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_flow_version ON flow_result(schedule_version_id);

            CREATE TABLE IF NOT EXISTS decision_explanation (
                explanation_id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                schedule_version_id TEXT NOT NULL,
                period_id TEXT NOT NULL,
                destination_node TEXT NOT NULL,
                summary TEXT NOT NULL,
                binding_constraints_json TEXT NOT NULL,
                penalty_breakdown_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_explanation_version
                ON decision_explanation(schedule_version_id);
            "#,
        )?;
        Ok(())
    }

    /// 按版本查询任务
    pub fn find_tasks_by_version(&self, version_id: &str) -> RepositoryResult<Vec<Task>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT task_id, schedule_version_id, resource_id, activity_id,
                      period_id, area_id, planned_quantity_t, task_type, reason
               FROM task
               WHERE schedule_version_id = ?
               ORDER BY period_id, task_id"#,
        )?;
        let tasks = stmt
            .query_map(params![version_id], Self::map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// 按版本查询流向结果
    pub fn find_flows_by_version(&self, version_id: &str) -> RepositoryResult<Vec<FlowResult>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT flow_id, schedule_version_id, period_id, parcel_id, arc_id,
                      from_node, to_node, tonnes, cost, benefit, penalty_cost
               FROM flow_result
               WHERE schedule_version_id = ?
               ORDER BY period_id, flow_id"#,
        )?;
        let flows = stmt
            .query_map(params![version_id], |row| {
                Ok(FlowResult {
                    flow_id: row.get(0)?,
                    schedule_version_id: row.get(1)?,
                    period_id: row.get(2)?,
                    parcel_id: row.get(3)?,
                    arc_id: row.get(4)?,
                    from_node: row.get(5)?,
                    to_node: row.get(6)?,
                    tonnes: row.get(7)?,
                    cost: row.get(8)?,
                    benefit: row.get(9)?,
                    penalty_cost: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(flows)
    }

    /// 按 run_id 查询运行摘要
    pub fn find_run(&self, run_id: &str) -> RepositoryResult<Option<ScheduleOutcome>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            r#"SELECT run_id, success, tasks_created, flows_created, explanation_count,
                      total_tonnes, total_cost, total_benefit, total_penalty,
                      iterations_executed, diagnostics_json
               FROM schedule_run
               WHERE run_id = ?"#,
            params![run_id],
            |row| {
                let diagnostics_json: String = row.get(10)?;
                Ok(ScheduleOutcome {
                    run_id: row.get(0)?,
                    success: row.get(1)?,
                    tasks_created: row.get::<_, i64>(2)? as usize,
                    flows_created: row.get::<_, i64>(3)? as usize,
                    explanation_count: row.get::<_, i64>(4)? as usize,
                    totals: RunTotals {
                        tonnes: row.get(5)?,
                        cost: row.get(6)?,
                        benefit: row.get(7)?,
                        penalty: row.get(8)?,
                    },
                    iterations_executed: row.get::<_, i64>(9)? as usize,
                    diagnostics: serde_json::from_str(&diagnostics_json).unwrap_or_default(),
                })
            },
        ) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
        let task_type_str: String = row.get(7)?;
        let task_type = match task_type_str.as_str() {
            "OPTIMISER_DELAY" => TaskType::OptimiserDelay,
            _ => TaskType::Mining,
        };
        Ok(Task {
            task_id: row.get(0)?,
            schedule_version_id: row.get(1)?,
            resource_id: row.get(2)?,
            activity_id: row.get(3)?,
            period_id: row.get(4)?,
            area_id: row.get(5)?,
            planned_quantity_t: row.get(6)?,
            task_type,
            reason: row.get(8)?,
        })
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn commit_run(&mut self, record: &ScheduleRunRecord) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // 版本内替换: 重排覆盖该版本旧结果
        tx.execute(
            "DELETE FROM task WHERE schedule_version_id = ?",
            params![&record.schedule_version_id],
        )?;
        tx.execute(
            "DELETE FROM flow_result WHERE schedule_version_id = ?",
            params![&record.schedule_version_id],
        )?;
        tx.execute(
            "DELETE FROM decision_explanation WHERE schedule_version_id = ?",
            params![&record.schedule_version_id],
        )?;

        tx.execute(
            r#"INSERT INTO schedule_run (
                run_id, site_id, schedule_version_id, success,
                tasks_created, flows_created, explanation_count,
                total_tonnes, total_cost, total_benefit, total_penalty,
                iterations_executed, diagnostics_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &record.run_id,
                &record.site_id,
                &record.schedule_version_id,
                record.outcome.success,
                record.outcome.tasks_created as i64,
                record.outcome.flows_created as i64,
                record.outcome.explanation_count as i64,
                record.outcome.totals.tonnes,
                record.outcome.totals.cost,
                record.outcome.totals.benefit,
                record.outcome.totals.penalty,
                record.outcome.iterations_executed as i64,
                serde_json::to_string(&record.outcome.diagnostics)
                    .map_err(|e| RepositoryError::DatabaseQueryError(e.to_string()))?,
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO task (
                    task_id, run_id, schedule_version_id, resource_id, activity_id,
                    period_id, area_id, planned_quantity_t, task_type, reason
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for task in &record.tasks {
                stmt.execute(params![
                    &task.task_id,
                    &record.run_id,
                    &task.schedule_version_id,
                    &task.resource_id,
                    &task.activity_id,
                    &task.period_id,
                    &task.area_id,
                    task.planned_quantity_t,
                    task.task_type.to_string(),
                    &task.reason,
                ])?;
            }

            let mut stmt = tx.prepare(
                r#"INSERT INTO flow_result (
                    flow_id, run_id, schedule_version_id, period_id, parcel_id,
                    arc_id, from_node, to_node, tonnes, cost, benefit, penalty_cost
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for flow in &record.flows {
                stmt.execute(params![
                    &flow.flow_id,
                    &record.run_id,
                    &flow.schedule_version_id,
                    &flow.period_id,
                    &flow.parcel_id,
                    &flow.arc_id,
                    &flow.from_node,
                    &flow.to_node,
                    flow.tonnes,
                    flow.cost,
                    flow.benefit,
                    flow.penalty_cost,
                ])?;
            }

            let mut stmt = tx.prepare(
                r#"INSERT INTO decision_explanation (
                    explanation_id, run_id, schedule_version_id, period_id,
                    destination_node, summary, binding_constraints_json,
                    penalty_breakdown_json
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for explanation in &record.explanations {
                stmt.execute(params![
                    &explanation.explanation_id,
                    &record.run_id,
                    &explanation.schedule_version_id,
                    &explanation.period_id,
                    &explanation.destination_node,
                    &explanation.summary,
                    serde_json::to_string(&explanation.binding_constraints)
                        .map_err(|e| RepositoryError::DatabaseQueryError(e.to_string()))?,
                    &explanation.penalty_breakdown,
                ])?;
            }
        }

        tx.commit()?;
        info!(
            run_id = %record.run_id,
            version_id = %record.schedule_version_id,
            tasks = record.tasks.len(),
            flows = record.flows.len(),
            "排程结果已提交"
        );
        Ok(())
    }
}

// ==========================================
// MemoryScheduleStore - 内存实现 (测试/预览)
// ==========================================
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    pub runs: Vec<ScheduleRunRecord>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn commit_run(&mut self, record: &ScheduleRunRecord) -> RepositoryResult<()> {
        // 版本内替换语义与 SQLite 实现保持一致
        self.runs
            .retain(|r| r.schedule_version_id != record.schedule_version_id);
        self.runs.push(record.clone());
        debug!(run_id = %record.run_id, "排程结果已写入内存存储");
        Ok(())
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(task_id: &str, version_id: &str) -> Task {
        Task {
            task_id: task_id.to_string(),
            schedule_version_id: version_id.to_string(),
            resource_id: "EX01".to_string(),
            activity_id: "MINE_ORE".to_string(),
            period_id: "P1".to_string(),
            area_id: "A1".to_string(),
            planned_quantity_t: 500.0,
            task_type: TaskType::Mining,
            reason: None,
        }
    }

    fn sample_record(run_id: &str, version_id: &str, task_ids: &[&str]) -> ScheduleRunRecord {
        let tasks: Vec<Task> = task_ids
            .iter()
            .map(|id| sample_task(id, version_id))
            .collect();
        let outcome = ScheduleOutcome {
            run_id: run_id.to_string(),
            success: true,
            tasks_created: tasks.len(),
            flows_created: 0,
            explanation_count: 0,
            totals: RunTotals {
                tonnes: 500.0 * tasks.len() as f64,
                ..Default::default()
            },
            diagnostics: vec![],
            iterations_executed: 1,
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

    fn memory_store() -> SqliteScheduleStore {
        let conn = Connection::open_in_memory().unwrap();
        SqliteScheduleStore::new(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_commit_and_query_roundtrip() {
        let mut store = memory_store();
        store
            .commit_run(&sample_record("RUN1", "V001", &["T1", "T2"]))
            .unwrap();

        let tasks = store.find_tasks_by_version("V001").unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_type, TaskType::Mining);
        assert_eq!(tasks[0].planned_quantity_t, 500.0);

        let outcome = store.find_run("RUN1").unwrap().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.tasks_created, 2);
        assert_eq!(outcome.totals.tonnes, 1000.0);
    }

    #[test]
    fn test_rerun_replaces_version_results() {
        let mut store = memory_store();
        store
            .commit_run(&sample_record("RUN1", "V001", &["T1", "T2"]))
            .unwrap();
        store
            .commit_run(&sample_record("RUN2", "V001", &["T3"]))
            .unwrap();

        // 同版本重排: 旧任务被替换, 不累积
        let tasks = store.find_tasks_by_version("V001").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, "T3");
    }

    #[test]
    fn test_failed_commit_rolls_back_whole_run() {
        let mut store = memory_store();
        // 记录内部任务ID重复 -> 第二条插入违反主键, 整个事务回滚
        let bad = sample_record("RUN1", "V001", &["T1", "T1"]);
        let result = store.commit_run(&bad);
        assert!(result.is_err());

        assert!(store.find_run("RUN1").unwrap().is_none());
        assert!(store.find_tasks_by_version("V001").unwrap().is_empty());
    }

    #[test]
    fn test_memory_store_replace_semantics() {
        let mut store = MemoryScheduleStore::new();
        store
            .commit_run(&sample_record("RUN1", "V001", &["T1"]))
            .unwrap();
        store
            .commit_run(&sample_record("RUN2", "V001", &["T2"]))
            .unwrap();
        store
            .commit_run(&sample_record("RUN3", "V002", &["T3"]))
            .unwrap();

        assert_eq!(store.runs.len(), 2);
        assert_eq!(store.runs[0].run_id, "RUN2");
    }
}
