// ==========================================
// 矿山生产排程系统 - 配矿质量引擎
// ==========================================
// 职责: 加权质量混合、合规检查、罚分计算
// 红线: 纯计算, 无隐藏状态; 所有违规输出 reason
// ==========================================

use crate::domain::network::ArcQualityObjective;
use crate::domain::quality::QualityVector;
use crate::domain::types::{BlendMethod, ObjectiveType, PenaltyForm};
use crate::domain::Parcel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ==========================================
// ObjectiveViolation - 单目标违规明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveViolation {
    pub field: String,
    pub objective_type: ObjectiveType,
    pub deviation: f64, // 超出容差的偏差量
    pub penalty: f64,
    pub hard: bool,
    pub reason: String,
}

// ==========================================
// ComplianceResult - 合规检查结果
// ==========================================
// is_compliant=false 当且仅当存在被违反的硬约束; 软违规只累计罚分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub is_compliant: bool,
    pub total_penalty: f64,
    pub violations: Vec<ObjectiveViolation>,
}

impl ComplianceResult {
    pub fn compliant() -> Self {
        Self {
            is_compliant: true,
            total_penalty: 0.0,
            violations: Vec::new(),
        }
    }
}

// ==========================================
// BlendingService - 配矿质量引擎
// ==========================================
pub struct BlendingService {
    // 无状态引擎
}

impl BlendingService {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 多料包质量混合
    ///
    /// 按字段应用混合规则, 未配置规则的字段默认吨位加权平均;
    /// 所有料包都缺失的字段不出现在结果中
    ///
    /// # 参数
    /// - `parcels`: 参与混合的料包
    /// - `field_rules`: 字段 -> 混合方法
    pub fn blend(
        &self,
        parcels: &[Parcel],
        field_rules: &HashMap<String, BlendMethod>,
    ) -> QualityVector {
        // 字段全集 (确定顺序)
        let fields: BTreeSet<&String> = parcels
            .iter()
            .flat_map(|p| p.quality.fields())
            .collect();

        let mut result = QualityVector::new();
        for field in fields {
            let method = field_rules
                .get(field.as_str())
                .copied()
                .unwrap_or(BlendMethod::WeightedAverage);

            // 仅统计携带该字段的料包
            let present: Vec<(f64, f64)> = parcels
                .iter()
                .filter_map(|p| p.quality.get(field).map(|v| (v, p.quantity_t)))
                .collect();
            if present.is_empty() {
                continue;
            }

            let value = match method {
                BlendMethod::WeightedAverage => {
                    let total_t: f64 = present.iter().map(|(_, t)| t).sum();
                    if total_t <= 0.0 {
                        continue; // 零吨位无法加权
                    }
                    present.iter().map(|(v, t)| v * t).sum::<f64>() / total_t
                }
                BlendMethod::Sum => present.iter().map(|(v, _)| v).sum(),
                BlendMethod::Min => present.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min),
                BlendMethod::Max => present
                    .iter()
                    .map(|(v, _)| *v)
                    .fold(f64::NEG_INFINITY, f64::max),
            };
            result.set(field.clone(), value);
        }
        result
    }

    /// 增量混合: 已有混合物 + 新增批次
    ///
    /// 吨位加权合并, 任一侧零吨位时原样返回另一侧
    pub fn incremental_blend(
        &self,
        existing_q: &QualityVector,
        existing_t: f64,
        added_q: &QualityVector,
        added_t: f64,
    ) -> QualityVector {
        if existing_t <= 0.0 {
            return added_q.clone();
        }
        if added_t <= 0.0 {
            return existing_q.clone();
        }

        // 字段并集, 缺失字段按 0 参与加权
        let fields: BTreeSet<&String> = existing_q.fields().chain(added_q.fields()).collect();
        let total_t = existing_t + added_t;

        let mut result = QualityVector::new();
        for field in fields {
            let e = existing_q.get(field).unwrap_or(0.0);
            let a = added_q.get(field).unwrap_or(0.0);
            result.set(field.clone(), (e * existing_t + a * added_t) / total_t);
        }
        result
    }

    /// 质量合规检查
    ///
    /// 逐目标计算超出容差的偏差与罚分; 向量缺失的字段跳过该目标
    ///
    /// # 返回
    /// ComplianceResult (纯函数: 相同输入必得相同输出)
    pub fn check_compliance(
        &self,
        quality: &QualityVector,
        objectives: &[&ArcQualityObjective],
    ) -> ComplianceResult {
        let mut violations = Vec::new();
        let mut total_penalty = 0.0;
        let mut is_compliant = true;

        for obj in objectives {
            let value = match quality.get(&obj.field) {
                Some(v) => v,
                None => continue, // 字段缺失, 目标不适用
            };

            let deviation = match Self::deviation(obj, value) {
                Some(d) => d,
                None => continue, // 目标缺少边界定义, 跳过
            };
            if deviation <= 0.0 {
                continue;
            }

            let penalty = Self::penalty(obj.penalty_form, deviation, obj.penalty_weight);
            total_penalty += penalty;
            if obj.hard_constraint {
                is_compliant = false;
            }

            violations.push(ObjectiveViolation {
                field: obj.field.clone(),
                objective_type: obj.objective_type,
                deviation,
                penalty,
                hard: obj.hard_constraint,
                reason: format!(
                    "{}({})={:.4} 超出容差 {:.4}, 偏差 {:.4}",
                    obj.objective_type, obj.field, value, obj.tolerance, deviation
                ),
            });
        }

        ComplianceResult {
            is_compliant,
            total_penalty,
            violations,
        }
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 超出容差的偏差量; 目标缺边界时返回 None
    fn deviation(obj: &ArcQualityObjective, value: f64) -> Option<f64> {
        let raw = match obj.objective_type {
            ObjectiveType::Min => obj.min_value? - value,
            ObjectiveType::Max => value - obj.max_value?,
            ObjectiveType::Target => (value - obj.target_value?).abs(),
            ObjectiveType::Range => {
                let below = obj.min_value? - value;
                let above = value - obj.max_value?;
                below.max(above)
            }
        };
        Some((raw - obj.tolerance).max(0.0))
    }

    /// penalty = f(deviation, weight, form)
    fn penalty(form: PenaltyForm, deviation: f64, weight: f64) -> f64 {
        match form {
            PenaltyForm::Linear => deviation * weight,
            PenaltyForm::Quadratic => deviation * deviation * weight,
            PenaltyForm::Step => weight,
        }
    }
}

impl Default for BlendingService {
    fn default() -> Self {
        Self::new()
    }
}
