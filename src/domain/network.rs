// ==========================================
// 矿山生产排程系统 - 流向网络领域模型
// ==========================================
// 内容: 节点、弧、弧质量目标、分配结果
// 约束: 网络拓扑为只读输入; 周期吞吐量由引擎显式传递, 不挂在网络上
// ==========================================

use crate::domain::quality::QualityVector;
use crate::domain::types::{NodeKind, ObjectiveType, PenaltyForm};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// FlowNode - 流向节点
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub node_id: String,
    pub name: String,
    pub kind: NodeKind,
    pub capacity_t_per_period: Option<f64>, // None = 无容量约束
}

// ==========================================
// FlowArc - 流向弧
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowArc {
    pub arc_id: String,
    pub from_node: String,
    pub to_node: String,
    pub allowed_material_types: Vec<String>, // 空 = 不限物料类型
    pub capacity_t_per_period: Option<f64>,  // None = 无容量约束
    pub cost_per_tonne: f64,
    pub benefit_per_tonne: f64,
    pub priority: i32, // 贪心路由的同分偏好
    pub enabled: bool,
}

impl FlowArc {
    /// 该弧是否允许此物料类型通过
    pub fn accepts_material(&self, material_type_id: &str) -> bool {
        self.allowed_material_types.is_empty()
            || self
                .allowed_material_types
                .iter()
                .any(|m| m == material_type_id)
    }
}

// ==========================================
// ArcQualityObjective - 弧质量目标
// ==========================================
// bounds 按目标类型取用: Min->min_value, Max->max_value,
// Target->target_value, Range->min_value+max_value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcQualityObjective {
    pub arc_id: String,
    pub field: String,
    pub objective_type: ObjectiveType,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub target_value: Option<f64>,
    pub tolerance: f64,       // 容差内不计偏差
    pub penalty_weight: f64,  // 罚分权重
    pub penalty_form: PenaltyForm,
    pub hard_constraint: bool, // 硬约束: 违反即判定不合规
}

// ==========================================
// FlowNetwork - 流向网络
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNetwork {
    pub network_id: String,
    pub nodes: Vec<FlowNode>,
    pub arcs: Vec<FlowArc>,
    pub objectives: Vec<ArcQualityObjective>,
}

impl FlowNetwork {
    /// 查找节点
    pub fn node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// 某节点的启用出弧 (按输入顺序)
    pub fn arcs_from(&self, node_id: &str) -> Vec<&FlowArc> {
        self.arcs
            .iter()
            .filter(|a| a.enabled && a.from_node == node_id)
            .collect()
    }

    /// 构建请求级目标索引: arc_id -> 该弧的质量目标集
    ///
    /// 索引随单次路由调用创建并传递, 不跨调用缓存
    pub fn objective_index(&self) -> ObjectiveIndex<'_> {
        let mut by_arc: HashMap<&str, Vec<&ArcQualityObjective>> = HashMap::new();
        for obj in &self.objectives {
            by_arc.entry(obj.arc_id.as_str()).or_default().push(obj);
        }
        ObjectiveIndex { by_arc }
    }
}

// ==========================================
// ObjectiveIndex - 请求级目标索引
// ==========================================
#[derive(Debug)]
pub struct ObjectiveIndex<'a> {
    by_arc: HashMap<&'a str, Vec<&'a ArcQualityObjective>>,
}

impl<'a> ObjectiveIndex<'a> {
    /// 某弧的质量目标 (无目标时返回空切片)
    pub fn for_arc(&self, arc_id: &str) -> &[&'a ArcQualityObjective] {
        self.by_arc.get(arc_id).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

// ==========================================
// Allocation - 路由分配
// ==========================================
// 一个料包可拆分为 0..N 条分配 (LP 路径) 或整体落空 (贪心路径)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub parcel_id: String,
    pub from_node: String,
    pub to_node: String,
    pub arc_id: String,
    pub tonnes: f64,
    pub quality: QualityVector,
    pub cost: f64,
    pub benefit: f64,
    pub penalty_cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(arc_id: &str, from: &str, to: &str, materials: &[&str]) -> FlowArc {
        FlowArc {
            arc_id: arc_id.to_string(),
            from_node: from.to_string(),
            to_node: to.to_string(),
            allowed_material_types: materials.iter().map(|m| m.to_string()).collect(),
            capacity_t_per_period: None,
            cost_per_tonne: 0.0,
            benefit_per_tonne: 0.0,
            priority: 0,
            enabled: true,
        }
    }

    #[test]
    fn test_accepts_material() {
        let open = arc("A1", "N1", "N2", &[]);
        assert!(open.accepts_material("ORE_HG"));

        let restricted = arc("A2", "N1", "N3", &["ORE_HG", "ORE_LG"]);
        assert!(restricted.accepts_material("ORE_LG"));
        assert!(!restricted.accepts_material("WASTE"));
    }

    #[test]
    fn test_arcs_from_skips_disabled() {
        let mut a1 = arc("A1", "N1", "N2", &[]);
        a1.enabled = false;
        let a2 = arc("A2", "N1", "N3", &[]);
        let network = FlowNetwork {
            network_id: "NET1".to_string(),
            nodes: vec![],
            arcs: vec![a1, a2],
            objectives: vec![],
        };
        let out = network.arcs_from("N1");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].arc_id, "A2");
    }
}
