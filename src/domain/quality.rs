// ==========================================
// 矿山生产排程系统 - 质量向量
// ==========================================
// 用途: 物料批次/混合物的命名数值属性 (如发热量、灰分%)
// 约束: 字段集由配置层提供的字段注册表校验
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// QualityVector - 质量向量
// ==========================================
// BTreeMap 保证字段遍历顺序确定 (结果可复现)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityVector(BTreeMap<String, f64>);

impl QualityVector {
    /// 创建空质量向量
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// 读取字段值
    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    /// 写入字段值
    pub fn set(&mut self, field: impl Into<String>, value: f64) {
        self.0.insert(field.into(), value);
    }

    /// 字段遍历 (确定顺序)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    /// 字段名列表
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, f64)> for QualityVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, f64); N]> for QualityVector {
    fn from(pairs: [(&str, f64); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

// ==========================================
// QualityFieldRegistry - 质量字段注册表
// ==========================================
// 由上游配置层提供, 校验质量向量字段合法性
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityFieldRegistry {
    fields: Vec<String>,
}

impl QualityFieldRegistry {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// 字段是否已注册
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// 校验质量向量, 返回未注册的字段名
    pub fn unknown_fields(&self, quality: &QualityVector) -> Vec<String> {
        quality
            .fields()
            .filter(|f| !self.contains(f))
            .cloned()
            .collect()
    }
}
