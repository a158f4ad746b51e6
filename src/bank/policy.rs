//! 评分策略表：有序的 (评分区间 -> 最高可批额度) 规则

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::StoreError;

/// 单条规则（列名与 score_limite.csv 一致）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    #[serde(rename = "score_min")]
    pub min_score: u32,
    #[serde(rename = "score_max")]
    pub max_score: u32,
    #[serde(rename = "limite_max")]
    pub max_limit: f64,
}

impl ScoreRule {
    pub fn contains(&self, score: u32) -> bool {
        self.min_score <= score && score <= self.max_score
    }
}

pub trait ScoringPolicy: Send + Sync {
    /// 返回包含该评分的第一条规则；无规则命中时为 None
    fn rule_for_score(&self, score: u32) -> Option<ScoreRule>;
}

/// 内存中的规则表，保持加载顺序
#[derive(Debug, Clone, Default)]
pub struct ScoringTable {
    rules: Vec<ScoreRule>,
}

impl ScoringTable {
    pub fn new(rules: Vec<ScoreRule>) -> Self {
        Self { rules }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let rules = reader
            .deserialize()
            .collect::<Result<Vec<ScoreRule>, csv::Error>>()?;
        tracing::info!("Loaded {} scoring rules from {:?}", rules.len(), path.as_ref());
        Ok(Self { rules })
    }
}

impl ScoringPolicy for ScoringTable {
    fn rule_for_score(&self, score: u32) -> Option<ScoreRule> {
        self.rules.iter().copied().find(|rule| rule.contains(score))
    }
}
