//! 银行数据层：客户存储、评分策略表、提额流程
//!
//! 客户记录预先存在，本系统只做查询与两类更新（额度、评分）；提额申请日志只追加。

pub mod csv_store;
pub mod limits;
pub mod memory_store;
pub mod policy;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use csv_store::CsvCustomerStore;
pub use limits::{LimitDecision, LimitError, LimitService};
pub use memory_store::InMemoryCustomerStore;
pub use policy::{ScoreRule, ScoringPolicy, ScoringTable};

/// 客户记录（列名与 clientes.csv 一致）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "cpf")]
    pub tax_id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "data_nascimento")]
    pub birth_date: NaiveDate,
    #[serde(rename = "limite_atual")]
    pub current_limit: f64,
    pub score: u32,
}

/// 提额申请结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncreaseOutcome {
    #[serde(rename = "aprovado")]
    Approved,
    #[serde(rename = "rejeitado")]
    Rejected,
}

/// 提额申请日志条目（只追加，不修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncreaseRequest {
    #[serde(rename = "cpf_cliente")]
    pub customer_id: String,
    #[serde(rename = "data_hora_solicitacao")]
    pub requested_at: DateTime<Local>,
    #[serde(rename = "limite_atual")]
    pub prior_limit: f64,
    #[serde(rename = "novo_limite_solicitado")]
    pub requested_limit: f64,
    #[serde(rename = "status_pedido")]
    pub outcome: IncreaseOutcome,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// 客户存储接口
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn lookup_by_id(&self, tax_id: &str) -> Result<Option<Customer>, StoreError>;

    async fn lookup_by_id_and_birthdate(
        &self,
        tax_id: &str,
        birth_date: NaiveDate,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .lookup_by_id(tax_id)
            .await?
            .filter(|customer| customer.birth_date == birth_date))
    }

    /// 客户不存在时返回 false
    async fn update_limit(&self, tax_id: &str, limit: f64) -> Result<bool, StoreError>;

    /// 客户不存在时返回 false
    async fn update_score(&self, tax_id: &str, score: u32) -> Result<bool, StoreError>;

    async fn append_increase_request(&self, record: &IncreaseRequest) -> Result<(), StoreError>;
}

/// 去掉 CPF 中的 `.`、`-` 与空白
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '.' | '-') && !c.is_whitespace())
        .collect()
}
