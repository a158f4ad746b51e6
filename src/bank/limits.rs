//! 提额流程
//!
//! 每次调用都恰好追加一条申请日志，无论结果如何；批准时把客户额度改为申请值。

use std::sync::Arc;

use chrono::Local;
use thiserror::Error;

use super::{CustomerStore, IncreaseOutcome, IncreaseRequest, ScoringPolicy, StoreError};
use crate::observability::mask_tax_id;

#[derive(Error, Debug)]
pub enum LimitError {
    #[error("requested limit must be positive, got {0}")]
    InvalidAmount(f64),

    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 提额结果
#[derive(Debug, Clone, PartialEq)]
pub struct LimitDecision {
    pub outcome: IncreaseOutcome,
    pub score: u32,
    /// 评分规则给出的上限；无规则命中时为 None（此时必为拒绝）
    pub max_allowed: Option<f64>,
    pub requested: f64,
}

impl LimitDecision {
    pub fn approved(&self) -> bool {
        self.outcome == IncreaseOutcome::Approved
    }
}

/// 额度相关操作，组合客户存储与评分策略
#[derive(Clone)]
pub struct LimitService {
    customers: Arc<dyn CustomerStore>,
    policy: Arc<dyn ScoringPolicy>,
}

impl LimitService {
    pub fn new(customers: Arc<dyn CustomerStore>, policy: Arc<dyn ScoringPolicy>) -> Self {
        Self { customers, policy }
    }

    pub async fn current_limit(&self, tax_id: &str) -> Result<f64, LimitError> {
        self.customers
            .lookup_by_id(tax_id)
            .await?
            .map(|customer| customer.current_limit)
            .ok_or_else(|| LimitError::CustomerNotFound(mask_tax_id(tax_id)))
    }

    pub async fn request_increase(
        &self,
        tax_id: &str,
        requested: f64,
    ) -> Result<LimitDecision, LimitError> {
        if !requested.is_finite() || requested <= 0.0 {
            return Err(LimitError::InvalidAmount(requested));
        }

        let customer = self
            .customers
            .lookup_by_id(tax_id)
            .await?
            .ok_or_else(|| LimitError::CustomerNotFound(mask_tax_id(tax_id)))?;

        let max_allowed = self
            .policy
            .rule_for_score(customer.score)
            .map(|rule| rule.max_limit);
        let outcome = match max_allowed {
            Some(max) if requested <= max => IncreaseOutcome::Approved,
            _ => IncreaseOutcome::Rejected,
        };

        self.customers
            .append_increase_request(&IncreaseRequest {
                customer_id: customer.tax_id.clone(),
                requested_at: Local::now(),
                prior_limit: customer.current_limit,
                requested_limit: requested,
                outcome,
            })
            .await?;

        if outcome == IncreaseOutcome::Approved
            && !self.customers.update_limit(&customer.tax_id, requested).await?
        {
            tracing::warn!(
                "Approved increase for {} but the customer record was gone",
                mask_tax_id(&customer.tax_id)
            );
        }

        tracing::info!(
            customer = %mask_tax_id(&customer.tax_id),
            score = customer.score,
            requested,
            ?max_allowed,
            ?outcome,
            "Limit increase decided"
        );

        Ok(LimitDecision {
            outcome,
            score: customer.score,
            max_allowed,
            requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Customer, InMemoryCustomerStore, ScoreRule, ScoringTable};
    use chrono::NaiveDate;

    fn ana(score: u32) -> Customer {
        Customer {
            tax_id: "12345678901".to_string(),
            name: "Ana Souza".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            current_limit: 2500.0,
            score,
        }
    }

    fn service(score: u32) -> (Arc<InMemoryCustomerStore>, LimitService) {
        let store = Arc::new(InMemoryCustomerStore::with_customers([ana(score)]));
        let table = ScoringTable::new(vec![
            ScoreRule { min_score: 0, max_score: 499, max_limit: 1000.0 },
            ScoreRule { min_score: 500, max_score: 799, max_limit: 5000.0 },
        ]);
        let service = LimitService::new(store.clone(), Arc::new(table));
        (store, service)
    }

    #[tokio::test]
    async fn test_approval_updates_limit_and_logs() {
        let (store, service) = service(620);

        let decision = service.request_increase("12345678901", 4000.0).await.unwrap();
        assert!(decision.approved());
        assert_eq!(decision.max_allowed, Some(5000.0));
        assert_eq!(service.current_limit("12345678901").await.unwrap(), 4000.0);

        let log = store.requests();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].prior_limit, 2500.0);
        assert_eq!(log[0].outcome, IncreaseOutcome::Approved);
    }

    #[tokio::test]
    async fn test_rejection_keeps_limit_and_logs() {
        let (store, service) = service(310);

        let decision = service.request_increase("12345678901", 4000.0).await.unwrap();
        assert!(!decision.approved());
        assert_eq!(decision.score, 310);
        assert_eq!(decision.max_allowed, Some(1000.0));
        assert_eq!(service.current_limit("12345678901").await.unwrap(), 2500.0);
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rule_miss_rejects_without_max() {
        let (store, service) = service(950);

        let decision = service.request_increase("12345678901", 100.0).await.unwrap();
        assert_eq!(decision.outcome, IncreaseOutcome::Rejected);
        assert_eq!(decision.max_allowed, None);
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_every_request_appends_exactly_one_record() {
        let (store, service) = service(620);
        for (i, amount) in [100.0, 9000.0, 5000.0, 5000.01].into_iter().enumerate() {
            service.request_increase("12345678901", amount).await.unwrap();
            assert_eq!(store.requests().len(), i + 1);
        }
    }

    #[tokio::test]
    async fn test_invalid_amount_and_unknown_customer() {
        let (store, service) = service(620);

        assert!(matches!(
            service.request_increase("12345678901", 0.0).await,
            Err(LimitError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.request_increase("00000000000", 10.0).await,
            Err(LimitError::CustomerNotFound(_))
        ));
        assert!(store.requests().is_empty());
    }
}
