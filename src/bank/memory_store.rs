//! 内存客户存储（测试与离线演示用）

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::{normalize_tax_id, Customer, CustomerStore, IncreaseRequest, StoreError};

#[derive(Default)]
pub struct InMemoryCustomerStore {
    customers: RwLock<HashMap<String, Customer>>,
    requests: Mutex<Vec<IncreaseRequest>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let customers = customers
            .into_iter()
            .map(|c| (normalize_tax_id(&c.tax_id), c))
            .collect();
        Self {
            customers: RwLock::new(customers),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已追加的申请日志快照
    pub fn requests(&self) -> Vec<IncreaseRequest> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn update<F>(&self, tax_id: &str, update: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Customer),
    {
        let mut customers = self.customers.write().map_err(|_| StoreError::Poisoned)?;
        match customers.get_mut(&normalize_tax_id(tax_id)) {
            Some(customer) => {
                update(customer);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn lookup_by_id(&self, tax_id: &str) -> Result<Option<Customer>, StoreError> {
        let customers = self.customers.read().map_err(|_| StoreError::Poisoned)?;
        Ok(customers.get(&normalize_tax_id(tax_id)).cloned())
    }

    async fn update_limit(&self, tax_id: &str, limit: f64) -> Result<bool, StoreError> {
        self.update(tax_id, |c| c.current_limit = limit)
    }

    async fn update_score(&self, tax_id: &str, score: u32) -> Result<bool, StoreError> {
        self.update(tax_id, |c| c.score = score)
    }

    async fn append_increase_request(&self, record: &IncreaseRequest) -> Result<(), StoreError> {
        self.requests
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}
