//! CSV 客户存储
//!
//! 每次查询都重新读取 clientes.csv（允许外部修改数据文件）；额度 / 评分更新先写临时文件再整体替换。
//! 申请日志以追加方式写入，文件不存在或为空时先写表头。
//! 文件读写全部走 tokio::fs，CSV 编解码只在内存缓冲上进行；所有文件操作在同一把异步锁内串行执行。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{normalize_tax_id, Customer, CustomerStore, IncreaseRequest, StoreError};

pub const CUSTOMERS_FILE: &str = "clientes.csv";
pub const SCORE_RULES_FILE: &str = "score_limite.csv";
pub const INCREASE_REQUESTS_FILE: &str = "solicitacoes_aumento_limite.csv";

pub struct CsvCustomerStore {
    customers_path: PathBuf,
    requests_path: PathBuf,
    lock: Mutex<()>,
}

/// 把序列化好的记录写入内存缓冲
fn encode<T: serde::Serialize>(rows: &[T], with_header: bool) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

impl CsvCustomerStore {
    pub fn new(customers_path: impl Into<PathBuf>, requests_path: impl Into<PathBuf>) -> Self {
        Self {
            customers_path: customers_path.into(),
            requests_path: requests_path.into(),
            lock: Mutex::new(()),
        }
    }

    /// 使用数据目录下的标准文件名
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self::new(dir.join(CUSTOMERS_FILE), dir.join(INCREASE_REQUESTS_FILE))
    }

    async fn read_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let bytes = fs::read(&self.customers_path).await?;
        let customers = csv::Reader::from_reader(bytes.as_slice())
            .deserialize()
            .collect::<Result<Vec<Customer>, csv::Error>>()?;
        Ok(customers)
    }

    async fn write_customers(&self, customers: &[Customer]) -> Result<(), StoreError> {
        let tmp = self.customers_path.with_extension("csv.tmp");
        fs::write(&tmp, encode(customers, true)?).await?;
        fs::rename(&tmp, &self.customers_path).await?;
        Ok(())
    }

    /// 读取、修改匹配客户、写回；未找到时不写文件
    async fn modify<F>(&self, tax_id: &str, mut update: F) -> Result<bool, StoreError>
    where
        F: FnMut(&mut Customer) + Send,
    {
        let _guard = self.lock.lock().await;
        let wanted = normalize_tax_id(tax_id);
        let mut customers = self.read_customers().await?;
        let mut found = false;
        for customer in customers
            .iter_mut()
            .filter(|c| normalize_tax_id(&c.tax_id) == wanted)
        {
            update(customer);
            found = true;
        }
        if found {
            self.write_customers(&customers).await?;
        }
        Ok(found)
    }
}

#[async_trait]
impl CustomerStore for CsvCustomerStore {
    async fn lookup_by_id(&self, tax_id: &str) -> Result<Option<Customer>, StoreError> {
        let _guard = self.lock.lock().await;
        let wanted = normalize_tax_id(tax_id);
        Ok(self
            .read_customers()
            .await?
            .into_iter()
            .find(|c| normalize_tax_id(&c.tax_id) == wanted))
    }

    async fn update_limit(&self, tax_id: &str, limit: f64) -> Result<bool, StoreError> {
        self.modify(tax_id, |c| c.current_limit = limit).await
    }

    async fn update_score(&self, tax_id: &str, score: u32) -> Result<bool, StoreError> {
        self.modify(tax_id, |c| c.score = score).await
    }

    async fn append_increase_request(&self, record: &IncreaseRequest) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let needs_header = fs::metadata(&self.requests_path)
            .await
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let row = encode(std::slice::from_ref(record), needs_header)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.requests_path)
            .await?;
        file.write_all(&row).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::IncreaseOutcome;
    use chrono::{Local, NaiveDate};

    fn seeded_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CUSTOMERS_FILE),
            "cpf,nome,data_nascimento,limite_atual,score\n\
             12345678901,Ana Souza,1990-05-10,2500.0,620\n\
             98765432100,Bruno Lima,1985-11-23,1000.0,310\n",
        )
        .unwrap();
        dir
    }

    fn request(outcome: IncreaseOutcome) -> IncreaseRequest {
        IncreaseRequest {
            customer_id: "12345678901".to_string(),
            requested_at: Local::now(),
            prior_limit: 2500.0,
            requested_limit: 4000.0,
            outcome,
        }
    }

    #[tokio::test]
    async fn test_lookup_normalizes_tax_id() {
        let dir = seeded_dir();
        let store = CsvCustomerStore::in_dir(dir.path());

        let customer = store.lookup_by_id("123.456.789-01").await.unwrap().unwrap();
        assert_eq!(customer.name, "Ana Souza");
        assert_eq!(customer.score, 620);
    }

    #[tokio::test]
    async fn test_lookup_with_birthdate() {
        let dir = seeded_dir();
        let store = CsvCustomerStore::in_dir(dir.path());
        let right = NaiveDate::from_ymd_opt(1990, 5, 10).unwrap();
        let wrong = NaiveDate::from_ymd_opt(1990, 5, 11).unwrap();

        assert!(store
            .lookup_by_id_and_birthdate("12345678901", right)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .lookup_by_id_and_birthdate("12345678901", wrong)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_updates_rewrite_file() {
        let dir = seeded_dir();
        let store = CsvCustomerStore::in_dir(dir.path());

        assert!(store.update_limit("12345678901", 4000.0).await.unwrap());
        assert!(store.update_score("12345678901", 700).await.unwrap());
        assert!(!store.update_score("00000000000", 700).await.unwrap());

        let customer = store.lookup_by_id("12345678901").await.unwrap().unwrap();
        assert_eq!(customer.current_limit, 4000.0);
        assert_eq!(customer.score, 700);
        let other = store.lookup_by_id("98765432100").await.unwrap().unwrap();
        assert_eq!(other.current_limit, 1000.0);
    }

    #[tokio::test]
    async fn test_request_log_writes_header_once() {
        let dir = seeded_dir();
        let store = CsvCustomerStore::in_dir(dir.path());

        store.append_increase_request(&request(IncreaseOutcome::Approved)).await.unwrap();
        store.append_increase_request(&request(IncreaseOutcome::Rejected)).await.unwrap();

        let log = std::fs::read_to_string(dir.path().join(INCREASE_REQUESTS_FILE)).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("cpf_cliente,data_hora_solicitacao"));
        assert!(lines[1].ends_with("aprovado"));
        assert!(lines[2].ends_with("rejeitado"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_and_appends_are_not_lost() {
        let dir = seeded_dir();
        let store = std::sync::Arc::new(CsvCustomerStore::in_dir(dir.path()));

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.update_score("98765432100", 300 + i).await.unwrap();
                    store
                        .append_increase_request(&request(IncreaseOutcome::Rejected))
                        .await
                        .unwrap();
                    store.lookup_by_id("12345678901").await.unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        let log = std::fs::read_to_string(dir.path().join(INCREASE_REQUESTS_FILE)).unwrap();
        assert_eq!(log.lines().count(), 9);
        let bruno = store.lookup_by_id("98765432100").await.unwrap().unwrap();
        assert!((300..308).contains(&bruno.score));
        // 文件整体替换，另一位客户的数据保持不变
        let ana = store.lookup_by_id("12345678901").await.unwrap().unwrap();
        assert_eq!(ana.current_limit, 2500.0);
    }
}
