//! 无头运行时组装
//!
//! 供控制台与 HTTP 前端共用：按配置创建 LLM 分类器、CSV 客户存储、评分策略表与汇率来源，
//! 再组装五个步骤处理器、编排器与会话运行时。

use std::sync::Arc;

use crate::agents::{standard_handlers, Services};
use crate::bank::csv_store::SCORE_RULES_FILE;
use crate::bank::{CsvCustomerStore, CustomerStore, LimitService, ScoringTable, StoreError};
use crate::classifier::{Classifier, LlmClassifier};
use crate::config::{AppConfig, SessionSection};
use crate::core::{Orchestrator, RecoveryEngine};
use crate::gateway::{ChatRuntime, MemorySessionStore};
use crate::llm::create_llm_from_config;
use crate::tools::AwesomeApiRateSource;

/// 按配置创建处理器依赖；评分策略表读取失败时返回错误
pub fn create_services(cfg: &AppConfig) -> Result<Services, StoreError> {
    let llm = create_llm_from_config(cfg);
    let classifier = LlmClassifier::new(llm);
    tracing::info!("Classifier backed by {}", classifier.backend());
    let classifier: Arc<dyn Classifier> = Arc::new(classifier);

    let data_dir = &cfg.app.data_dir;
    tracing::info!("Using data directory {:?}", data_dir);
    let customers: Arc<dyn CustomerStore> = Arc::new(CsvCustomerStore::in_dir(data_dir));
    let policy = Arc::new(ScoringTable::from_csv(data_dir.join(SCORE_RULES_FILE))?);
    let limits = LimitService::new(customers.clone(), policy);
    let rates = Arc::new(AwesomeApiRateSource::from_config(&cfg.exchange));

    Ok(Services {
        classifier,
        customers,
        limits,
        rates,
    })
}

/// 用给定依赖组装会话运行时
pub fn create_runtime_with(services: &Services, session: &SessionSection) -> ChatRuntime {
    let orchestrator = Orchestrator::new(
        standard_handlers(services),
        RecoveryEngine::new(services.classifier.clone()),
        session.max_steps_per_turn,
    );
    let sessions = Arc::new(MemorySessionStore::new(session.idle_timeout_secs));
    ChatRuntime::new(orchestrator, sessions)
}

pub fn create_runtime(cfg: &AppConfig) -> Result<ChatRuntime, StoreError> {
    let services = create_services(cfg)?;
    Ok(create_runtime_with(&services, &cfg.session))
}
