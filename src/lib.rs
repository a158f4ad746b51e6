//! Agil - 多步骤对话式银行助手
//!
//! 模块划分：
//! - **agent**: 无头运行时组装（供控制台 / HTTP 调用）
//! - **agents**: 五个步骤处理器（triage、credit、interview offer、interview、exchange）
//! - **bank**: 客户存储（CSV / 内存）、评分策略表、额度服务
//! - **classifier**: 结构化意图分类与抽取（LLM / Stub）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话状态、路由拓扑、编排器与故障恢复
//! - **gateway**: 会话存储与对话入口
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志初始化与脱敏
//! - **tools**: 汇率查询

pub mod agent;
pub mod agents;
pub mod bank;
pub mod classifier;
pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod tools;
