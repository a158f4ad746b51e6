//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AGIL__*` 覆盖（双下划线表示嵌套，如 `AGIL__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub exchange: ExchangeSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// [app] 段：应用名、CSV 数据目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// clientes.csv / score_limite.csv / solicitacoes_aumento_limite.csv 所在目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock；无对应 API Key 时回退到 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次分类 / 生成请求超时（秒），超时按分类失败处理
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// [exchange] 段：汇率接口地址、超时、报价货币
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSection {
    #[serde(default = "default_exchange_base_url")]
    pub base_url: String,
    #[serde(default = "default_exchange_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            base_url: default_exchange_base_url(),
            timeout_secs: default_exchange_timeout_secs(),
            quote_currency: default_quote_currency(),
        }
    }
}

fn default_exchange_base_url() -> String {
    "https://economia.awesomeapi.com.br".to_string()
}

fn default_exchange_timeout_secs() -> u64 {
    5
}

fn default_quote_currency() -> String {
    "BRL".to_string()
}

/// [session] 段：会话空闲过期、清理周期、单轮最大步数
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// 空闲超过该秒数的会话视为过期（get 时不可见，清理时移除）
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// 单轮内编排器最多执行的步骤数，防止自环
    #[serde(default = "default_max_steps_per_turn")]
    pub max_steps_per_turn: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            max_steps_per_turn: default_max_steps_per_turn(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_max_steps_per_turn() -> usize {
    8
}

/// [server] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// 从 config 目录加载配置，环境变量 AGIL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AGIL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AGIL")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载配置，失败时记录警告并使用默认值
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.exchange.timeout_secs, 5);
        assert_eq!(cfg.session.max_steps_per_turn, 8);
        assert_eq!(cfg.app.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"mock\"\n\n[session]\nidle_timeout_secs = 10"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.session.idle_timeout_secs, 10);
        assert_eq!(cfg.session.cleanup_interval_secs, 60);
        assert_eq!(cfg.exchange.base_url, "https://economia.awesomeapi.com.br");
    }
}
