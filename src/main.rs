//! Agil 控制台
//!
//! 入口：初始化日志与配置、组装会话运行时，从标准输入逐行读取客户消息。

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use agil::agent::create_runtime;
use agil::config::load_config_or_default;
use agil::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(None);
    let runtime = create_runtime(&cfg).context("Failed to load bank data")?;
    let session_id = format!("console_{}", uuid::Uuid::new_v4());
    tracing::info!("Console session {} started (LLM: {})", session_id, cfg.llm.provider);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout.write_all("Banco Ágil - digite sua mensagem (Ctrl+D para sair)\n> ".as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if !line.is_empty() {
            let reply = runtime.handle_message(&session_id, line).await;
            stdout.write_all(format!("\n{}\n", reply.response).as_bytes()).await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
