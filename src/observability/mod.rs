//! 可观测性：tracing 订阅器初始化与日志脱敏

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// 脱敏 CPF：仅保留最后 3 位，用于日志
pub fn mask_tax_id(tax_id: &str) -> String {
    let digits: Vec<char> = tax_id.chars().collect();
    if digits.len() <= 3 {
        return "***".to_string();
    }
    let tail: String = digits[digits.len() - 3..].iter().collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_tax_id() {
        assert_eq!(mask_tax_id("12345678901"), "***901");
        assert_eq!(mask_tax_id("12"), "***");
    }
}
