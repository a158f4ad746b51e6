//! 外部工具：汇率查询

pub mod exchange_rate;

pub use exchange_rate::{
    AwesomeApiRateSource, CurrencyCode, ExchangeRateSource, RateError, StaticRateSource,
};
