//! 거래소 커넥터 구현.

pub mod binance_futures;

pub use binance_futures::*;
