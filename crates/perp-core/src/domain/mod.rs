//! 거래소 중립적인 도메인 모델.

mod calculations;
mod contract;
mod market_data;
mod order;
mod position;

pub use calculations::*;
pub use contract::*;
pub use market_data::*;
pub use order::*;
pub use position::*;
