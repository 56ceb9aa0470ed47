//! bsqindex-price: BSQ reference price from recent market trades.

pub mod poller;
pub mod source;

pub use poller::{median, reference_price, PricePoller};
pub use source::{HttpTradeSource, Trade, TradeSource};
