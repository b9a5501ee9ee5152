// src/lib.rs

//! Swap quotes for launchpad tokens priced on a constant-product bonding
//! curve with virtual reserves (`x * y = k`).
//!
//! `curve` is the pure math, `units` converts the API's fixed-point strings,
//! `store` keeps the latest market snapshots for the UI, and `wasm` exposes
//! the quoter to the browser.

pub mod config;
mod curve;
pub mod store;
pub mod units;
mod wasm;

pub use crate::config::{ConfigError, QuoterConfig};
pub use crate::curve::{
    CurveError, CurveParameters, CurveSnapshot, MarketState, Quoter, TradeDirection, TradeQuote,
    TradeRequest, DEFAULT_VIRTUAL_BASE_RESERVE, DEFAULT_VIRTUAL_QUOTE_RESERVE,
};
pub use crate::store::{MarketEvent, MarketStore, RefreshError, Subscription};
pub use crate::units::{UnitsError, U256};
pub use crate::wasm::{WasmDirection, WasmQuote, WasmQuoter};
