// src/wasm.rs

//! Browser bindings for the swap widget.
//!
//! ```typescript
//! import init, { WasmQuoter, WasmDirection } from 'vcurve-quote';
//!
//! await init();
//!
//! const quoter = WasmQuoter.withDefaults();
//! const quote = quoter.quote(token.usdtRaised, WasmDirection.Buy, input.value);
//! output.value = quote.isEmpty ? '' : quoter.format(quote);
//! ```
//!
//! Nothing here throws once the quoter exists: bad input or a bad snapshot
//! renders as an empty quote.

use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::config::QuoterConfig;
use crate::curve::{CurveParameters, MarketState, Quoter, TradeDirection, TradeRequest};
use crate::units;

#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmDirection {
    /// Spend USDT, receive tokens.
    Buy = 0,
    /// Sell tokens, receive USDT.
    Sell = 1,
}

impl From<WasmDirection> for TradeDirection {
    fn from(d: WasmDirection) -> Self {
        match d {
            WasmDirection::Buy => TradeDirection::QuoteToBase,
            WasmDirection::Sell => TradeDirection::BaseToQuote,
        }
    }
}

#[wasm_bindgen]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WasmQuote {
    output_amount: f64,
    spot_price: f64,
    price_impact: f64,
}

#[wasm_bindgen]
impl WasmQuote {
    #[wasm_bindgen(getter, js_name = outputAmount)]
    pub fn output_amount(&self) -> f64 {
        self.output_amount
    }

    #[wasm_bindgen(getter, js_name = spotPrice)]
    pub fn spot_price(&self) -> f64 {
        self.spot_price
    }

    /// Fraction in [0, 1).
    #[wasm_bindgen(getter, js_name = priceImpact)]
    pub fn price_impact(&self) -> f64 {
        self.price_impact
    }

    /// True when there is nothing to receive, including a trade too small to
    /// move the reserve.
    #[wasm_bindgen(getter, js_name = isEmpty)]
    pub fn is_empty(&self) -> bool {
        self.output_amount == 0.0
    }

    /// Output amount with a fixed number of decimals.
    pub fn display(&self, places: usize) -> String {
        units::to_fixed(self.output_amount, places)
    }
}

#[wasm_bindgen]
pub struct WasmQuoter {
    params: CurveParameters,
    quote_decimals: u32,
    display_decimals: usize,
}

#[wasm_bindgen]
impl WasmQuoter {
    #[wasm_bindgen(constructor)]
    pub fn new(virtual_quote_reserve: f64, virtual_base_reserve: f64) -> Result<WasmQuoter, JsError> {
        let params = CurveParameters::new(virtual_quote_reserve, virtual_base_reserve)
            .map_err(|e| JsError::new(&e.to_string()))?;
        let defaults = QuoterConfig::default();
        Ok(Self {
            params,
            quote_decimals: defaults.quote_decimals,
            display_decimals: defaults.display_decimals,
        })
    }

    /// Launchpad curve: 6000 USDT / 1,073,000,191 tokens virtual.
    #[wasm_bindgen(js_name = withDefaults)]
    pub fn with_defaults() -> WasmQuoter {
        Self::from_config(&QuoterConfig::default())
    }

    #[wasm_bindgen(getter, js_name = invariantK)]
    pub fn invariant_k(&self) -> f64 {
        self.params.invariant_k()
    }

    #[wasm_bindgen(getter, js_name = displayDecimals)]
    pub fn display_decimals(&self) -> usize {
        self.display_decimals
    }

    /// Output amount of `quote` at the configured number of decimals.
    pub fn format(&self, quote: &WasmQuote) -> String {
        quote.display(self.display_decimals)
    }

    #[wasm_bindgen(js_name = spotPrice)]
    pub fn spot_price(&self, raised_wei: &str) -> f64 {
        self.quoter(raised_wei)
            .map(|q| q.spot_price())
            .unwrap_or(0.0)
    }

    /// Quote straight from the form's text field.
    pub fn quote(&self, raised_wei: &str, direction: WasmDirection, input: &str) -> WasmQuote {
        match units::parse_amount(input) {
            Ok(amount) => self.quote_amount(raised_wei, direction, amount),
            Err(err) => {
                debug!(%err, "input not quotable yet");
                WasmQuote {
                    spot_price: self.spot_price(raised_wei),
                    ..WasmQuote::default()
                }
            }
        }
    }

    #[wasm_bindgen(js_name = quoteBuy)]
    pub fn quote_buy(&self, raised_wei: &str, usdt_amount: f64) -> WasmQuote {
        self.quote_amount(raised_wei, WasmDirection::Buy, usdt_amount)
    }

    #[wasm_bindgen(js_name = quoteSell)]
    pub fn quote_sell(&self, raised_wei: &str, token_amount: f64) -> WasmQuote {
        self.quote_amount(raised_wei, WasmDirection::Sell, token_amount)
    }

    #[wasm_bindgen(js_name = marketCap)]
    pub fn market_cap(&self, raised_wei: &str, total_supply: f64) -> f64 {
        self.quoter(raised_wei)
            .map(|q| q.market_cap(total_supply))
            .unwrap_or(0.0)
    }
}

impl WasmQuoter {
    pub fn from_config(cfg: &QuoterConfig) -> Self {
        Self {
            params: cfg.curve,
            quote_decimals: cfg.quote_decimals,
            display_decimals: cfg.display_decimals,
        }
    }

    fn quoter(&self, raised_wei: &str) -> Option<Quoter> {
        match MarketState::from_wei(raised_wei, self.quote_decimals) {
            Ok(state) => Some(Quoter::new(self.params, state)),
            Err(err) => {
                debug!(%err, raised_wei, "unusable raised amount");
                None
            }
        }
    }

    fn quote_amount(&self, raised_wei: &str, direction: WasmDirection, amount: f64) -> WasmQuote {
        let Some(quoter) = self.quoter(raised_wei) else {
            return WasmQuote::default();
        };
        let request = TradeRequest {
            direction: direction.into(),
            input_amount: amount,
        };
        let quote = quoter.quote(&request);
        WasmQuote {
            output_amount: quote.output_amount,
            spot_price: quote.spot_price_quote_per_base,
            price_impact: quoter.price_impact(&request),
        }
    }
}
