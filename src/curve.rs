// src/curve.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::units::{self, UnitsError};

/// Initial virtual quote reserve (USDT) of a launchpad market.
pub const DEFAULT_VIRTUAL_QUOTE_RESERVE: f64 = 6_000.0;
/// Initial virtual base reserve (project token) of a launchpad market.
pub const DEFAULT_VIRTUAL_BASE_RESERVE: f64 = 1_073_000_191.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("curve parameters must be finite and strictly positive")]
    InvalidConfig,
    #[error("trade amount must be finite and strictly positive")]
    InvalidAmount,
    #[error("market state does not yield positive finite reserves")]
    DegenerateMarketState,
    #[error("trade would drain the virtual reserve")]
    ExceedsPool,
}

/// Immutable constants of a market:
/// - virtual_quote_reserve: initial virtual amount of the quote asset
/// - virtual_base_reserve: initial virtual amount of the base asset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    pub virtual_quote_reserve: f64, // x0
    pub virtual_base_reserve: f64,  // y0
}

impl CurveParameters {
    pub fn new(virtual_quote_reserve: f64, virtual_base_reserve: f64) -> Result<Self, CurveError> {
        let params = Self {
            virtual_quote_reserve,
            virtual_base_reserve,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), CurveError> {
        if !is_positive(self.virtual_quote_reserve)
            || !is_positive(self.virtual_base_reserve)
            || !is_positive(self.invariant_k())
        {
            return Err(CurveError::InvalidConfig);
        }
        Ok(())
    }

    /// k = x0 * y0, fixed for the lifetime of the market.
    #[inline]
    pub fn invariant_k(&self) -> f64 {
        self.virtual_quote_reserve * self.virtual_base_reserve
    }
}

impl Default for CurveParameters {
    fn default() -> Self {
        Self {
            virtual_quote_reserve: DEFAULT_VIRTUAL_QUOTE_RESERVE,
            virtual_base_reserve: DEFAULT_VIRTUAL_BASE_RESERVE,
        }
    }
}

/// Server-side snapshot of a market, in natural units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub cumulative_quote_raised: f64,
}

impl MarketState {
    pub fn new(cumulative_quote_raised: f64) -> Self {
        Self {
            cumulative_quote_raised,
        }
    }

    /// Build from the fixed-point string the token API returns.
    pub fn from_wei(raised: &str, decimals: u32) -> Result<Self, UnitsError> {
        Ok(Self::new(units::wei_to_units(raised, decimals)?))
    }

    pub fn is_valid(&self) -> bool {
        self.cumulative_quote_raised.is_finite() && self.cumulative_quote_raised >= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    /// Sell base tokens, receive the quote asset.
    BaseToQuote,
    /// Spend the quote asset, receive base tokens.
    QuoteToBase,
}

impl TradeDirection {
    pub fn flip(self) -> Self {
        match self {
            TradeDirection::BaseToQuote => TradeDirection::QuoteToBase,
            TradeDirection::QuoteToBase => TradeDirection::BaseToQuote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub direction: TradeDirection,
    pub input_amount: f64,
}

impl TradeRequest {
    pub fn sell(token_amount: f64) -> Self {
        Self {
            direction: TradeDirection::BaseToQuote,
            input_amount: token_amount,
        }
    }

    pub fn buy(quote_amount: f64) -> Self {
        Self {
            direction: TradeDirection::QuoteToBase,
            input_amount: quote_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeQuote {
    pub output_amount: f64,
    pub spot_price_quote_per_base: f64,
}

impl TradeQuote {
    /// The "no usable quote yet" value.
    pub fn none() -> Self {
        Self::default()
    }

    /// True when there is nothing to receive. This also covers a valid trade
    /// too small to move the reserve; use `Quoter::try_quote` to tell the two
    /// apart.
    pub fn is_none(&self) -> bool {
        self.output_amount == 0.0
    }
}

/// Virtual reserves of the curve at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSnapshot {
    pub virtual_quote: f64, // x
    pub virtual_base: f64,  // y
    pub invariant_k: f64,   // k = x * y
}

impl CurveSnapshot {
    /// Marginal price of one base unit, in quote units (x / y).
    #[inline]
    pub fn spot_price(&self) -> f64 {
        self.virtual_quote / self.virtual_base
    }
}

/// Constant-product quoter over virtual reserves.
///
/// Invariant: X * Y = k
/// Where:
///   - X = virtual_quote_reserve + cumulative_quote_raised
///   - Y = k / X
///
/// Reserves are re-derived from `k` on every call and never carried over
/// between quotes.
#[derive(Debug, Clone, Copy)]
pub struct Quoter {
    params: CurveParameters,
    state: MarketState,
}

impl Quoter {
    pub fn new(params: CurveParameters, state: MarketState) -> Self {
        Self { params, state }
    }

    pub fn params(&self) -> &CurveParameters {
        &self.params
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    /// Current virtual reserves (X, Y) derived from the raised amount.
    pub fn snapshot(&self) -> Result<CurveSnapshot, CurveError> {
        if !self.state.is_valid() {
            return Err(CurveError::DegenerateMarketState);
        }
        let k = self.params.invariant_k();
        let virtual_quote = self.params.virtual_quote_reserve + self.state.cumulative_quote_raised;
        let virtual_base = k / virtual_quote;

        let snap = CurveSnapshot {
            virtual_quote,
            virtual_base,
            invariant_k: k,
        };
        if !is_positive(k)
            || !is_positive(virtual_quote)
            || !is_positive(virtual_base)
            || !is_positive(snap.spot_price())
        {
            return Err(CurveError::DegenerateMarketState);
        }
        Ok(snap)
    }

    /// Sell `token_amount` base units for the quote asset.
    pub fn try_quote_base_to_quote(&self, token_amount: f64) -> Result<TradeQuote, CurveError> {
        check_amount(token_amount)?;
        let snap = self.snapshot()?;

        // Y' = Y + dy, X' = k / Y'
        let new_base = snap.virtual_base + token_amount;
        if !is_positive(new_base) {
            return Err(CurveError::InvalidAmount);
        }
        let new_quote = snap.invariant_k / new_base;

        let out = settle_output(snap.virtual_quote - new_quote, snap.virtual_quote)?;
        Ok(TradeQuote {
            output_amount: out,
            spot_price_quote_per_base: snap.spot_price(),
        })
    }

    /// Spend `quote_amount` of the quote asset on base units.
    pub fn try_quote_quote_to_base(&self, quote_amount: f64) -> Result<TradeQuote, CurveError> {
        check_amount(quote_amount)?;
        let snap = self.snapshot()?;

        // X' = X + dx, Y' = k / X'
        let new_quote = snap.virtual_quote + quote_amount;
        let new_base = snap.invariant_k / new_quote;

        let out = settle_output(snap.virtual_base - new_base, snap.virtual_base)?;
        Ok(TradeQuote {
            output_amount: out,
            spot_price_quote_per_base: snap.spot_price(),
        })
    }

    pub fn try_quote(&self, request: &TradeRequest) -> Result<TradeQuote, CurveError> {
        match request.direction {
            TradeDirection::BaseToQuote => self.try_quote_base_to_quote(request.input_amount),
            TradeDirection::QuoteToBase => self.try_quote_quote_to_base(request.input_amount),
        }
    }

    pub fn quote_base_to_quote(&self, token_amount: f64) -> TradeQuote {
        self.quote(&TradeRequest::sell(token_amount))
    }

    pub fn quote_quote_to_base(&self, quote_amount: f64) -> TradeQuote {
        self.quote(&TradeRequest::buy(quote_amount))
    }

    /// Infallible form for interactive callers: anything unusable becomes a
    /// zero output instead of an error.
    pub fn quote(&self, request: &TradeRequest) -> TradeQuote {
        match self.try_quote(request) {
            Ok(quote) => {
                trace!(
                    direction = ?request.direction,
                    input = request.input_amount,
                    output = quote.output_amount,
                    "quoted trade"
                );
                quote
            }
            Err(err @ (CurveError::InvalidAmount | CurveError::ExceedsPool)) => {
                trace!(%err, input = request.input_amount, "input not quotable");
                TradeQuote {
                    output_amount: 0.0,
                    spot_price_quote_per_base: self.spot_price(),
                }
            }
            Err(err) => {
                debug!(
                    %err,
                    raised = self.state.cumulative_quote_raised,
                    "no quote for market state"
                );
                TradeQuote::none()
            }
        }
    }

    /// Instantaneous price of one base unit in quote units; 0.0 when the
    /// market state is degenerate.
    pub fn spot_price(&self) -> f64 {
        self.snapshot()
            .map(|snap| snap.spot_price())
            .ok()
            .filter(|price| is_positive(*price))
            .unwrap_or(0.0)
    }

    /// Reserves after the trade were applied. The quoter itself is not
    /// mutated.
    pub fn simulate(&self, request: &TradeRequest) -> Result<CurveSnapshot, CurveError> {
        check_amount(request.input_amount)?;
        let snap = self.snapshot()?;

        let (virtual_quote, virtual_base) = match request.direction {
            TradeDirection::BaseToQuote => {
                let base = snap.virtual_base + request.input_amount;
                (snap.invariant_k / base, base)
            }
            TradeDirection::QuoteToBase => {
                let quote = snap.virtual_quote + request.input_amount;
                (quote, snap.invariant_k / quote)
            }
        };
        if !is_positive(virtual_quote) || !is_positive(virtual_base) {
            return Err(CurveError::ExceedsPool);
        }
        Ok(CurveSnapshot {
            virtual_quote,
            virtual_base,
            invariant_k: snap.invariant_k,
        })
    }

    /// Relative gap between the spot price and the price the trade actually
    /// executes at, in [0, 1). 0.0 when there is no quote.
    pub fn price_impact(&self, request: &TradeRequest) -> f64 {
        let Ok(quote) = self.try_quote(request) else {
            return 0.0;
        };
        let spot = quote.spot_price_quote_per_base;
        if !is_positive(spot) || !is_positive(quote.output_amount) {
            return 0.0;
        }

        // Effective execution price, quote per base.
        let impact = match request.direction {
            TradeDirection::QuoteToBase => {
                let exec = request.input_amount / quote.output_amount;
                1.0 - spot / exec
            }
            TradeDirection::BaseToQuote => {
                let exec = quote.output_amount / request.input_amount;
                1.0 - exec / spot
            }
        };
        if impact.is_finite() {
            impact.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Fully diluted value at the current spot price: price * total_supply.
    pub fn market_cap(&self, total_supply: f64) -> f64 {
        if !is_positive(total_supply) {
            return 0.0;
        }
        let mc = self.spot_price() * total_supply;
        if mc.is_finite() {
            mc
        } else {
            0.0
        }
    }
}

#[inline]
fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn check_amount(amount: f64) -> Result<(), CurveError> {
    if is_positive(amount) {
        Ok(())
    } else {
        Err(CurveError::InvalidAmount)
    }
}

// 0 <= out < reserve. A trade below one ulp of the reserve can land a few
// rounding steps under zero; that is a zero output, not a bad market.
fn settle_output(out: f64, reserve: f64) -> Result<f64, CurveError> {
    if !out.is_finite() {
        return Err(CurveError::DegenerateMarketState);
    }
    let out = if out < 0.0 && out >= -4.0 * f64::EPSILON * reserve {
        0.0
    } else {
        out
    };
    if out < 0.0 {
        return Err(CurveError::DegenerateMarketState);
    }
    if out >= reserve {
        return Err(CurveError::ExceedsPool);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn launch_quoter(raised: f64) -> Quoter {
        Quoter::new(CurveParameters::default(), MarketState::new(raised))
    }

    fn assert_close(a: f64, b: f64, rel: f64) {
        let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
        assert!(((a - b) / scale).abs() <= rel, "{a} vs {b}");
    }

    #[test]
    fn default_parameters_match_launchpad_curve() {
        let params = CurveParameters::default();
        assert_eq!(params.invariant_k(), 6_438_001_146_000.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(
            CurveParameters::new(0.0, 1.0).unwrap_err(),
            CurveError::InvalidConfig
        );
        assert_eq!(
            CurveParameters::new(1.0, f64::NAN).unwrap_err(),
            CurveError::InvalidConfig
        );
        assert_eq!(
            CurveParameters::new(1e200, 1e200).unwrap_err(),
            CurveError::InvalidConfig
        );
        assert_eq!(
            CurveParameters::new(-6000.0, 1.0).unwrap_err(),
            CurveError::InvalidConfig
        );
    }

    #[test]
    fn snapshot_at_launch() {
        let snap = launch_quoter(0.0).snapshot().unwrap();
        assert_eq!(snap.virtual_quote, 6_000.0);
        assert_eq!(snap.virtual_base, 1_073_000_191.0);
        assert_close(snap.spot_price(), 6_000.0 / 1_073_000_191.0, 1e-15);
    }

    #[test]
    fn buy_matches_formula_exactly() {
        let quoter = launch_quoter(0.0);
        let quote = quoter.try_quote_quote_to_base(100.0).unwrap();

        let k = 6_000.0_f64 * 1_073_000_191.0;
        let expected = k / 6_000.0 - k / 6_100.0;
        assert_eq!(quote.output_amount, expected);
        assert_close(quote.output_amount, 17_590_167.065_573_8, 1e-12);
        assert_close(quote.spot_price_quote_per_base, 5.591_797_699_875_712e-6, 1e-12);
    }

    #[test]
    fn sell_pays_out_quote_asset() {
        let quoter = launch_quoter(1_000.0);
        let quote = quoter.try_quote_base_to_quote(500_000.0).unwrap();
        assert_close(quote.output_amount, 3.803_461_249_9, 1e-9);
        assert!(quote.output_amount < 7_000.0);
    }

    #[test]
    fn invalid_amounts_yield_no_quote() {
        let quoter = launch_quoter(0.0);
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                quoter.try_quote_base_to_quote(amount).unwrap_err(),
                CurveError::InvalidAmount
            );
            let quote = quoter.quote_base_to_quote(amount);
            assert!(quote.is_none());
            assert!(quote.spot_price_quote_per_base > 0.0);

            let quote = quoter.quote_quote_to_base(amount);
            assert!(quote.is_none());
            assert!(quote.output_amount.is_finite());
        }
    }

    #[test]
    fn degenerate_state_yields_zero_quote() {
        for raised in [-1.0, f64::NAN, f64::INFINITY] {
            let quoter = launch_quoter(raised);
            assert_eq!(
                quoter.snapshot().unwrap_err(),
                CurveError::DegenerateMarketState
            );
            assert_eq!(quoter.quote_quote_to_base(100.0), TradeQuote::none());
            assert_eq!(quoter.quote_base_to_quote(100.0), TradeQuote::none());
            assert_eq!(quoter.spot_price(), 0.0);
            assert_eq!(quoter.market_cap(1e9), 0.0);
        }
    }

    #[test]
    fn draining_sell_is_rejected() {
        let quoter = launch_quoter(0.0);
        assert_eq!(
            quoter.try_quote_base_to_quote(1e300).unwrap_err(),
            CurveError::ExceedsPool
        );
        let quote = quoter.quote_base_to_quote(1e300);
        assert!(quote.is_none());
        assert_eq!(quote.spot_price_quote_per_base, quoter.spot_price());
    }

    #[test]
    fn sub_ulp_trades_quote_zero_on_healthy_market() {
        for i in 0..2_000 {
            let raised = 0.37 + i as f64 * 13.731;
            let quoter = launch_quoter(raised);
            let spot = quoter.spot_price();
            assert!(spot > 0.0);

            for amount in [1e-9, 1e-12] {
                for request in [TradeRequest::sell(amount), TradeRequest::buy(amount)] {
                    let quote = quoter
                        .try_quote(&request)
                        .unwrap_or_else(|e| panic!("raised {raised}, {request:?}: {e}"));
                    assert!(quote.output_amount >= 0.0);
                    assert_eq!(quote.spot_price_quote_per_base, spot);
                    assert_eq!(quoter.quote(&request).spot_price_quote_per_base, spot);
                }
            }
        }
    }

    #[test]
    fn trade_too_small_to_move_reserve_reads_as_none() {
        let quoter = launch_quoter(0.0);
        let quote = quoter.try_quote_base_to_quote(1e-12).unwrap();
        assert_eq!(quote.output_amount, 0.0);
        assert!(quote.is_none());
        assert_eq!(quote.spot_price_quote_per_base, quoter.spot_price());
        assert!(quoter.spot_price() > 0.0);
    }

    #[test]
    fn settle_output_clamps_rounding_only() {
        assert_eq!(settle_output(-1e-12, 7_000.0), Ok(0.0));
        assert_eq!(
            settle_output(-1.0, 7_000.0),
            Err(CurveError::DegenerateMarketState)
        );
        assert_eq!(
            settle_output(f64::NAN, 7_000.0),
            Err(CurveError::DegenerateMarketState)
        );
        assert_eq!(settle_output(7_000.0, 7_000.0), Err(CurveError::ExceedsPool));
        assert_eq!(settle_output(3.5, 7_000.0), Ok(3.5));
    }

    #[test]
    fn simulate_moves_price_in_trade_direction() {
        let quoter = launch_quoter(1_000.0);
        let before = quoter.spot_price();

        let after_sell = quoter.simulate(&TradeRequest::sell(500_000.0)).unwrap();
        assert!(after_sell.spot_price() < before);

        let after_buy = quoter.simulate(&TradeRequest::buy(50.0)).unwrap();
        assert!(after_buy.spot_price() > before);
        assert_close(
            after_buy.virtual_quote * after_buy.virtual_base,
            after_buy.invariant_k,
            1e-12,
        );
    }

    #[test]
    fn simulate_does_not_mutate_quoter() {
        let quoter = launch_quoter(250.0);
        let first = quoter.quote_quote_to_base(10.0);
        quoter.simulate(&TradeRequest::buy(1_000.0)).unwrap();
        assert_eq!(quoter.quote_quote_to_base(10.0), first);
    }

    #[test]
    fn price_impact_grows_with_size() {
        let quoter = launch_quoter(0.0);
        let small = quoter.price_impact(&TradeRequest::buy(10.0));
        let large = quoter.price_impact(&TradeRequest::buy(1_000.0));
        assert!(small > 0.0 && small < large && large < 1.0);
        // Closed form for buys: dx / (X + dx).
        assert_close(large, 1_000.0 / 7_000.0, 1e-9);

        let sell = quoter.price_impact(&TradeRequest::sell(1e8));
        assert_close(sell, 1e8 / (1_073_000_191.0 + 1e8), 1e-9);

        assert_eq!(quoter.price_impact(&TradeRequest::buy(0.0)), 0.0);
    }

    #[test]
    fn market_cap_uses_spot_price() {
        let quoter = launch_quoter(0.0);
        assert_close(quoter.market_cap(1e9), quoter.spot_price() * 1e9, 1e-15);
        assert_eq!(quoter.market_cap(-5.0), 0.0);
    }

    #[test]
    fn market_state_from_wei() {
        let state = MarketState::from_wei("1000000000000000000000", 18).unwrap();
        assert_eq!(state.cumulative_quote_raised, 1_000.0);
        assert!(MarketState::from_wei("12ab", 18).is_err());
    }

    #[test]
    fn direction_flips() {
        assert_eq!(
            TradeDirection::BaseToQuote.flip(),
            TradeDirection::QuoteToBase
        );
        assert_eq!(
            TradeDirection::QuoteToBase.flip(),
            TradeDirection::BaseToQuote
        );
    }

    #[test]
    #[traced_test]
    fn degenerate_quote_is_logged() {
        launch_quoter(-10.0).quote_quote_to_base(1.0);
        assert!(logs_contain("no quote for market state"));
    }
}
