// src/config.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::curve::{CurveError, CurveParameters};
use crate::units::QUOTE_DECIMALS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },

    #[error("invalid curve: {0}")]
    Curve(#[from] CurveError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoterConfig {
    /// Virtual reserves of the launchpad curve.
    pub curve: CurveParameters,

    /// Fixed-point scale of the raised amount the token API reports
    /// (`raised = wei / 10^quote_decimals`).
    pub quote_decimals: u32,

    /// Decimal places used when a quote is rendered for the swap form
    /// (`WasmQuoter::format`).
    pub display_decimals: usize,
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            curve: CurveParameters::default(),
            quote_decimals: QUOTE_DECIMALS,
            display_decimals: 6,
        }
    }
}

impl QuoterConfig {
    /// Missing fields fall back to the launchpad defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `CURVE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = parse_var(&lookup, "CURVE_VIRTUAL_QUOTE_RESERVE")? {
            cfg.curve.virtual_quote_reserve = v;
        }
        if let Some(v) = parse_var(&lookup, "CURVE_VIRTUAL_BASE_RESERVE")? {
            cfg.curve.virtual_base_reserve = v;
        }
        if let Some(v) = parse_var(&lookup, "CURVE_QUOTE_DECIMALS")? {
            cfg.quote_decimals = v;
        }
        if let Some(v) = parse_var(&lookup, "CURVE_DISPLAY_DECIMALS")? {
            cfg.display_decimals = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.curve.validate()?;
        if self.quote_decimals > 77 {
            return Err(ConfigError::InvalidVar {
                name: "quote_decimals",
                value: self.quote_decimals.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value: raw }),
    }
}
