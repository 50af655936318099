//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

/// Where a resolved rate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    /// The requested currency is the local currency.
    Local,
    /// Supplied by the caller instead of looked up.
    Manual,
    Cache,
    Remote(String),
    Default,
}

impl Display for RateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateOrigin::Local => write!(f, "local"),
            RateOrigin::Manual => write!(f, "command line"),
            RateOrigin::Cache => write!(f, "cache"),
            RateOrigin::Remote(name) => write!(f, "{name}"),
            RateOrigin::Default => write!(f, "built-in default"),
        }
    }
}

/// Units of local currency per one unit of the requested currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuote {
    pub rate: Decimal,
    pub as_of: Option<NaiveDate>,
    pub origin: RateOrigin,
}

/// A table of rates quoted against `base`: one unit of `base` buys
/// `rates[code]` units of `code`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    pub base: String,
    pub rates: HashMap<String, Decimal>,
    pub as_of: Option<NaiveDate>,
}

/// One remote tier of the rate lookup chain.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches rates quoted against `base`. `symbols` lists the codes the
    /// caller is interested in; sources that always return the full table
    /// may ignore it.
    async fn fetch_table(&self, base: &str, symbols: &[String]) -> Result<RateTable>;
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Never fails: the worst case is a built-in default with no as-of date.
    async fn get_rate(&self, currency: &str, force_refresh: bool) -> RateQuote;

    /// Evicts one currency, or everything when `currency` is `None`.
    async fn clear_cache(&self, currency: Option<&str>);
}
