use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::time::Duration;

/// Builds the HTTP client shared by the remote rate sources. `timeout`
/// bounds each request end to end.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("resval/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

pub fn parse_api_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Failed to parse date: {date_str}"))
}

pub fn date_from_unix(seconds: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

/// Converts the float rates of a JSON payload into decimals, keeping the
/// shortest decimal that round-trips each float.
pub fn decimal_rates(rates: HashMap<String, f64>) -> Result<HashMap<String, Decimal>> {
    rates
        .into_iter()
        .map(|(code, value)| {
            Decimal::from_f64(value)
                .map(|rate| (code.to_uppercase(), rate))
                .ok_or_else(|| anyhow!("Rate for {} is not a finite number: {}", code, value))
        })
        .collect()
}
