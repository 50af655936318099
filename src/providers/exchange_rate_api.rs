use super::util::{build_client, date_from_unix, decimal_rates, parse_api_date};
use crate::core::currency::{RateSource, RateTable};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: HashMap<String, f64>,
    date: Option<String>,
    time_last_updated: Option<i64>,
}

/// Primary source: `GET {base_url}/{base}` returns the full table.
pub struct ExchangeRateApiSource {
    base_url: String,
    client: reqwest::Client,
}

impl ExchangeRateApiSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiSource {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    #[instrument(name = "ExchangeRateApiFetch", skip(self, _symbols), fields(base = %base))]
    async fn fetch_table(&self, base: &str, _symbols: &[String]) -> Result<RateTable> {
        let url = format!("{}/{}", self.base_url, base);
        debug!("Requesting rate table from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for base: {} URL: {}", e, base, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for base: {}",
                response.status(),
                base
            ));
        }

        let text = response
            .text()
            .await
            .context("Failed to get response text")?;
        let data: LatestResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", base, e))?;

        let as_of = match (&data.date, data.time_last_updated) {
            (Some(date), _) => Some(parse_api_date(date)?),
            (None, Some(ts)) => date_from_unix(ts),
            (None, None) => None,
        };

        Ok(RateTable {
            base: base.to_string(),
            rates: decimal_rates(data.rates)?,
            as_of,
        })
    }
}
