use super::util::{build_client, decimal_rates, parse_api_date};
use crate::core::currency::{RateSource, RateTable};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct HostResponse {
    #[serde(default)]
    success: bool,
    /// Unknown symbols come back as `null`.
    #[serde(default)]
    rates: HashMap<String, Option<f64>>,
    date: Option<String>,
}

/// Secondary source: `GET {base_url}?base={base}&symbols={codes}`.
pub struct ExchangeRateHostSource {
    base_url: String,
    client: reqwest::Client,
}

impl ExchangeRateHostSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl RateSource for ExchangeRateHostSource {
    fn name(&self) -> &str {
        "exchangerate.host"
    }

    #[instrument(name = "ExchangeRateHostFetch", skip(self), fields(base = %base))]
    async fn fetch_table(&self, base: &str, symbols: &[String]) -> Result<RateTable> {
        let url = format!(
            "{}?base={}&symbols={}",
            self.base_url,
            base,
            symbols.join(",")
        );
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
        let data: HostResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", base, e))?;

        if !data.success {
            return Err(anyhow!("Rate source reported failure for base: {}", base));
        }

        let known: HashMap<String, f64> = data
            .rates
            .into_iter()
            .filter_map(|(code, rate)| rate.map(|rate| (code, rate)))
            .collect();

        Ok(RateTable {
            base: base.to_string(),
            rates: decimal_rates(known)?,
            as_of: data.date.as_deref().map(parse_api_date).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(symbols: &str, template: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "CNY"))
            .and(query_param("symbols", symbols))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn source(server: &MockServer) -> ExchangeRateHostSource {
        ExchangeRateHostSource::new(&format!("{}/latest", server.uri()), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_table_fetch() {
        let mock_response = r#"{
            "success": true,
            "base": "CNY",
            "date": "2025-03-04",
            "rates": { "USD": 0.25, "EUR": 0.2 }
        }"#;
        let server = create_mock_server(
            "USD,EUR",
            ResponseTemplate::new(200).set_body_string(mock_response),
        )
        .await;

        let symbols = vec!["USD".to_string(), "EUR".to_string()];
        let table = source(&server).fetch_table("CNY", &symbols).await.unwrap();
        assert_eq!(table.rates.get("USD"), Some(&dec!(0.25)));
        assert_eq!(table.rates.get("EUR"), Some(&dec!(0.2)));
        assert_eq!(table.as_of, NaiveDate::from_ymd_opt(2025, 3, 4));
    }

    #[tokio::test]
    async fn test_missing_date_is_none() {
        let mock_response = r#"{ "success": true, "rates": { "USD": 0.25 } }"#;
        let server = create_mock_server(
            "USD",
            ResponseTemplate::new(200).set_body_string(mock_response),
        )
        .await;

        let table = source(&server)
            .fetch_table("CNY", &["USD".to_string()])
            .await
            .unwrap();
        assert!(table.as_of.is_none());
    }

    #[tokio::test]
    async fn test_null_rates_are_skipped() {
        let mock_response = r#"{
            "success": true,
            "date": "2025-03-04",
            "rates": { "USD": 0.125, "XYZ": null }
        }"#;
        let server = create_mock_server(
            "USD,XYZ",
            ResponseTemplate::new(200).set_body_string(mock_response),
        )
        .await;

        let symbols = vec!["USD".to_string(), "XYZ".to_string()];
        let table = source(&server).fetch_table("CNY", &symbols).await.unwrap();
        assert_eq!(table.rates.get("USD"), Some(&dec!(0.125)));
        assert!(!table.rates.contains_key("XYZ"));
    }

    #[tokio::test]
    async fn test_unsuccessful_payload_is_an_error() {
        let mock_response = r#"{
            "success": false,
            "error": { "code": 101, "type": "missing_access_key" }
        }"#;
        let server = create_mock_server(
            "USD",
            ResponseTemplate::new(200).set_body_string(mock_response),
        )
        .await;

        let result = source(&server).fetch_table("CNY", &["USD".to_string()]).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Rate source reported failure for base: CNY"
        );
    }
}
