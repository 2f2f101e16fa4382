//! Off-chain spot price oracle used to mark open positions

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::prelude::*;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::{
    errors::{BotError, BotResult},
    gateway::retry::{RetryConfig, retry_with_backoff},
};

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current spot price for a symbol like "ETHUSDC".
    async fn spot_price(&self, symbol: &str) -> BotResult<Decimal>;
}

/// REST ticker oracle (Binance-compatible endpoint shape).
pub struct HttpPriceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceOracle {
    pub fn new(base_url: impl Into<String>) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| BotError::Network {
                message: "Failed to build HTTP client".to_string(),
                source: Some(e.into()),
                retry_count: 0,
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn spot_price(&self, symbol: &str) -> BotResult<Decimal> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);

        let operation = || async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .context("HTTP request failed")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("⚠️ Price API returned error status {}: {}", status, body);
                return Err(anyhow::anyhow!("Price API error: {} - {}", status, body));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .context("Failed to parse JSON response")?;

            let price_str = json["price"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'price' field in response"))?;

            let price = Decimal::from_str(price_str).context("Failed to parse price string")?;

            Ok(price)
        };

        let price = retry_with_backoff(
            operation,
            &RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 200,
                ..Default::default()
            },
            &format!("spot price fetch for {symbol}"),
        )
        .await?;

        if price <= Decimal::ZERO {
            warn!("⚠️ Invalid price received for {}: {}", symbol, price);
            return Err(BotError::PriceValidation {
                price,
                reason: format!("{symbol} price is zero or negative"),
            });
        }

        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn parses_ticker_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v3/ticker/price?symbol=ETHUSDC")
            .with_status(200)
            .with_body(r#"{"symbol":"ETHUSDC","price":"3050.42"}"#)
            .create_async()
            .await;

        let oracle = HttpPriceOracle::new(server.url()).unwrap();
        let price = oracle.spot_price("ETHUSDC").await.unwrap();
        assert_eq!(price, dec!(3050.42));
    }

    #[tokio::test]
    async fn rejects_non_positive_price() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v3/ticker/price?symbol=ETHUSDC")
            .with_status(200)
            .with_body(r#"{"symbol":"ETHUSDC","price":"0"}"#)
            .create_async()
            .await;

        let oracle = HttpPriceOracle::new(server.url()).unwrap();
        let result = oracle.spot_price("ETHUSDC").await;
        assert!(matches!(result, Err(BotError::PriceValidation { .. })));
    }

    #[tokio::test]
    async fn surfaces_missing_price_field() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v3/ticker/price?symbol=ETHUSDC")
            .with_status(200)
            .with_body(r#"{"symbol":"ETHUSDC"}"#)
            .create_async()
            .await;

        let oracle = HttpPriceOracle::new(server.url()).unwrap();
        let result = oracle.spot_price("ETHUSDC").await;
        assert!(matches!(result, Err(BotError::Network { .. })));
    }
}
