// =============================================================================
// Binance USDⓈ-M Futures REST Client — public market-data endpoints only
// =============================================================================
//
// Live order placement and account/balance reconciliation are explicit
// spec non-goals for this simulator, so unlike the teacher's spot client
// this one carries no request signing — every endpoint it calls is public.
// It exists solely to satisfy the `MarketData` capability: contract listing,
// candle backfill, and (optionally) funding rate.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::market_data::{Candle, Contract, MarketData};

/// Binance futures REST client. No API key/secret — every call here is a
/// public endpoint. `limiter` tracks the `X-MBX-*` weight headers on every
/// response so the screener's inter-batch delay (§5's back-pressure policy)
/// has a real budget to check against instead of a fixed sleep alone.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    limiter: Arc<RateLimitTracker>,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("BinanceClient initialised (base_url=https://fapi.binance.com)");

        Self {
            base_url: "https://fapi.binance.com".to_string(),
            client,
            limiter: Arc::new(RateLimitTracker::new()),
        }
    }

    /// Current request-weight / order-count budget, as last reported by the
    /// exchange's response headers.
    pub fn rate_limit_snapshot(&self) -> crate::binance::rate_limit::RateLimitSnapshot {
        self.limiter.snapshot()
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /fapi/v1/klines.
    ///
    /// Array indices: [0] openTime, [1] open, [2] high, [3] low, [4] close,
    /// [5] volume, [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades,
    /// [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /fapi/v1/klines request failed")?;

        self.limiter.update_from_headers(resp.headers());
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /fapi/v1/klines returned {}: {}", status, body);
        }

        let raw = body.as_array().context("klines response is not an array")?;
        let mut candles = Vec::with_capacity(raw.len());

        for entry in raw {
            let arr = entry.as_array().context("kline entry is not an array")?;
            if arr.len() < 11 {
                warn!("skipping malformed kline entry with {} elements", arr.len());
                continue;
            }

            let open_time = arr[0].as_i64().unwrap_or(0);
            let open = Self::parse_str_f64(&arr[1])?;
            let high = Self::parse_str_f64(&arr[2])?;
            let low = Self::parse_str_f64(&arr[3])?;
            let close = Self::parse_str_f64(&arr[4])?;
            let volume = Self::parse_str_f64(&arr[5])?;
            let close_time = arr[6].as_i64().unwrap_or(0);

            candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
        }

        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /fapi/v1/exchangeInfo + GET /fapi/v1/ticker/24hr, joined by symbol
    /// to produce the contract list with turnover figures `listContracts`
    /// needs.
    #[instrument(skip(self), name = "binance::list_contracts")]
    async fn get_contracts(&self) -> Result<Vec<Contract>> {
        let info_url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let info_resp = self
            .client
            .get(&info_url)
            .send()
            .await
            .context("GET /fapi/v1/exchangeInfo request failed")?;
        self.limiter.update_from_headers(info_resp.headers());
        let info: serde_json::Value = info_resp.json().await.context("failed to parse exchangeInfo response")?;

        let ticker_url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let ticker_resp = self
            .client
            .get(&ticker_url)
            .send()
            .await
            .context("GET /fapi/v1/ticker/24hr request failed")?;
        self.limiter.update_from_headers(ticker_resp.headers());
        let tickers: serde_json::Value = ticker_resp.json().await.context("failed to parse ticker/24hr response")?;

        let mut turnover_by_symbol = std::collections::HashMap::new();
        if let Some(arr) = tickers.as_array() {
            for t in arr {
                if let Some(symbol) = t["symbol"].as_str() {
                    let quote_volume: f64 = t["quoteVolume"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    let volume: f64 = t["volume"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    turnover_by_symbol.insert(symbol.to_string(), (quote_volume, volume));
                }
            }
        }

        let symbols = info["symbols"].as_array().context("exchangeInfo missing 'symbols'")?;
        let mut contracts = Vec::with_capacity(symbols.len());

        for entry in symbols {
            let symbol = match entry["symbol"].as_str() {
                Some(s) => s.to_string(),
                None => continue,
            };
            let contract_type = entry["contractType"].as_str().unwrap_or("");
            // Only linear perpetuals belong in the universe.
            if contract_type != "PERPETUAL" {
                continue;
            }
            let (turnover_24h, volume_24h) = turnover_by_symbol.get(&symbol).copied().unwrap_or((0.0, 0.0));

            let mut tick_size = 0.0;
            let mut lot_size = 0.0;
            if let Some(filters) = entry["filters"].as_array() {
                for filter in filters {
                    match filter["filterType"].as_str() {
                        Some("PRICE_FILTER") => {
                            tick_size = filter["tickSize"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                        }
                        Some("LOT_SIZE") => {
                            lot_size = filter["stepSize"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                        }
                        _ => {}
                    }
                }
            }

            contracts.push(Contract {
                symbol,
                is_quanto: entry["quoteAsset"].as_str() != Some("USDT"),
                turnover_24h,
                volume_24h,
                tick_size,
                lot_size,
                multiplier: 1.0,
                max_leverage: 20.0,
            });
        }

        debug!(count = contracts.len(), "contracts listed");
        Ok(contracts)
    }

    /// GET /fapi/v1/premiumIndex.
    #[instrument(skip(self), name = "binance::get_funding_rate")]
    async fn get_funding_rate(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/fapi/v1/premiumIndex?symbol={}", self.base_url, symbol);
        let resp = self.client.get(&url).send().await.context("GET /fapi/v1/premiumIndex request failed")?;
        self.limiter.update_from_headers(resp.headers());
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: serde_json::Value = resp.json().await.context("failed to parse premiumIndex response")?;
        Ok(body["lastFundingRate"].as_str().and_then(|s| s.parse().ok()))
    }

    fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
        if let Some(s) = val.as_str() {
            s.parse::<f64>().with_context(|| format!("failed to parse '{s}' as f64"))
        } else if let Some(n) = val.as_f64() {
            Ok(n)
        } else {
            anyhow::bail!("expected string or number, got: {val}")
        }
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn list_contracts(&self) -> Result<Vec<Contract>> {
        self.get_contracts().await
    }

    async fn fetch_candles(&self, symbol: &str, granularity_minutes: u32, limit: u32) -> Result<Vec<Candle>> {
        let interval = match granularity_minutes {
            1 => "1m",
            5 => "5m",
            15 => "15m",
            30 => "30m",
            60 => "1h",
            _ => "30m",
        };
        self.get_klines(symbol, interval, limit).await
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Option<f64>> {
        self.get_funding_rate(symbol).await
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient").field("base_url", &self.base_url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_str_f64_accepts_string_and_number() {
        assert_eq!(BinanceClient::parse_str_f64(&serde_json::json!("1.5")).unwrap(), 1.5);
        assert_eq!(BinanceClient::parse_str_f64(&serde_json::json!(2.5)).unwrap(), 2.5);
        assert!(BinanceClient::parse_str_f64(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn default_client_targets_futures_base_url() {
        let client = BinanceClient::new();
        assert_eq!(client.base_url, "https://fapi.binance.com");
    }
}
