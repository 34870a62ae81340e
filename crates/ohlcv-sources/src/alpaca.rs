//! Alpaca market data source.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use ohlcv_config::AlpacaConfig;
use ohlcv_core::{Bar, BarRequest, BarSeries, DataError, LiveQuotes, SourceConnector, Timeframe};
use ohlcv_transform::PostProcessPipeline;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::timestamps::to_local;

/// Connections Alpaca tolerates per API key before throttling.
const MAX_CONCURRENCY: usize = 5;

/// API key pair.
#[derive(Debug, Clone)]
pub struct AlpacaCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl AlpacaCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read the key pair from the environment variables named in `config`.
    pub fn from_env(config: &AlpacaConfig) -> Result<Self, DataError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| DataError::Connection(format!("{} not set", config.api_key_env)))?;
        let api_secret = std::env::var(&config.api_secret_env)
            .map_err(|_| DataError::Connection(format!("{} not set", config.api_secret_env)))?;
        Ok(Self::new(api_key, api_secret))
    }
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct BarsPage {
    #[serde(default)]
    bars: Option<Vec<AlpacaBar>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaTrade {
    t: String,
    p: f64,
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: AlpacaTrade,
}

/// Alpaca API `timeframe` parameter for `timeframe`.
pub fn timeframe_param(timeframe: Timeframe) -> Result<String, DataError> {
    match timeframe {
        Timeframe::Minutes(n) if n < 60 => Ok(format!("{}Min", n)),
        Timeframe::Minutes(n) if n % 60 == 0 && n / 60 < 24 => Ok(format!("{}Hour", n / 60)),
        Timeframe::Days(1) => Ok("1Day".to_string()),
        Timeframe::Week => Ok("1Week".to_string()),
        Timeframe::Month => Ok("1Month".to_string()),
        other => Err(DataError::InvalidTimeframe(format!(
            "{} is not available from Alpaca",
            other
        ))),
    }
}

fn parse_time(raw: &str, tz: Tz) -> Result<NaiveDateTime, DataError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| to_local(dt.with_timezone(&Utc), tz))
        .map_err(|e| DataError::Parse(format!("{}: {}", raw, e)))
}

/// Daily and coarser bars are labelled at local midnight.
fn label(timestamp: NaiveDateTime, timeframe: Timeframe) -> NaiveDateTime {
    if timeframe.is_intraday() {
        timestamp
    } else {
        timestamp.date().and_hms_opt(0, 0, 0).unwrap_or(timestamp)
    }
}

fn parse_bars(bars: &[AlpacaBar], timeframe: Timeframe, tz: Tz) -> Result<Vec<Bar>, DataError> {
    bars.iter()
        .map(|b| {
            let ts = label(parse_time(&b.t, tz)?, timeframe);
            Ok(Bar::new(ts, b.o, b.h, b.l, b.c, b.v))
        })
        .collect()
}

/// Append a quote row for `trade` unless its date is already present.
fn with_quote(mut series: BarSeries, trade: &AlpacaTrade, tz: Tz) -> Result<BarSeries, DataError> {
    let ts = parse_time(&trade.t, tz)?;
    if series.contains_date(ts.date()) {
        debug!("Quote for {} already in series", ts.date());
        return Ok(series);
    }
    let ts = label(ts, series.timeframe);
    if !series.push(Bar::quote(ts, trade.p)) {
        debug!("Quote at {} is not after the last bar", ts);
    }
    Ok(series)
}

/// Historical bars and latest trades from the Alpaca data API.
pub struct AlpacaSource {
    client: Client,
    data_url: String,
    feed: String,
    quotes: bool,
    page_limit: u32,
    tz: Tz,
    pipeline: PostProcessPipeline,
}

impl AlpacaSource {
    /// Create a new Alpaca data client.
    pub fn new(
        credentials: AlpacaCredentials,
        config: &AlpacaConfig,
        tz: Tz,
        pipeline: PostProcessPipeline,
    ) -> Result<Self, DataError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(&credentials.api_key)
                .map_err(|e| DataError::Connection(e.to_string()))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(&credentials.api_secret)
                .map_err(|e| DataError::Connection(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            data_url: config.data_url.trim_end_matches('/').to_string(),
            feed: config.feed.clone(),
            quotes: config.quotes,
            page_limit: config.page_limit,
            tz,
            pipeline,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, DataError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| DataError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DataError::Api(format!("{}: {}", status, text)));
        }

        resp.json().await.map_err(|e| DataError::Api(e.to_string()))
    }

    /// All raw bars for `request`, following pagination.
    pub async fn get_bars(&self, request: &BarRequest) -> Result<BarSeries, DataError> {
        let url = format!("{}/v2/stocks/{}/bars", self.data_url, request.symbol);
        let mut base = vec![
            ("timeframe", timeframe_param(request.timeframe)?),
            ("feed", self.feed.clone()),
            ("limit", self.page_limit.to_string()),
            ("adjustment", "raw".to_string()),
        ];
        if let Some(start) = request.start {
            base.push(("start", start.to_string()));
        }
        if let Some(end) = request.end {
            base.push(("end", end.to_string()));
        }

        let mut bars = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut params = base.clone();
            if let Some(t) = token.take() {
                params.push(("page_token", t));
            }

            let page: BarsPage = self.get(&url, &params).await?;
            let chunk = page.bars.unwrap_or_default();
            debug!("{}: page with {} bars", request.symbol, chunk.len());
            bars.extend(parse_bars(&chunk, request.timeframe, self.tz)?);

            match page.next_page_token {
                Some(t) if !t.is_empty() => token = Some(t),
                _ => break,
            }
        }

        Ok(BarSeries::new(request.timeframe, bars))
    }

    async fn latest_trade(&self, symbol: &str) -> Result<AlpacaTrade, DataError> {
        let url = format!("{}/v2/stocks/{}/trades/latest", self.data_url, symbol);
        let resp: LatestTradeResponse = self.get(&url, &[("feed", self.feed.clone())]).await?;
        Ok(resp.trade)
    }
}

#[async_trait]
impl LiveQuotes for AlpacaSource {
    async fn append_live_quote(
        &self,
        series: BarSeries,
        symbol: &str,
    ) -> Result<BarSeries, DataError> {
        if !self.quotes {
            return Ok(series);
        }
        let trade = self.latest_trade(symbol).await?;
        with_quote(series, &trade, self.tz)
    }
}

#[async_trait]
impl SourceConnector for AlpacaSource {
    async fn fetch(&self, request: &BarRequest) -> Result<BarSeries, DataError> {
        let raw = self.get_bars(request).await?;
        info!("Alpaca {}, {} rows", request.symbol, raw.len());

        if raw.is_empty() && request.graceful {
            return Ok(BarSeries::empty(request.transform).with_symbol(&request.symbol));
        }

        self.pipeline.run(raw, request, self).await
    }

    fn max_concurrency(&self) -> Option<usize> {
        Some(MAX_CONCURRENCY)
    }

    fn name(&self) -> &str {
        "alpaca"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const NY: Tz = chrono_tz::America::New_York;

    #[test]
    fn test_timeframe_param() {
        assert_eq!(timeframe_param(Timeframe::Minutes(5)).unwrap(), "5Min");
        assert_eq!(timeframe_param(Timeframe::Minutes(60)).unwrap(), "1Hour");
        assert_eq!(timeframe_param(Timeframe::Minutes(240)).unwrap(), "4Hour");
        assert_eq!(timeframe_param(Timeframe::DAY).unwrap(), "1Day");
        assert_eq!(timeframe_param(Timeframe::Month).unwrap(), "1Month");
        assert!(timeframe_param(Timeframe::Days(3)).is_err());
        assert!(timeframe_param(Timeframe::Minutes(90)).is_err());
    }

    #[test]
    fn test_parse_bars_page() {
        let body = r#"{
            "bars": [
                {"t": "2024-01-02T05:00:00Z", "o": 472.16, "h": 473.67, "l": 470.49, "c": 472.65, "v": 123007793, "n": 1, "vw": 472.1},
                {"t": "2024-01-03T05:00:00Z", "o": 470.43, "h": 471.19, "l": 468.17, "c": 468.79, "v": 103585857, "n": 1, "vw": 469.5}
            ],
            "symbol": "SPY",
            "next_page_token": "U1BZfEQ="
        }"#;
        let page: BarsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("U1BZfEQ="));

        let bars = parse_bars(page.bars.as_deref().unwrap(), Timeframe::DAY, NY).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.to_string(), "2024-01-02 00:00:00");
        assert_eq!(bars[1].close, 468.79);
    }

    #[test]
    fn test_parse_intraday_keeps_time() {
        let body = r#"{"bars": [{"t": "2024-01-02T14:30:00Z", "o": 1, "h": 2, "l": 0.5, "c": 1.5, "v": 10}], "next_page_token": null}"#;
        let page: BarsPage = serde_json::from_str(body).unwrap();
        assert!(page.next_page_token.is_none());

        let bars = parse_bars(page.bars.as_deref().unwrap(), Timeframe::Minutes(5), NY).unwrap();
        assert_eq!(bars[0].timestamp.to_string(), "2024-01-02 09:30:00");
    }

    #[test]
    fn test_empty_page() {
        let page: BarsPage = serde_json::from_str(r#"{"bars": null, "next_page_token": null}"#).unwrap();
        assert!(page.bars.is_none());
    }

    fn daily(dates: &[&str]) -> BarSeries {
        BarSeries::new(
            Timeframe::DAY,
            dates
                .iter()
                .map(|d| {
                    let ts = NaiveDate::parse_from_str(d, "%Y-%m-%d")
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap();
                    Bar::new(ts, 1.0, 1.0, 1.0, 1.0, 1.0)
                })
                .collect(),
        )
    }

    #[test]
    fn test_quote_appended_once() {
        let body = r#"{"symbol": "SPY", "trade": {"t": "2024-01-04T18:15:02.5Z", "x": "V", "p": 467.3, "s": 100}}"#;
        let resp: LatestTradeResponse = serde_json::from_str(body).unwrap();

        let series = with_quote(daily(&["2024-01-02", "2024-01-03"]), &resp.trade, NY).unwrap();
        assert_eq!(series.len(), 3);
        let quote = series.last().unwrap();
        assert_eq!(quote.timestamp.to_string(), "2024-01-04 00:00:00");
        assert_eq!(quote.close, 467.3);
        assert!(quote.open.is_nan());

        // Same date already present
        let series = with_quote(series, &resp.trade, NY).unwrap();
        assert_eq!(series.len(), 3);
    }
}
