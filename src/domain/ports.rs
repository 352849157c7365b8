//! `VendorClient` port (§4.1): the single seam through which the Data
//! Service talks to the upstream derivatives data vendor.

use crate::domain::errors::EngineError;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::venue::Venue;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct VendorRequest {
    pub venue: Venue,
    pub symbol: String,
    pub interval: Timeframe,
    pub limit: usize,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

/// Narrow interface returning chronologically sorted candle series. Every
/// method enforces retries, rate-limit backoff and 429 escalation itself —
/// callers never retry on its behalf. A "too many requests" condition
/// surfaces as `EngineError::RateLimit`, never as an empty series.
#[async_trait]
pub trait VendorClient: Send + Sync {
    async fn price(&self, request: VendorRequest) -> Result<Vec<Candle>, EngineError>;
    async fn open_interest(&self, request: VendorRequest) -> Result<Vec<Candle>, EngineError>;
    async fn funding(&self, request: VendorRequest) -> Result<Vec<Candle>, EngineError>;
    async fn taker_buy_sell_volume(&self, request: VendorRequest) -> Result<Vec<Candle>, EngineError>;
}
