//! Weights provider abstraction

use crate::core::error::Result;
use crate::core::record::{Source, WeightRecord};
use async_trait::async_trait;

/// A source of consumption-basket weights in the canonical shape.
///
/// Fetches take `&mut self` because implementations own their cache.
#[async_trait]
pub trait WeightsProvider: Send {
    fn source(&self) -> Source;

    async fn fetch_weights(&mut self, countries: &[String]) -> Result<Vec<WeightRecord>>;
}
