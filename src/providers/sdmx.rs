//! Response shape of the multinational statistics API.
//!
//! Only the parts the pipeline depends on are modelled: the time dimension's
//! label -> position index and the sparse position -> value map.

use crate::core::error::{AcquisitionError, Result};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct SdmxResponse {
    dimension: Option<SdmxDimensions>,
    value: Option<HashMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct SdmxDimensions {
    time: Option<SdmxDimension>,
}

#[derive(Debug, Deserialize)]
struct SdmxDimension {
    category: Option<SdmxCategory>,
}

#[derive(Debug, Deserialize)]
struct SdmxCategory {
    index: Option<HashMap<String, usize>>,
}

impl SdmxResponse {
    /// Resolves every time label to its value. Labels without a value are
    /// absent observations and are left out. Output is ordered by position.
    pub fn time_series(&self, endpoint: &str) -> Result<Vec<(String, f64)>> {
        let index = self
            .dimension
            .as_ref()
            .and_then(|d| d.time.as_ref())
            .and_then(|t| t.category.as_ref())
            .and_then(|c| c.index.as_ref())
            .ok_or_else(|| {
                AcquisitionError::unexpected(endpoint, "missing dimension.time.category.index")
            })?;
        let values = self
            .value
            .as_ref()
            .ok_or_else(|| AcquisitionError::unexpected(endpoint, "missing value"))?;

        let mut series: Vec<(usize, String, f64)> = index
            .iter()
            .filter_map(|(label, position)| {
                values
                    .get(&position.to_string())
                    .copied()
                    .flatten()
                    .map(|value| (*position, label.clone(), value))
            })
            .collect();
        series.sort_by_key(|(position, _, _)| *position);
        Ok(series
            .into_iter()
            .map(|(_, label, value)| (label, value))
            .collect())
    }
}
