use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{PromoteError, Result};

// Fixed platform vocabulary for the emitted rows
pub const PRODUCT_LINE: &str = "Sponsored Products";
pub const OPERATION_CREATE: &str = "Create";
pub const STATE_ENABLED: &str = "enabled";
pub const TARGETING_MANUAL: &str = "MANUAL";
pub const EXACT_AD_GROUP: &str = "EXACT";
pub const MATCH_TYPE_EXACT: &str = "Exact";

/// A search term needs at least this many ordered units to be promoted.
pub const MIN_UNITS: f64 = 2.0;

const DEFAULT_TARGET_ACOS_PERCENT: f64 = 15.0;
const DEFAULT_AD_GROUP_BID: f64 = 2.00;
const DEFAULT_BIDDING_STRATEGY: &str = "Dynamic bids - down only";

/// Tunables for one promotion run. Every field has a default so a partial
/// JSON file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Target ACOS as a percentage in [0, 100].
    pub target_acos_percent: f64,
    /// Default bid written on every generated ad group.
    pub ad_group_default_bid: f64,
    pub bidding_strategy: String,
    /// Abort the whole run when a SKU group cannot be assigned a portfolio.
    pub strict_integrity: bool,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        PromotionConfig {
            target_acos_percent: DEFAULT_TARGET_ACOS_PERCENT,
            ad_group_default_bid: DEFAULT_AD_GROUP_BID,
            bidding_strategy: DEFAULT_BIDDING_STRATEGY.to_string(),
            strict_integrity: false,
        }
    }
}

impl PromotionConfig {
    /// Load a config from a JSON file. Unlike the defaults, a file that was
    /// asked for but cannot be read or parsed is an error.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PromoteError::io(path, e))?;
        let config: PromotionConfig = serde_json::from_str(&contents)?;
        tracing::debug!(path, "loaded promotion config");
        Ok(config)
    }

    /// Check ranges and return the target ACOS as a fraction.
    pub fn validate(&self) -> Result<f64> {
        if !(0.0..=100.0).contains(&self.target_acos_percent) {
            return Err(PromoteError::InvalidConfig(format!(
                "target ACOS must be between 0 and 100 percent, got {}",
                self.target_acos_percent
            )));
        }
        if !self.ad_group_default_bid.is_finite() || self.ad_group_default_bid < 0.0 {
            return Err(PromoteError::InvalidConfig(format!(
                "ad group default bid must be a non-negative number, got {}",
                self.ad_group_default_bid
            )));
        }
        if self.bidding_strategy.trim().is_empty() {
            return Err(PromoteError::InvalidConfig("bidding strategy must not be empty".to_string()));
        }
        Ok(self.target_acos_percent / 100.0)
    }
}
