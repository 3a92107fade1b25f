//! Bulk-upload row generation
//!
//! Each SKU group becomes a block of rows in strict order:
//! Campaign, Ad Group, Product Ad, then one Keyword row per unique keyword.
//! Child rows reference their campaign by name; the platform resolves names
//! to ids on ingestion, so no synthetic ids are generated.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::config::{
    PromotionConfig, EXACT_AD_GROUP, MATCH_TYPE_EXACT, OPERATION_CREATE, PRODUCT_LINE, STATE_ENABLED,
    TARGETING_MANUAL,
};
use crate::grouping::SkuGroup;
use crate::metrics::Metrics;

/// Upload column order expected by the bulk-operations interface.
pub const BULK_COLUMNS: [&str; 19] = [
    "Product",
    "Entity",
    "Operation",
    "Campaign ID",
    "Ad Group ID",
    "Portfolio ID",
    "Campaign Name",
    "Ad Group Name",
    "Start Date",
    "End Date",
    "Targeting Type",
    "State",
    "Daily Budget",
    "SKU",
    "Ad Group Default Bid",
    "Bid",
    "Keyword Text",
    "Match Type",
    "Bidding Strategy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkEntity {
    Campaign,
    AdGroup,
    ProductAd,
    Keyword,
}

impl BulkEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkEntity::Campaign => "Campaign",
            BulkEntity::AdGroup => "Ad Group",
            BulkEntity::ProductAd => "Product Ad",
            BulkEntity::Keyword => "Keyword",
        }
    }
}

/// One flat upload instruction. Each entity populates its own subset of
/// columns; the rest stay blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutputRow {
    pub product: String,
    pub entity: Option<BulkEntity>,
    pub operation: String,
    pub campaign_id: String,
    pub ad_group_id: String,
    pub portfolio_id: String,
    pub campaign_name: String,
    pub ad_group_name: String,
    pub start_date: String,
    pub end_date: String,
    pub targeting_type: String,
    pub state: String,
    pub daily_budget: Option<f64>,
    pub sku: String,
    pub ad_group_default_bid: Option<f64>,
    pub bid: Option<f64>,
    pub keyword_text: String,
    pub match_type: String,
    pub bidding_strategy: String,
}

fn money(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

impl BulkOutputRow {
    /// Shared fields of every generated row.
    fn create(entity: BulkEntity, campaign_name: &str) -> Self {
        BulkOutputRow {
            product: PRODUCT_LINE.to_string(),
            entity: Some(entity),
            operation: OPERATION_CREATE.to_string(),
            campaign_id: campaign_name.to_string(),
            campaign_name: campaign_name.to_string(),
            state: STATE_ENABLED.to_string(),
            ..Default::default()
        }
    }

    fn in_exact_ad_group(mut self) -> Self {
        self.ad_group_id = EXACT_AD_GROUP.to_string();
        self.ad_group_name = EXACT_AD_GROUP.to_string();
        self
    }

    /// Cell values in `BULK_COLUMNS` order.
    pub fn fields(&self) -> [String; 19] {
        [
            self.product.clone(),
            self.entity.map(|e| e.as_str().to_string()).unwrap_or_default(),
            self.operation.clone(),
            self.campaign_id.clone(),
            self.ad_group_id.clone(),
            self.portfolio_id.clone(),
            self.campaign_name.clone(),
            self.ad_group_name.clone(),
            self.start_date.clone(),
            self.end_date.clone(),
            self.targeting_type.clone(),
            self.state.clone(),
            money(self.daily_budget),
            self.sku.clone(),
            money(self.ad_group_default_bid),
            money(self.bid),
            self.keyword_text.clone(),
            self.match_type.clone(),
            self.bidding_strategy.clone(),
        ]
    }

    /// Numeric value of a money column, for writers that keep cell types.
    pub fn amount(&self, column: usize) -> Option<f64> {
        match *BULK_COLUMNS.get(column)? {
            "Daily Budget" => self.daily_budget,
            "Ad Group Default Bid" => self.ad_group_default_bid,
            "Bid" => self.bid,
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }
}

/// `{portfolio} | SP | {sku} | EXACT | STA | {run date}`
pub fn campaign_name(portfolio_name: &str, sku: &str, run_date: NaiveDate) -> String {
    format!("{portfolio_name} | SP | {sku} | EXACT | STA | {}", run_date.format("%Y-%m-%d"))
}

/// Emit the row block for one SKU group.
pub fn build_group_rows(group: &SkuGroup, metrics: &Metrics, config: &PromotionConfig, run_date: NaiveDate) -> Vec<BulkOutputRow> {
    let name = campaign_name(&group.portfolio_name, &group.sku, run_date);
    let mut rows = Vec::with_capacity(group.keywords.len() + 3);

    rows.push(BulkOutputRow {
        portfolio_id: group.portfolio_id.clone(),
        start_date: run_date.format("%Y-%m-%d").to_string(),
        targeting_type: TARGETING_MANUAL.to_string(),
        daily_budget: Some(metrics.daily_budget_for(&group.portfolio_id)),
        bidding_strategy: config.bidding_strategy.clone(),
        ..BulkOutputRow::create(BulkEntity::Campaign, &name)
    });

    rows.push(BulkOutputRow {
        ad_group_default_bid: Some(config.ad_group_default_bid),
        ..BulkOutputRow::create(BulkEntity::AdGroup, &name).in_exact_ad_group()
    });

    rows.push(BulkOutputRow {
        sku: group.sku.clone(),
        ..BulkOutputRow::create(BulkEntity::ProductAd, &name).in_exact_ad_group()
    });

    let mut added: HashSet<&str> = HashSet::new();
    for keyword in &group.keywords {
        if !added.insert(keyword.as_str()) {
            continue;
        }
        rows.push(BulkOutputRow {
            bid: Some(metrics.bid_for(keyword, &group.portfolio_id)),
            keyword_text: keyword.clone(),
            match_type: MATCH_TYPE_EXACT.to_string(),
            ..BulkOutputRow::create(BulkEntity::Keyword, &name).in_exact_ad_group()
        });
    }

    rows.retain(|r| !r.is_empty());
    rows
}

/// Emit all groups' rows, group after group.
pub fn build_bulk_rows(groups: &[SkuGroup], metrics: &Metrics, config: &PromotionConfig, run_date: NaiveDate) -> Vec<BulkOutputRow> {
    let rows: Vec<BulkOutputRow> = groups
        .iter()
        .flat_map(|g| build_group_rows(g, metrics, config, run_date))
        .collect();
    tracing::info!(groups = groups.len(), rows = rows.len(), "bulk rows generated");
    rows
}
