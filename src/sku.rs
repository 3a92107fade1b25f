use std::collections::HashMap;

use crate::sheets::CampaignRecord;

/// Highest-selling SKU of a portfolio, used to anchor new campaigns.
#[derive(Debug, Clone, PartialEq)]
pub struct BestSku {
    pub portfolio_id: String,
    pub portfolio_name: String,
    pub sku: String,
    pub sales: f64,
}

/// Pick the top-sales row per (portfolio id, portfolio name) pair.
///
/// Rows without both a SKU and a sales figure are ignored entirely. On a
/// sales tie the earliest row wins, and the output follows the order in
/// which each pair first appears.
pub fn best_sku_per_portfolio(campaigns: &[CampaignRecord]) -> Vec<BestSku> {
    let mut best: Vec<BestSku> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for c in campaigns {
        let (Some(sku), Some(sales)) = (c.sku.as_deref(), c.sales) else {
            continue;
        };
        let key = (c.portfolio_id.as_str(), c.portfolio_name.as_str());
        match index.get(&key).copied() {
            Some(i) => {
                // Strictly greater keeps the first occurrence on ties
                if sales > best[i].sales {
                    best[i].sku = sku.to_string();
                    best[i].sales = sales;
                }
            }
            None => {
                index.insert(key, best.len());
                best.push(BestSku {
                    portfolio_id: c.portfolio_id.clone(),
                    portfolio_name: c.portfolio_name.clone(),
                    sku: sku.to_string(),
                    sales,
                });
            }
        }
    }

    tracing::debug!(portfolios = best.len(), "best SKU selected per portfolio");
    best
}
