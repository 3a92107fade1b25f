//! Historical bid and budget aggregation
//!
//! Averages are computed over the full input before any candidate filtering:
//! - CPC per (search term, portfolio id) across every search-term row
//! - Daily budget per portfolio id across campaign rows
//! - A global fallback, the mean of the per-key CPC averages
//!
//! Missing numeric values are excluded from a mean, never counted as zero.
//! A key whose values were all missing keeps an entry without a value.

use std::collections::BTreeMap;

use crate::sheets::{CampaignRecord, SearchTermRecord};

/// Use `primary` when it was observed, `fallback` otherwise. Every
/// missing-metric default in the pipeline goes through here.
pub fn resolve_with_fallback(primary: Option<f64>, fallback: f64) -> f64 {
    primary.unwrap_or(fallback)
}

/// Round to cents, halves to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Aggregated bid/budget reference data for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    avg_cpc: BTreeMap<(String, String), Option<f64>>,
    avg_budget: BTreeMap<String, Option<f64>>,
    /// Mean of all per-keyword CPC averages, rounded to cents.
    pub global_fallback: f64,
    /// False when no CPC was observed and the fallback came from config.
    pub fallback_observed: bool,
}

impl Metrics {
    /// `default_bid` only backs the global fallback when the search-term
    /// sheet has no usable CPC at all.
    pub fn aggregate(search_terms: &[SearchTermRecord], campaigns: &[CampaignRecord], default_bid: f64) -> Self {
        let avg_cpc = average_cpc(search_terms);
        let avg_budget = average_budget(campaigns);

        let mut overall = Mean::default();
        for avg in avg_cpc.values() {
            overall.push(*avg);
        }
        let observed = overall.value().map(round2);
        let global_fallback = resolve_with_fallback(observed, default_bid);

        tracing::debug!(
            cpc_keys = avg_cpc.len(),
            budget_portfolios = avg_budget.len(),
            global_fallback,
            "metrics aggregated"
        );
        if observed.is_none() {
            tracing::warn!(default_bid, "no CPC observed in search terms, using configured default bid as fallback");
        }

        Metrics { avg_cpc, avg_budget, global_fallback, fallback_observed: observed.is_some() }
    }

    pub fn cpc_for(&self, keyword: &str, portfolio_id: &str) -> Option<f64> {
        self.avg_cpc
            .get(&(keyword.to_string(), portfolio_id.to_string()))
            .copied()
            .flatten()
    }

    /// Whether the portfolio appears in the campaign sheet at all, with or
    /// without a numeric budget.
    pub fn has_budget_entry(&self, portfolio_id: &str) -> bool {
        self.avg_budget.contains_key(portfolio_id)
    }

    pub fn budget_for(&self, portfolio_id: &str) -> Option<f64> {
        self.avg_budget.get(portfolio_id).copied().flatten()
    }

    /// Keyword bid: observed average CPC, else the global fallback.
    pub fn bid_for(&self, keyword: &str, portfolio_id: &str) -> f64 {
        round2(resolve_with_fallback(self.cpc_for(keyword, portfolio_id), self.global_fallback))
    }

    /// Campaign budget: portfolio average budget, else the global CPC
    /// fallback. The cross-metric default mirrors the existing tool and is
    /// pending product-owner confirmation.
    pub fn daily_budget_for(&self, portfolio_id: &str) -> f64 {
        round2(resolve_with_fallback(self.budget_for(portfolio_id), self.global_fallback))
    }
}

fn average_cpc(search_terms: &[SearchTermRecord]) -> BTreeMap<(String, String), Option<f64>> {
    let mut means: BTreeMap<(String, String), Mean> = BTreeMap::new();
    for st in search_terms {
        means
            .entry((st.search_term.clone(), st.portfolio_id.clone()))
            .or_default()
            .push(st.cpc);
    }
    means.into_iter().map(|(k, m)| (k, m.value())).collect()
}

fn average_budget(campaigns: &[CampaignRecord]) -> BTreeMap<String, Option<f64>> {
    let mut means: BTreeMap<String, Mean> = BTreeMap::new();
    for c in campaigns {
        means.entry(c.portfolio_id.clone()).or_default().push(c.daily_budget);
    }
    means.into_iter().map(|(k, m)| (k, m.value())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::EntityType;

    fn term(text: &str, pid: &str, cpc: Option<f64>) -> SearchTermRecord {
        SearchTermRecord {
            search_term: text.into(),
            campaign_name: "C".into(),
            ad_group_name: "AG".into(),
            portfolio_name: "P".into(),
            portfolio_id: pid.into(),
            units: Some(1.0),
            acos: Some(0.1),
            cpc,
            product_targeting_expression: None,
        }
    }

    fn campaign(pid: &str, budget: Option<f64>) -> CampaignRecord {
        CampaignRecord {
            entity: EntityType::Campaign,
            portfolio_name: "P".into(),
            portfolio_id: pid.into(),
            campaign_name: "C".into(),
            ad_group_name: String::new(),
            keyword_text: None,
            daily_budget: budget,
            sku: None,
            sales: None,
        }
    }

    #[test]
    fn cents_round_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(0.625), 0.62);
        assert_eq!(round2(0.876), 0.88);
    }

    #[test]
    fn cpc_mean_is_per_keyword_and_portfolio() {
        let terms = vec![
            term("mug", "1", Some(1.0)),
            term("mug", "1", Some(2.0)),
            term("mug", "2", Some(5.0)),
            term("mug", "1", None),
        ];
        let m = Metrics::aggregate(&terms, &[], 2.0);
        assert_eq!(m.cpc_for("mug", "1"), Some(1.5));
        assert_eq!(m.cpc_for("mug", "2"), Some(5.0));
        assert_eq!(m.cpc_for("mug", "3"), None);
        // mean of per-key averages (1.5, 5.0), not of raw rows
        assert_eq!(m.global_fallback, 3.25);
        assert!(m.fallback_observed);
    }

    #[test]
    fn non_numeric_budgets_are_excluded_not_zeroed() {
        let campaigns = vec![campaign("1", Some(10.0)), campaign("1", None), campaign("1", Some(20.0)), campaign("2", None)];
        let m = Metrics::aggregate(&[term("mug", "1", Some(0.5))], &campaigns, 2.0);
        assert_eq!(m.budget_for("1"), Some(15.0));
        assert!(m.has_budget_entry("2"));
        assert_eq!(m.budget_for("2"), None);
        assert!(!m.has_budget_entry("3"));
    }

    #[test]
    fn missing_metrics_fall_back_to_global_cpc() {
        let terms = vec![term("mug", "1", Some(0.333)), term("cup", "1", Some(0.507))];
        let m = Metrics::aggregate(&terms, &[campaign("1", None)], 2.0);
        assert_eq!(m.global_fallback, 0.42);
        assert_eq!(m.bid_for("mug", "1"), 0.33);
        assert_eq!(m.bid_for("teapot", "1"), 0.42);
        assert_eq!(m.daily_budget_for("1"), 0.42);
        assert_eq!(m.daily_budget_for("9"), 0.42);
    }

    #[test]
    fn configured_bid_backs_fallback_without_any_cpc() {
        let m = Metrics::aggregate(&[term("mug", "1", None)], &[], 1.25);
        assert_eq!(m.global_fallback, 1.25);
        assert!(!m.fallback_observed);
    }

    #[test]
    fn resolve_with_fallback_prefers_primary() {
        assert_eq!(resolve_with_fallback(Some(0.0), 9.0), 0.0);
        assert_eq!(resolve_with_fallback(None, 9.0), 9.0);
    }
}
