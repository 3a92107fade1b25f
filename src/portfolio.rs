use std::collections::HashMap;

use crate::sheets::{CampaignRecord, PortfolioRecord, SearchTermRecord, NO_PORTFOLIO};

/// Maps informal portfolio names from the campaign and search-term sheets to
/// stable portfolio identifiers.
#[derive(Debug, Clone, Default)]
pub struct PortfolioResolver {
    by_name: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl PortfolioResolver {
    pub fn new(portfolios: &[PortfolioRecord]) -> Self {
        let mut resolver = PortfolioResolver::default();
        for p in portfolios {
            // First row wins for duplicated names or ids
            resolver
                .by_name
                .entry(p.portfolio_name.trim().to_string())
                .or_insert_with(|| p.portfolio_id.trim().to_string());
            resolver
                .by_id
                .entry(p.portfolio_id.trim().to_string())
                .or_insert_with(|| p.portfolio_name.trim().to_string());
        }
        resolver
    }

    /// Portfolio id for a display name. Campaigns outside any portfolio and
    /// names missing from the table both resolve to an empty id; that is a
    /// valid business state, not an error.
    pub fn resolve(&self, name: &str) -> String {
        let name = name.trim();
        if name == NO_PORTFOLIO {
            return String::new();
        }
        self.by_name.get(name).cloned().unwrap_or_default()
    }

    /// Display name registered for a portfolio id.
    pub fn name_of(&self, portfolio_id: &str) -> Option<&str> {
        self.by_id.get(portfolio_id).map(String::as_str)
    }

    pub fn backfill_campaigns(&self, campaigns: Vec<CampaignRecord>) -> Vec<CampaignRecord> {
        campaigns
            .into_iter()
            .map(|c| CampaignRecord { portfolio_id: self.resolve(&c.portfolio_name), ..c })
            .collect()
    }

    pub fn backfill_search_terms(&self, search_terms: Vec<SearchTermRecord>) -> Vec<SearchTermRecord> {
        let resolved: Vec<SearchTermRecord> = search_terms
            .into_iter()
            .map(|s| SearchTermRecord { portfolio_id: self.resolve(&s.portfolio_name), ..s })
            .collect();
        let unresolved = resolved
            .iter()
            .filter(|s| s.portfolio_id.is_empty() && s.portfolio_name != NO_PORTFOLIO)
            .count();
        if unresolved > 0 {
            tracing::debug!(unresolved, "search terms with portfolio names missing from the portfolio table");
        }
        resolved
    }
}
