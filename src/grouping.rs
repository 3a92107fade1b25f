//! Anchor SKU grouping and portfolio assignment
//!
//! Candidates join to the best SKU of their portfolio, then collapse into one
//! group per SKU. A group may pull keywords from several portfolios that
//! happen to share a best SKU; it is assigned the linked portfolio with the
//! highest average daily budget.

use std::collections::{BTreeMap, HashSet};

use crate::candidates::PromotionCandidate;
use crate::error::{PromoteError, Result};
use crate::metrics::Metrics;
use crate::portfolio::PortfolioResolver;
use crate::sku::BestSku;
use crate::sheets::NO_PORTFOLIO;

/// Candidates sharing an anchor SKU, before a portfolio is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredGroup {
    pub sku: String,
    /// Unique keywords in candidate order.
    pub keywords: Vec<String>,
    /// Distinct candidate portfolio ids in first-seen order.
    pub linked_portfolios: Vec<String>,
}

/// A group ready for bulk-row generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SkuGroup {
    pub sku: String,
    pub keywords: Vec<String>,
    pub portfolio_id: String,
    pub portfolio_name: String,
}

#[derive(Debug, Default)]
pub struct GroupingResult {
    pub groups: Vec<SkuGroup>,
    /// Groups that could not be assigned a portfolio.
    pub failures: Vec<PromoteError>,
    /// Candidates whose portfolio has no best SKU to anchor on.
    pub unanchored: usize,
}

/// Join candidates to best SKUs by portfolio id and group by SKU. Groups come
/// back ordered by SKU.
pub fn group_by_sku(candidates: &[PromotionCandidate], best: &[BestSku]) -> (Vec<AnchoredGroup>, usize) {
    let mut groups: BTreeMap<&str, AnchoredGroup> = BTreeMap::new();
    let mut seen_keywords: HashSet<(&str, &str)> = HashSet::new();
    let mut unanchored = 0usize;

    for c in candidates {
        let mut anchored = false;
        // Every best-SKU entry of the portfolio matches, like an inner join
        for b in best.iter().filter(|b| b.portfolio_id == c.portfolio_id) {
            anchored = true;
            let group = groups.entry(b.sku.as_str()).or_insert_with(|| AnchoredGroup {
                sku: b.sku.clone(),
                keywords: Vec::new(),
                linked_portfolios: Vec::new(),
            });
            if seen_keywords.insert((b.sku.as_str(), c.keyword.as_str())) {
                group.keywords.push(c.keyword.clone());
            }
            if !group.linked_portfolios.contains(&c.portfolio_id) {
                group.linked_portfolios.push(c.portfolio_id.clone());
            }
        }
        if !anchored {
            unanchored += 1;
        }
    }

    if unanchored > 0 {
        tracing::warn!(unanchored, "candidates dropped: their portfolio has no best-selling SKU");
    }
    (groups.into_values().collect(), unanchored)
}

/// Choose the linked portfolio with the highest average daily budget.
///
/// Portfolios present in the budget table without a numeric average rank
/// below every numeric one; ties go to the earlier linked portfolio. A group
/// with no linked portfolio in the budget table is a data-integrity error.
pub fn assign_portfolio(group: &AnchoredGroup, metrics: &Metrics) -> Result<String> {
    let mut chosen: Option<(&str, Option<f64>)> = None;
    for pid in &group.linked_portfolios {
        if !metrics.has_budget_entry(pid) {
            continue;
        }
        let budget = metrics.budget_for(pid);
        let better = match chosen {
            None => true,
            Some((_, current)) => outranks(budget, current),
        };
        if better {
            chosen = Some((pid.as_str(), budget));
        }
    }

    chosen.map(|(pid, _)| pid.to_string()).ok_or_else(|| PromoteError::DataIntegrity {
        sku: group.sku.clone(),
        portfolios: group.linked_portfolios.clone(),
    })
}

fn outranks(candidate: Option<f64>, current: Option<f64>) -> bool {
    match (candidate, current) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Display name for an assigned portfolio: the portfolio table first, then
/// the name carried on the campaign rows, then the "No portfolio" sentinel.
fn display_name(portfolio_id: &str, resolver: &PortfolioResolver, best: &[BestSku]) -> String {
    resolver
        .name_of(portfolio_id)
        .or_else(|| {
            best.iter()
                .find(|b| b.portfolio_id == portfolio_id)
                .map(|b| b.portfolio_name.as_str())
        })
        .unwrap_or(NO_PORTFOLIO)
        .to_string()
}

/// Group candidates and assign every group its portfolio. Failing groups are
/// collected rather than aborting; callers decide whether they are fatal.
pub fn build_sku_groups(
    candidates: &[PromotionCandidate],
    best: &[BestSku],
    metrics: &Metrics,
    resolver: &PortfolioResolver,
) -> GroupingResult {
    let (anchored, unanchored) = group_by_sku(candidates, best);
    let mut result = GroupingResult { unanchored, ..Default::default() };

    for group in anchored {
        match assign_portfolio(&group, metrics) {
            Ok(portfolio_id) => {
                tracing::debug!(sku = %group.sku, portfolio_id = %portfolio_id, keywords = group.keywords.len(), "portfolio assigned");
                result.groups.push(SkuGroup {
                    portfolio_name: display_name(&portfolio_id, resolver, best),
                    sku: group.sku,
                    keywords: group.keywords,
                    portfolio_id,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "SKU group skipped");
                result.failures.push(e);
            }
        }
    }

    tracing::info!(groups = result.groups.len(), failed = result.failures.len(), "SKU groups built");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::{CampaignRecord, EntityType, PortfolioRecord, SearchTermRecord};

    fn candidate(keyword: &str, pid: &str) -> PromotionCandidate {
        PromotionCandidate {
            keyword: keyword.into(),
            campaign: "C".into(),
            ad_group: "AG".into(),
            units: 3,
            acos: 0.1,
            portfolio_id: pid.into(),
        }
    }

    fn best(pid: &str, name: &str, sku: &str) -> BestSku {
        BestSku { portfolio_id: pid.into(), portfolio_name: name.into(), sku: sku.into(), sales: 100.0 }
    }

    fn budget_row(pid: &str, budget: Option<f64>) -> CampaignRecord {
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

    fn metrics(budgets: &[(&str, Option<f64>)]) -> Metrics {
        let campaigns: Vec<CampaignRecord> = budgets.iter().map(|(p, b)| budget_row(p, *b)).collect();
        let terms = vec![SearchTermRecord {
            search_term: "mug".into(),
            campaign_name: "C".into(),
            ad_group_name: "AG".into(),
            portfolio_name: "P".into(),
            portfolio_id: "1".into(),
            units: Some(3.0),
            acos: Some(0.1),
            cpc: Some(0.8),
            product_targeting_expression: None,
        }];
        Metrics::aggregate(&terms, &campaigns, 2.0)
    }

    #[test]
    fn groups_are_keyed_by_sku_in_order() {
        let best = vec![best("1", "Kitchen", "SKU-B"), best("2", "Garden", "SKU-A")];
        let cands = vec![candidate("mug", "1"), candidate("rake", "2"), candidate("mug", "1"), candidate("cup", "1")];
        let (groups, unanchored) = group_by_sku(&cands, &best);
        assert_eq!(unanchored, 0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sku, "SKU-A");
        assert_eq!(groups[1].keywords, vec!["mug".to_string(), "cup".to_string()]);
    }

    #[test]
    fn shared_best_sku_links_several_portfolios() {
        let best = vec![best("1", "Kitchen", "SKU-A"), best("2", "Garden", "SKU-A")];
        let (groups, _) = group_by_sku(&[candidate("mug", "1"), candidate("rake", "2")], &best);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].linked_portfolios, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn candidates_without_anchor_are_counted() {
        let (groups, unanchored) = group_by_sku(&[candidate("mug", "9")], &[best("1", "Kitchen", "A")]);
        assert!(groups.is_empty());
        assert_eq!(unanchored, 1);
    }

    #[test]
    fn highest_budget_portfolio_wins() {
        let group = AnchoredGroup {
            sku: "A".into(),
            keywords: vec!["mug".into()],
            linked_portfolios: vec!["1".into(), "2".into(), "3".into()],
        };
        let m = metrics(&[("1", Some(10.0)), ("2", Some(30.0)), ("3", None)]);
        assert_eq!(assign_portfolio(&group, &m).unwrap(), "2");
    }

    #[test]
    fn budget_ties_keep_linked_order() {
        let group = AnchoredGroup {
            sku: "A".into(),
            keywords: vec!["mug".into()],
            linked_portfolios: vec!["2".into(), "1".into()],
        };
        let m = metrics(&[("1", Some(10.0)), ("2", Some(10.0))]);
        assert_eq!(assign_portfolio(&group, &m).unwrap(), "2");
    }

    #[test]
    fn valueless_budget_entry_still_assignable() {
        let group = AnchoredGroup {
            sku: "A".into(),
            keywords: vec!["mug".into()],
            linked_portfolios: vec!["3".into()],
        };
        let m = metrics(&[("3", None)]);
        assert_eq!(assign_portfolio(&group, &m).unwrap(), "3");
    }

    #[test]
    fn no_budget_entry_is_a_data_integrity_error() {
        let group = AnchoredGroup {
            sku: "A".into(),
            keywords: vec!["mug".into()],
            linked_portfolios: vec!["7".into()],
        };
        let err = assign_portfolio(&group, &metrics(&[("1", Some(5.0))])).unwrap_err();
        assert!(err.is_group_scoped());
        assert!(err.to_string().contains("SKU 'A'"));
    }

    #[test]
    fn failing_groups_are_reported_separately() {
        let resolver = PortfolioResolver::new(&[PortfolioRecord { portfolio_id: "1".into(), portfolio_name: "Kitchen".into() }]);
        let best = vec![best("1", "Kitchen", "A"), best("7", "Ghost", "B")];
        let result = build_sku_groups(&[candidate("mug", "1"), candidate("rake", "7")], &best, &metrics(&[("1", Some(5.0))]), &resolver);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].portfolio_name, "Kitchen");
        assert_eq!(result.failures.len(), 1);
    }

    #[test]
    fn name_falls_back_to_campaign_sheet_name() {
        let resolver = PortfolioResolver::default();
        let best = vec![best("", NO_PORTFOLIO, "A")];
        let result = build_sku_groups(&[candidate("mug", "")], &best, &metrics(&[("", Some(5.0))]), &resolver);
        assert_eq!(result.groups[0].portfolio_name, NO_PORTFOLIO);
        assert_eq!(result.groups[0].portfolio_id, "");
    }
}
