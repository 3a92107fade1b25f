//! End-to-end keyword promotion run
//!
//! Each stage is a pure function of the previous stages' values; nothing is
//! mutated after it is handed on except the portfolio id backfill.

use chrono::NaiveDate;
use serde::Serialize;

use crate::bulk::{build_bulk_rows, BulkOutputRow};
use crate::candidates::extract_candidates;
use crate::config::PromotionConfig;
use crate::duplicates::{existing_keywords, filter_existing};
use crate::error::{PromoteError, Result};
use crate::grouping::{build_sku_groups, GroupingResult};
use crate::metrics::Metrics;
use crate::portfolio::PortfolioResolver;
use crate::sheets::{EntityType, Workbook};
use crate::sku::best_sku_per_portfolio;

/// Counts and decisions of one run, logged and optionally written as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_date: String,
    pub target_acos: f64,
    pub search_term_rows: usize,
    pub campaign_rows: usize,
    pub candidates: usize,
    pub duplicates_dropped: usize,
    pub unanchored_candidates: usize,
    pub groups: usize,
    pub skipped_groups: Vec<String>,
    pub rows: usize,
    pub global_fallback: f64,
    pub fallback_observed: bool,
}

#[derive(Debug)]
pub struct PromotionOutput {
    pub rows: Vec<BulkOutputRow>,
    pub summary: RunSummary,
    /// Per-group failures that did not abort the run.
    pub failures: Vec<PromoteError>,
}

/// Turn a bulk export into bulk-upload rows for new exact-match campaigns.
pub fn run(workbook: Workbook, config: &PromotionConfig, run_date: NaiveDate) -> Result<PromotionOutput> {
    let target_acos = config.validate()?;
    let resolver = PortfolioResolver::new(&workbook.portfolios);

    let campaigns: Vec<_> = resolver
        .backfill_campaigns(workbook.campaigns)
        .into_iter()
        .filter(|c| c.entity != EntityType::ProductTargeting)
        .collect();
    let search_terms = resolver.backfill_search_terms(workbook.search_terms);

    let metrics = Metrics::aggregate(&search_terms, &campaigns, config.ad_group_default_bid);
    let best = best_sku_per_portfolio(&campaigns);

    let candidates = extract_candidates(&search_terms, target_acos);
    let candidate_count = candidates.len();
    let existing = existing_keywords(&campaigns);
    let filtered = filter_existing(candidates, &existing);

    let GroupingResult { groups, mut failures, unanchored } =
        build_sku_groups(&filtered.retained, &best, &metrics, &resolver);
    if config.strict_integrity && !failures.is_empty() {
        return Err(failures.swap_remove(0));
    }

    let rows = build_bulk_rows(&groups, &metrics, config, run_date);

    let summary = RunSummary {
        run_date: run_date.format("%Y-%m-%d").to_string(),
        target_acos,
        search_term_rows: search_terms.len(),
        campaign_rows: campaigns.len(),
        candidates: candidate_count,
        duplicates_dropped: filtered.dropped.len(),
        unanchored_candidates: unanchored,
        groups: groups.len(),
        skipped_groups: failures.iter().map(|e| e.to_string()).collect(),
        rows: rows.len(),
        global_fallback: metrics.global_fallback,
        fallback_observed: metrics.fallback_observed,
    };
    tracing::info!(
        candidates = summary.candidates,
        duplicates_dropped = summary.duplicates_dropped,
        groups = summary.groups,
        skipped_groups = summary.skipped_groups.len(),
        rows = summary.rows,
        "promotion run complete"
    );

    Ok(PromotionOutput { rows, summary, failures })
}
