use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::MIN_UNITS;
use crate::sheets::SearchTermRecord;

// ASIN-style product codes ("B0...") leaking into the customer query
static ASIN_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)b0").expect("static regex"));

/// A search term that earned promotion to an exact-match keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionCandidate {
    pub keyword: String,
    pub campaign: String,
    pub ad_group: String,
    pub units: u32,
    pub acos: f64,
    pub portfolio_id: String,
}

/// Check whether a query text looks like a product code rather than a keyword.
pub fn looks_like_asin(text: &str) -> bool {
    ASIN_MARKER.is_match(text)
}

/// Eligibility predicate for one search-term row. Missing units or ACOS
/// never qualify.
pub fn is_eligible(st: &SearchTermRecord, target_acos: f64) -> bool {
    let enough_units = st.units.is_some_and(|u| u >= MIN_UNITS);
    let within_target = st.acos.is_some_and(|a| a <= target_acos);
    let keyword_match = st
        .product_targeting_expression
        .as_deref()
        .map_or(true, |e| e.trim().is_empty());

    enough_units && within_target && keyword_match && !looks_like_asin(&st.search_term)
}

/// Filter search terms into promotion candidates, keeping the first row for
/// each (keyword, campaign, ad group).
pub fn extract_candidates(search_terms: &[SearchTermRecord], target_acos: f64) -> Vec<PromotionCandidate> {
    let mut seen: HashSet<(&str, &str, &str)> = HashSet::new();
    let mut candidates = Vec::new();
    for st in search_terms {
        if !is_eligible(st, target_acos) {
            continue;
        }
        let (Some(units), Some(acos)) = (st.units, st.acos) else {
            continue;
        };
        if !seen.insert((st.search_term.as_str(), st.campaign_name.as_str(), st.ad_group_name.as_str())) {
            continue;
        }
        candidates.push(PromotionCandidate {
            keyword: st.search_term.clone(),
            campaign: st.campaign_name.clone(),
            ad_group: st.ad_group_name.clone(),
            units: units as u32,
            acos,
            portfolio_id: st.portfolio_id.clone(),
        });
    }

    tracing::info!(
        search_terms = search_terms.len(),
        candidates = candidates.len(),
        target_acos,
        "performing search terms extracted"
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st(term: &str, campaign: &str, units: Option<f64>, acos: Option<f64>, pte: Option<&str>) -> SearchTermRecord {
        SearchTermRecord {
            search_term: term.into(),
            campaign_name: campaign.into(),
            ad_group_name: "AG".into(),
            portfolio_name: "Kitchen".into(),
            portfolio_id: "111".into(),
            units,
            acos,
            cpc: Some(0.5),
            product_targeting_expression: pte.map(str::to_string),
        }
    }

    #[test]
    fn performing_keyword_is_retained() {
        let rows = vec![st("blue widget", "C1", Some(3.0), Some(0.10), None)];
        let out = extract_candidates(&rows, 0.15);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].keyword, "blue widget");
        assert_eq!(out[0].units, 3);
        assert_eq!(out[0].portfolio_id, "111");
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert!(is_eligible(&st("mug", "C", Some(2.0), Some(0.15), None), 0.15));
        assert!(!is_eligible(&st("mug", "C", Some(1.0), Some(0.05), None), 0.15));
        assert!(!is_eligible(&st("mug", "C", Some(5.0), Some(0.16), None), 0.15));
    }

    #[test]
    fn missing_metrics_never_qualify() {
        assert!(!is_eligible(&st("mug", "C", None, Some(0.05), None), 0.15));
        assert!(!is_eligible(&st("mug", "C", Some(5.0), None, None), 0.15));
    }

    #[test]
    fn product_targeting_rows_are_excluded() {
        assert!(!is_eligible(&st("mug", "C", Some(5.0), Some(0.05), Some("category=\"123\"")), 0.15));
        assert!(is_eligible(&st("mug", "C", Some(5.0), Some(0.05), Some("  ")), 0.15));
    }

    #[test]
    fn asin_like_terms_are_excluded_regardless_of_performance() {
        assert!(!is_eligible(&st("B0123456", "C", Some(50.0), Some(0.01), None), 0.15));
        assert!(!is_eligible(&st("case for b07xyz", "C", Some(50.0), Some(0.01), None), 0.15));
        assert!(looks_like_asin("xB0y"));
        assert!(!looks_like_asin("bo widget"));
    }

    #[test]
    fn duplicates_by_keyword_campaign_ad_group_keep_first() {
        let rows = vec![
            st("mug", "C1", Some(3.0), Some(0.10), None),
            st("mug", "C1", Some(9.0), Some(0.02), None),
            st("mug", "C2", Some(4.0), Some(0.12), None),
        ];
        let out = extract_candidates(&rows, 0.15);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].units, 3);
        assert_eq!(out[1].campaign, "C2");
    }

    #[test]
    fn every_survivor_meets_the_threshold() {
        let rows: Vec<SearchTermRecord> = (0..40)
            .map(|i| {
                let units = (i % 5) as f64;
                let acos = (i as f64) / 40.0;
                st(&format!("term {i}"), "C", Some(units), Some(acos), None)
            })
            .collect();
        for step in 0..=10 {
            let target = step as f64 / 10.0;
            for c in extract_candidates(&rows, target) {
                assert!(c.acos <= target);
                assert!(c.units >= 2);
            }
        }
    }
}
