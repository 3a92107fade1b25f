use std::collections::HashSet;

use crate::candidates::PromotionCandidate;
use crate::sheets::{CampaignRecord, EntityType};

/// A keyword already configured somewhere in the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExistingKeyword {
    pub keyword_text: String,
    pub campaign_name: String,
    pub ad_group_name: String,
}

/// Keyword rows of the campaign export, first occurrence per
/// (keyword, campaign, ad group). Texts with a `+` use a different match-type
/// syntax and are left out.
pub fn existing_keywords(campaigns: &[CampaignRecord]) -> Vec<ExistingKeyword> {
    let mut seen = HashSet::new();
    campaigns
        .iter()
        .filter(|c| c.entity == EntityType::Keyword)
        .filter_map(|c| {
            Some(ExistingKeyword {
                keyword_text: c.keyword_text.clone()?,
                campaign_name: c.campaign_name.clone(),
                ad_group_name: c.ad_group_name.clone(),
            })
        })
        .filter(|k| seen.insert(k.clone()))
        .filter(|k| !k.keyword_text.contains('+'))
        .collect()
}

/// Outcome of checking candidates against configured keywords.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFilterResult {
    pub retained: Vec<PromotionCandidate>,
    pub dropped: Vec<PromotionCandidate>,
}

/// Drop every candidate whose text matches any existing keyword, wherever it
/// runs. Matching is by exact, case-sensitive text only.
pub fn filter_existing(candidates: Vec<PromotionCandidate>, existing: &[ExistingKeyword]) -> DuplicateFilterResult {
    let texts: HashSet<&str> = existing.iter().map(|k| k.keyword_text.as_str()).collect();
    let (dropped, retained): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| texts.contains(c.keyword.as_str()));

    tracing::info!(
        existing_keywords = existing.len(),
        retained = retained.len(),
        dropped = dropped.len(),
        "candidates checked against configured keywords"
    );
    DuplicateFilterResult { retained, dropped }
}
