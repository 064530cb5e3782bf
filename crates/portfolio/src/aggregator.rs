use serde::Serialize;
use std::collections::HashSet;

use crate::normalizer::NormalizedAssetRecord;
use crate::scoring_table::is_holo_finish;

/// Score-card numbers for one fetch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub unique_asset_count: usize,
    pub unique_illuvial_count: usize,
    pub holo_points: u64,
    /// Full-set detection is not implemented; always 0.
    pub full_set_count: u64,
    pub total_points: u64,
}

pub fn summarize(records: &[NormalizedAssetRecord]) -> PortfolioSummary {
    let mut assets = HashSet::new();
    let mut names = HashSet::new();
    let mut holo_points = 0_u64;
    let mut total_points = 0_u64;

    for r in records {
        assets.insert((r.token_address.as_deref(), r.token_id.as_deref()));
        names.insert(r.name.as_deref());
        total_points = total_points.saturating_add(r.points);
        if is_holo_finish(&r.finish) {
            holo_points = holo_points.saturating_add(r.points);
        }
    }

    PortfolioSummary {
        unique_asset_count: assets.len(),
        unique_illuvial_count: names.len(),
        holo_points,
        full_set_count: 0,
        total_points,
    }
}
