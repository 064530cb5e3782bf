//! Text and JSON rendering of a published portfolio.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregator::PortfolioSummary;
use crate::normalizer::NormalizedAssetRecord;
use crate::orchestrator::PortfolioSnapshot;

pub const COLUMNS: [&str; 19] = [
    "Token Address",
    "Token ID",
    "ID",
    "User",
    "Status",
    "URI",
    "Name",
    "Description",
    "Image URL",
    "Metadata",
    "Collection Name",
    "Collection Icon URL",
    "Created At",
    "Updated At",
    "Captured By",
    "Tier",
    "Stage",
    "Finish",
    "Points",
];

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_summary(summary: &PortfolioSummary) -> String {
    let cards = [
        ("HOLOS", summary.holo_points),
        ("FULL SETS", summary.full_set_count),
        ("TOTAL", summary.total_points),
        ("UNIQUE ASSETS", summary.unique_asset_count as u64),
        ("UNIQUE ILLUVIALS", summary.unique_illuvial_count as u64),
    ];
    cards
        .iter()
        .map(|(label, value)| format!("{label:<17}{}\n", group_thousands(*value)))
        .collect()
}

fn cell(value: Option<&String>) -> String {
    value.map(|v| v.replace(['\t', '\n'], " ")).unwrap_or_default()
}

/// Cells in `COLUMNS` order.
pub fn row_cells(r: &NormalizedAssetRecord) -> [String; 19] {
    [
        cell(r.token_address.as_ref()),
        cell(r.token_id.as_ref()),
        cell(r.id.as_ref()),
        cell(r.owner.as_ref()),
        cell(r.status.as_ref()),
        cell(r.uri.as_ref()),
        cell(r.name.as_ref()),
        cell(r.description.as_ref()),
        cell(r.image_url.as_ref()),
        if r.metadata.is_some() {
            r.metadata_display()
        } else {
            String::new()
        },
        cell(r.collection_name.as_ref()),
        cell(r.collection_icon_url.as_ref()),
        cell(r.created_at.as_ref()),
        cell(r.updated_at.as_ref()),
        cell(Some(&r.captured_by)),
        cell(Some(&r.tier)),
        cell(Some(&r.stage)),
        cell(Some(&r.finish)),
        r.points.to_string(),
    ]
}

/// Tab-separated asset table with a header row.
pub fn render_table(records: &[NormalizedAssetRecord]) -> String {
    let mut out = COLUMNS.join("\t");
    out.push('\n');
    for r in records {
        out.push_str(&row_cells(r).join("\t"));
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    wallet: &'a str,
    generation: u64,
    published_at: Option<DateTime<Utc>>,
    pages: usize,
    summary: &'a PortfolioSummary,
    records: &'a [NormalizedAssetRecord],
}

pub fn render_json(snapshot: &PortfolioSnapshot) -> Result<String> {
    let report = Report {
        wallet: &snapshot.wallet,
        generation: snapshot.generation,
        published_at: snapshot.published_at,
        pages: snapshot.pages,
        summary: &snapshot.summary,
        records: &snapshot.records,
    };
    serde_json::to_string_pretty(&report).context("failed to serialize portfolio")
}
