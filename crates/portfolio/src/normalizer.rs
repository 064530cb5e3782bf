use common::types::RawAssetRecord;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::scoring_table::{tier_stage_key, ScoringTable};

pub const TIER_KEY: &str = "Tier";
pub const STAGE_KEY: &str = "Stage";
pub const FINISH_KEY: &str = "Finish";
pub const CAPTURED_BY_KEY: &str = "Captured By";

/// One scored asset. Metadata stays structured; `metadata_display` renders it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedAssetRecord {
    pub token_address: Option<String>,
    pub token_id: Option<String>,
    pub id: Option<String>,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub uri: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub collection_name: Option<String>,
    pub collection_icon_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub captured_by: String,
    pub tier: String,
    pub stage: String,
    pub finish: String,
    pub points: u64,
}

impl NormalizedAssetRecord {
    /// Metadata as a single JSON string (`null` when absent).
    pub fn metadata_display(&self) -> String {
        serde_json::to_string(&self.metadata).unwrap_or_default()
    }
}

/// Text form of a metadata attribute. Strings verbatim, numbers and booleans
/// as text (`1.0` renders as `1`), everything else (missing, null, arrays,
/// objects) empty.
fn attribute(metadata: Option<&Map<String, Value>>, key: &str) -> String {
    match metadata.and_then(|m| m.get(key)) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.is_f64() => {
            n.as_f64().map(|f| f.to_string()).unwrap_or_default()
        }
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => String::new(),
    }
}

pub fn normalize(raw: RawAssetRecord, table: &ScoringTable) -> NormalizedAssetRecord {
    let metadata = raw.metadata.as_ref();
    let tier = attribute(metadata, TIER_KEY);
    let stage = attribute(metadata, STAGE_KEY);
    let finish = attribute(metadata, FINISH_KEY);
    let captured_by = attribute(metadata, CAPTURED_BY_KEY);
    let points = table.lookup(&finish, &tier_stage_key(&tier, &stage));

    let collection = raw.collection.unwrap_or_default();

    NormalizedAssetRecord {
        token_address: raw.token_address,
        token_id: raw.token_id,
        id: raw.id,
        owner: raw.owner,
        status: raw.status,
        uri: raw.uri,
        name: raw.name,
        description: raw.description,
        image_url: raw.image_url,
        metadata: raw.metadata,
        collection_name: collection.name,
        collection_icon_url: collection.icon_url,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        captured_by,
        tier,
        stage,
        finish,
        points,
    }
}

/// Normalize a page in delivery order.
pub fn normalize_all<I>(raws: I, table: &ScoringTable) -> Vec<NormalizedAssetRecord>
where
    I: IntoIterator<Item = RawAssetRecord>,
{
    raws.into_iter().map(|r| normalize(r, table)).collect()
}
