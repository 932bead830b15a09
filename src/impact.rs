//! Impact levels and the policy that assigns them
use serde::{Deserialize, Serialize};

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum Impact {
    #[n(0)]
    Low,
    #[n(1)]
    Medium,
    #[n(2)]
    High,
}

/// Impact defaults for one keyed sub-entity kind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct KindImpacts {
    pub added: Impact,
    pub removed: Impact,
    /// Used for modifications that stay under the high-change ratio.
    pub modified: Impact,
}

impl KindImpacts {
    pub const fn new(added: Impact, removed: Impact, modified: Impact) -> Self {
        Self {
            added,
            removed,
            modified,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ImpactPolicy {
    /// Relative change above which a numeric modification is High.
    pub high_change_ratio: f64,
    pub room: KindImpacts,
    pub opening: KindImpacts,
    pub fixture: KindImpacts,
    pub measurement: KindImpacts,
    pub material: KindImpacts,
    pub line_item: KindImpacts,
    pub unit_cost: Impact,
    pub line_total: Impact,
    pub cost: Impact,
    pub markup: Impact,
    pub payment_terms: Impact,
    pub warranty_terms: Impact,
    pub scope_added: Impact,
    pub scope_removed: Impact,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        use Impact::*;

        Self {
            high_change_ratio: 0.20,
            room: KindImpacts::new(Medium, High, Medium),
            opening: KindImpacts::new(Low, Low, Low),
            fixture: KindImpacts::new(Low, Low, Low),
            measurement: KindImpacts::new(Medium, Medium, Medium),
            material: KindImpacts::new(Medium, Medium, Medium),
            line_item: KindImpacts::new(Medium, High, Medium),
            unit_cost: Low,
            line_total: Medium,
            cost: High,
            markup: Medium,
            payment_terms: Medium,
            warranty_terms: Low,
            scope_added: Low,
            scope_removed: Medium,
        }
    }
}

impl ImpactPolicy {
    /// Impact of a numeric value moving from `from` to `to`.
    ///
    /// A zero baseline never reaches the division: anything appearing from
    /// nothing is High, otherwise `otherwise` applies.
    pub fn score(&self, from: f64, to: f64, otherwise: Impact) -> Impact {
        if from > 0.0 && (to - from).abs() / from > self.high_change_ratio {
            Impact::High
        } else if from == 0.0 && to > 0.0 {
            Impact::High
        } else {
            otherwise
        }
    }
}

/// Signed percentage change, `None` for a zero baseline.
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    (from != 0.0).then(|| (to - from) / from * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_rule() {
        let policy = ImpactPolicy::default();

        assert_eq!(policy.score(300.0, 375.0, Impact::Medium), Impact::High);
        assert_eq!(policy.score(300.0, 310.0, Impact::Medium), Impact::Medium);
        assert_eq!(policy.score(300.0, 200.0, Impact::Medium), Impact::High);
        // exactly 20% is not above the threshold
        assert_eq!(policy.score(100.0, 120.0, Impact::Medium), Impact::Medium);
    }

    #[test]
    fn zero_baseline() {
        let policy = ImpactPolicy::default();

        assert_eq!(policy.score(0.0, 5.0, Impact::Low), Impact::High);
        assert_eq!(policy.score(0.0, 0.0, Impact::Low), Impact::Low);
        assert_eq!(percent_change(0.0, 5.0), None);
        assert_eq!(percent_change(200.0, 250.0), Some(25.0));
    }

    #[test]
    fn threshold_is_configurable() {
        let policy = ImpactPolicy {
            high_change_ratio: 0.5,
            ..ImpactPolicy::default()
        };

        assert_eq!(policy.score(300.0, 375.0, Impact::Medium), Impact::Medium);
        assert_eq!(policy.score(300.0, 600.0, Impact::Medium), Impact::High);
    }
}
