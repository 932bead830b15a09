//! Comparison results between two revisions of one parent
use super::analysis::{Fixture, Material, Measurement, Opening, Room};
use super::bid::LineItem;
use super::error::{Result, RevisionError};
use super::impact::{Impact, ImpactPolicy};
use super::record::{Payload, Revision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

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
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[n(0)]
    Room,
    #[n(1)]
    Opening,
    #[n(2)]
    Fixture,
    #[n(3)]
    Measurement,
    #[n(4)]
    Material,
    #[n(5)]
    LineItem,
    #[n(6)]
    Cost,
    #[n(7)]
    Terms,
    #[n(8)]
    Scope,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Room => "room",
            Category::Opening => "opening",
            Category::Fixture => "fixture",
            Category::Measurement => "measurement",
            Category::Material => "material",
            Category::LineItem => "line_item",
            Category::Cost => "cost",
            Category::Terms => "terms",
            Category::Scope => "scope",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The old or new side of a change: a whole sub-entity, a scalar, or a term.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ChangeValue {
    Number(f64),
    Text(String),
    Room(Room),
    Opening(Opening),
    Fixture(Fixture),
    Measurement(Measurement),
    Material(Material),
    LineItem(LineItem),
}

macro_rules! change_value_from {
    ($($ty:ident),*) => {
        $(impl From<$ty> for ChangeValue {
            fn from(value: $ty) -> Self {
                ChangeValue::$ty(value)
            }
        })*
    };
}

change_value_from!(Room, Opening, Fixture, Measurement, Material, LineItem);

impl From<f64> for ChangeValue {
    fn from(value: f64) -> Self {
        ChangeValue::Number(value)
    }
}

impl From<String> for ChangeValue {
    fn from(value: String) -> Self {
        ChangeValue::Text(value)
    }
}

impl From<&str> for ChangeValue {
    fn from(value: &str) -> Self {
        ChangeValue::Text(value.to_owned())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Change {
    pub change_type: ChangeType,
    pub category: Category,
    pub description: String,
    pub old_value: Option<ChangeValue>,
    pub new_value: Option<ChangeValue>,
    pub impact: Impact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<String>,
}

impl Change {
    pub fn added(
        category: Category,
        description: String,
        value: ChangeValue,
        impact: Impact,
    ) -> Self {
        Self {
            change_type: ChangeType::Added,
            category,
            description,
            old_value: None,
            new_value: Some(value),
            impact,
            trade: None,
        }
    }
    pub fn removed(
        category: Category,
        description: String,
        value: ChangeValue,
        impact: Impact,
    ) -> Self {
        Self {
            change_type: ChangeType::Removed,
            category,
            description,
            old_value: Some(value),
            new_value: None,
            impact,
            trade: None,
        }
    }
    pub fn modified(
        category: Category,
        description: String,
        old_value: ChangeValue,
        new_value: ChangeValue,
        impact: Impact,
    ) -> Self {
        Self {
            change_type: ChangeType::Modified,
            category,
            description,
            old_value: Some(old_value),
            new_value: Some(new_value),
            impact,
            trade: None,
        }
    }
    pub fn with_trade(mut self, trade: Option<&str>) -> Self {
        self.trade = trade.map(str::to_owned);
        self
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Summary {
    #[n(0)]
    pub total_changes: usize,
    #[n(1)]
    pub added_count: usize,
    #[n(2)]
    pub removed_count: usize,
    #[n(3)]
    pub modified_count: usize,
    #[n(4)]
    pub high_impact_count: usize,
    #[n(5)]
    pub changes_by_category: BTreeMap<Category, usize>,
}

impl Summary {
    pub fn tally(changes: &[Change]) -> Self {
        let mut summary = Summary {
            total_changes: changes.len(),
            ..Summary::default()
        };

        for change in changes {
            match change.change_type {
                ChangeType::Added => summary.added_count += 1,
                ChangeType::Removed => summary.removed_count += 1,
                ChangeType::Modified => summary.modified_count += 1,
            }
            if change.impact == Impact::High {
                summary.high_impact_count += 1;
            }
            *summary
                .changes_by_category
                .entry(change.category)
                .or_default() += 1;
        }

        summary
    }
    pub fn count(&self, category: Category) -> usize {
        self.changes_by_category
            .get(&category)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub from_version: u32,
    pub to_version: u32,
    pub changes: Vec<Change>,
    pub summary: Summary,
}

impl ComparisonResult {
    pub fn changes_in(&self, category: Category) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.category == category)
    }
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RevisionError::Encode(e.to_string()))
    }
}

/// Diffs two revisions of the same family. Descriptions read from `from` to
/// `to` whichever of the two is older.
pub fn compare<P: Payload>(
    from: &Revision<P>,
    to: &Revision<P>,
    policy: &ImpactPolicy,
) -> ComparisonResult {
    let mut changes = Vec::new();
    P::diff(from, to, policy, &mut changes);
    let summary = Summary::tally(&changes);

    ComparisonResult {
        from_version: from.version,
        to_version: to.version,
        changes,
        summary,
    }
}

/// [`compare`], refusing revisions that belong to different parents.
pub fn compare_checked<P: Payload>(
    from: &Revision<P>,
    to: &Revision<P>,
    policy: &ImpactPolicy,
) -> Result<ComparisonResult> {
    if from.parent_id != to.parent_id {
        return Err(RevisionError::ParentMismatch {
            from: from.parent_id.clone(),
            to: to.parent_id.clone(),
        });
    }

    Ok(compare(from, to, policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_every_change_once() {
        let changes = vec![
            Change::added(Category::Room, "a".into(), "x".into(), Impact::Medium),
            Change::removed(Category::Room, "b".into(), "y".into(), Impact::High),
            Change::modified(Category::Cost, "c".into(), 1.0_f64.into(), 2.0_f64.into(), Impact::High),
        ];

        let summary = Summary::tally(&changes);
        assert_eq!(summary.total_changes, 3);
        assert_eq!(summary.added_count, 1);
        assert_eq!(summary.removed_count, 1);
        assert_eq!(summary.modified_count, 1);
        assert_eq!(summary.high_impact_count, 2);
        assert_eq!(summary.count(Category::Room), 2);
        assert_eq!(summary.count(Category::Cost), 1);
        assert_eq!(summary.count(Category::Scope), 0);
    }

    #[test]
    fn summary_cbor_roundtrip() {
        let summary = Summary::tally(&[Change::added(
            Category::LineItem,
            "x".into(),
            "y".into(),
            Impact::Low,
        )]);

        let encoded = minicbor::to_vec(&summary).unwrap();
        let decoded: Summary = minicbor::decode(&encoded).unwrap();
        assert_eq!(summary, decoded);
    }

    #[test]
    fn change_serialises_with_wire_names() {
        let change = Change::modified(
            Category::LineItem,
            "total".into(),
            1000.0_f64.into(),
            1200.0_f64.into(),
            Impact::Medium,
        )
        .with_trade(Some("carpentry"));

        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["change_type"], "modified");
        assert_eq!(json["category"], "line_item");
        assert_eq!(json["impact"], "Medium");
        assert_eq!(json["trade"], "carpentry");
        assert_eq!(json["old_value"], 1000.0);

        let untraded = Change::added(Category::Scope, "x".into(), "y".into(), Impact::Low);
        let json = serde_json::to_value(&untraded).unwrap();
        assert!(json.get("trade").is_none());
        assert!(json["old_value"].is_null());
    }
}
