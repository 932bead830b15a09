//! Keyed record diffing shared by every sub-entity kind
//!
//! Each kind describes itself through [`Record`]: its natural key, the
//! impact defaults it uses, how its additions and removals read, and which of
//! its fields are compared. [`diff_records`] is the one loop that turns two
//! slices of a kind into [`Change`]s.
use super::comparison::{Category, Change, ChangeValue};
use super::impact::{Impact, ImpactPolicy, KindImpacts};
use std::collections::{BTreeMap, BTreeSet};

pub trait Record: Clone + Into<ChangeValue> {
    type Key: Ord;
    const CATEGORY: Category;

    fn key(&self) -> Self::Key;
    fn impacts(policy: &ImpactPolicy) -> KindImpacts;
    fn trade(&self) -> Option<&str> {
        None
    }
    fn describe_added(&self) -> String;
    fn describe_removed(&self) -> String;
    /// One entry per compared field that differs, empty when the compared
    /// fields are identical.
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub description: String,
    pub old_value: ChangeValue,
    pub new_value: ChangeValue,
    pub impact: Impact,
}

#[derive(Debug, PartialEq)]
pub enum Pairing<'a, T> {
    Added(&'a T),
    Removed(&'a T),
    Both(&'a T, &'a T),
}

/// Matches both sides by natural key. Keys present in `to` come first in key
/// order, then keys only present in `from`. A key repeated within one side
/// resolves to its last entry.
pub fn pair_by_key<'a, T: Record>(from: &'a [T], to: &'a [T]) -> Vec<Pairing<'a, T>> {
    let from_index: BTreeMap<T::Key, &T> = from.iter().map(|item| (item.key(), item)).collect();
    let to_index: BTreeMap<T::Key, &T> = to.iter().map(|item| (item.key(), item)).collect();

    let mut pairings = Vec::with_capacity(to_index.len());
    for (key, to_item) in &to_index {
        match from_index.get(key) {
            Some(from_item) => pairings.push(Pairing::Both(*from_item, *to_item)),
            None => pairings.push(Pairing::Added(*to_item)),
        }
    }
    for (key, from_item) in &from_index {
        if !to_index.contains_key(key) {
            pairings.push(Pairing::Removed(*from_item));
        }
    }

    pairings
}

pub fn diff_records<T: Record>(
    from: &[T],
    to: &[T],
    policy: &ImpactPolicy,
    changes: &mut Vec<Change>,
) {
    let impacts = T::impacts(policy);

    for pairing in pair_by_key(from, to) {
        match pairing {
            Pairing::Added(item) => changes.push(
                Change::added(
                    T::CATEGORY,
                    item.describe_added(),
                    item.clone().into(),
                    impacts.added,
                )
                .with_trade(item.trade()),
            ),
            Pairing::Removed(item) => changes.push(
                Change::removed(
                    T::CATEGORY,
                    item.describe_removed(),
                    item.clone().into(),
                    impacts.removed,
                )
                .with_trade(item.trade()),
            ),
            Pairing::Both(old, new) => {
                for m in T::modifications(old, new, policy) {
                    changes.push(
                        Change::modified(
                            T::CATEGORY,
                            m.description,
                            m.old_value,
                            m.new_value,
                            m.impact,
                        )
                        .with_trade(new.trade()),
                    );
                }
            }
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct SetDiff<'a> {
    pub added: Vec<&'a str>,
    pub removed: Vec<&'a str>,
}

/// Set difference of two string lists, duplicates collapsed, sorted.
pub fn diff_sets<'a>(from: &'a [String], to: &'a [String]) -> SetDiff<'a> {
    let from: BTreeSet<&str> = from.iter().map(String::as_str).collect();
    let to: BTreeSet<&str> = to.iter().map(String::as_str).collect();

    SetDiff {
        added: to.difference(&from).copied().collect(),
        removed: from.difference(&to).copied().collect(),
    }
}
