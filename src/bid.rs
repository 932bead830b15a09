//! Bid pricing payload and cost scalars
use super::comparison::{Category, Change};
use super::diff::{Modification, Record, diff_records, diff_sets};
use super::impact::{ImpactPolicy, KindImpacts, percent_change};
use super::record::{Family, Fingerprint, Payload, Revision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    #[default]
    #[n(0)]
    Draft,
    #[n(1)]
    Sent,
    #[n(2)]
    Accepted,
    #[n(3)]
    Rejected,
}

/// Cost scalars kept on the bid record itself; absent until priced.
#[derive(minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidCosts {
    #[n(0)]
    pub total_cost: Option<f64>,
    #[n(1)]
    pub labor_cost: Option<f64>,
    #[n(2)]
    pub material_cost: Option<f64>,
    #[n(3)]
    pub markup_percentage: Option<f64>,
    #[n(4)]
    pub final_price: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub trade: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BidData {
    pub bid_id: String,
    pub project_id: String,
    pub status: String,
    pub scope_of_work: String,
    pub line_items: Vec<LineItem>,
    pub labor_cost: f64,
    pub material_cost: f64,
    pub subtotal: f64,
    pub markup_amount: f64,
    pub total_price: f64,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
    pub schedule: BTreeMap<String, String>, // phase -> duration
    pub payment_terms: String,
    pub warranty_terms: String,
    pub closing_statement: String,
}

impl LineItem {
    pub fn new(
        description: &str,
        trade: &str,
        quantity: f64,
        unit: &str,
        unit_cost: f64,
        total: f64,
    ) -> Self {
        Self {
            description: description.into(),
            trade: trade.into(),
            quantity,
            unit: unit.into(),
            unit_cost,
            total,
        }
    }
}

impl Record for LineItem {
    type Key = (String, String);
    const CATEGORY: Category = Category::LineItem;

    fn key(&self) -> Self::Key {
        (self.trade.clone(), self.description.clone())
    }
    fn impacts(policy: &ImpactPolicy) -> KindImpacts {
        policy.line_item
    }
    fn trade(&self) -> Option<&str> {
        Some(&self.trade)
    }
    fn describe_added(&self) -> String {
        format!(
            "{} - {} added: {:.2} {} @ ${:.2} = ${:.2}",
            self.trade, self.description, self.quantity, self.unit, self.unit_cost, self.total
        )
    }
    fn describe_removed(&self) -> String {
        format!(
            "{} - {} removed: was {:.2} {} @ ${:.2} = ${:.2}",
            self.trade, self.description, self.quantity, self.unit, self.unit_cost, self.total
        )
    }
    // each compared field that differs is its own change
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification> {
        let mut out = Vec::new();

        if from.quantity != to.quantity {
            out.push(Modification {
                description: format!(
                    "{} - {}: quantity changed from {:.2} to {:.2} {}",
                    to.trade, to.description, from.quantity, to.quantity, to.unit
                ),
                old_value: from.quantity.into(),
                new_value: to.quantity.into(),
                impact: policy.score(from.quantity, to.quantity, policy.line_item.modified),
            });
        }
        if from.unit_cost != to.unit_cost {
            out.push(Modification {
                description: format!(
                    "{} - {}: unit cost changed from ${:.2} to ${:.2}",
                    to.trade, to.description, from.unit_cost, to.unit_cost
                ),
                old_value: from.unit_cost.into(),
                new_value: to.unit_cost.into(),
                impact: policy.unit_cost,
            });
        }
        if from.total != to.total {
            out.push(Modification {
                description: format!(
                    "{} - {}: total changed from ${:.2} to ${:.2}",
                    to.trade, to.description, from.total, to.total
                ),
                old_value: from.total.into(),
                new_value: to.total.into(),
                impact: policy.line_total,
            });
        }

        out
    }
}

fn money_change(label: &str, from: f64, to: f64) -> String {
    match percent_change(from, to) {
        Some(pct) => format!("{label} changed from ${from:.2} to ${to:.2} ({pct:+.2}%)"),
        None => format!("{label} changed from ${from:.2} to ${to:.2}"),
    }
}

fn diff_costs(from: &BidCosts, to: &BidCosts, policy: &ImpactPolicy, changes: &mut Vec<Change>) {
    let scalars = [
        ("Total cost", from.total_cost, to.total_cost),
        ("Labor cost", from.labor_cost, to.labor_cost),
        ("Material cost", from.material_cost, to.material_cost),
        ("Final price", from.final_price, to.final_price),
    ];
    for (label, old, new) in scalars {
        if let (Some(old), Some(new)) = (old, new)
            && old != new
        {
            changes.push(Change::modified(
                Category::Cost,
                money_change(label, old, new),
                old.into(),
                new.into(),
                policy.cost,
            ));
        }
    }

    if let (Some(old), Some(new)) = (from.markup_percentage, to.markup_percentage)
        && old != new
    {
        changes.push(Change::modified(
            Category::Terms,
            format!("Markup percentage changed from {old:.2}% to {new:.2}%"),
            old.into(),
            new.into(),
            policy.markup,
        ));
    }
}

fn diff_terms(from: &BidData, to: &BidData, policy: &ImpactPolicy, changes: &mut Vec<Change>) {
    if from.payment_terms != to.payment_terms {
        changes.push(Change::modified(
            Category::Terms,
            "Payment terms changed".into(),
            from.payment_terms.as_str().into(),
            to.payment_terms.as_str().into(),
            policy.payment_terms,
        ));
    }
    if from.warranty_terms != to.warranty_terms {
        changes.push(Change::modified(
            Category::Terms,
            "Warranty terms changed".into(),
            from.warranty_terms.as_str().into(),
            to.warranty_terms.as_str().into(),
            policy.warranty_terms,
        ));
    }

    let lists = [
        ("Inclusion", &from.inclusions, &to.inclusions),
        ("Exclusion", &from.exclusions, &to.exclusions),
    ];
    for (label, old, new) in lists {
        let diff = diff_sets(old, new);
        for entry in diff.added {
            changes.push(Change::added(
                Category::Scope,
                format!("{label} added: {entry}"),
                entry.into(),
                policy.scope_added,
            ));
        }
        for entry in diff.removed {
            changes.push(Change::removed(
                Category::Scope,
                format!("{label} removed: {entry}"),
                entry.into(),
                policy.scope_removed,
            ));
        }
    }
}

impl Payload for BidData {
    const FAMILY: Family = Family::Bid;

    fn diff(
        from: &Revision<Self>,
        to: &Revision<Self>,
        policy: &ImpactPolicy,
        changes: &mut Vec<Change>,
    ) {
        if let (Fingerprint::Costs { costs: old, .. }, Fingerprint::Costs { costs: new, .. }) =
            (&from.fingerprint, &to.fingerprint)
        {
            diff_costs(old, new, policy, changes);
        }

        let empty = BidData::default();
        let from = from.payload.as_ref().unwrap_or(&empty);
        let to = to.payload.as_ref().unwrap_or(&empty);

        diff_records(&from.line_items, &to.line_items, policy, changes);
        diff_terms(from, to, policy, changes);
    }
}
