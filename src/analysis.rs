//! Blueprint analysis payload as returned by the extraction provider
use super::comparison::{Category, Change};
use super::diff::{Modification, Record, diff_records};
use super::impact::{ImpactPolicy, KindImpacts};
use super::record::{Family, Payload, Revision};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Room {
    pub name: String,
    pub dimensions: String, // label such as "20x15"
    pub area: f64,          // square feet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Opening {
    pub opening_type: String, // door, window
    pub count: u32,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Fixture {
    pub fixture_type: String,
    pub category: String, // plumbing, electrical, hvac
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub measurement_type: String,
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub material_name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisResult {
    pub blueprint_id: String,
    pub status: String,
    pub rooms: Vec<Room>,
    pub openings: Vec<Opening>,
    pub fixtures: Vec<Fixture>,
    pub measurements: Vec<Measurement>,
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_ocr_text: Option<String>,
    pub confidence_score: f64,
    pub processing_time_ms: u64,
}

impl Room {
    pub fn new(name: &str, dimensions: &str, area: f64) -> Self {
        Self {
            name: name.into(),
            dimensions: dimensions.into(),
            area,
            room_type: None,
        }
    }
}

impl Opening {
    pub fn new(opening_type: &str, size: &str, count: u32) -> Self {
        Self {
            opening_type: opening_type.into(),
            count,
            size: size.into(),
            details: None,
        }
    }
}

impl Fixture {
    pub fn new(category: &str, fixture_type: &str, count: u32) -> Self {
        Self {
            fixture_type: fixture_type.into(),
            category: category.into(),
            count,
            details: None,
        }
    }
}

impl Measurement {
    pub fn new(measurement_type: &str, value: f64, unit: &str) -> Self {
        Self {
            measurement_type: measurement_type.into(),
            value,
            unit: unit.into(),
            location: None,
        }
    }
    pub fn at(mut self, location: &str) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl Material {
    pub fn new(material_name: &str, quantity: f64, unit: &str) -> Self {
        Self {
            material_name: material_name.into(),
            quantity,
            unit: unit.into(),
            specifications: None,
        }
    }
}

impl Record for Room {
    type Key = String;
    const CATEGORY: Category = Category::Room;

    fn key(&self) -> String {
        self.name.clone()
    }
    fn impacts(policy: &ImpactPolicy) -> KindImpacts {
        policy.room
    }
    fn describe_added(&self) -> String {
        format!(
            "Room '{}' added with dimensions {} ({:.2} SF)",
            self.name, self.dimensions, self.area
        )
    }
    fn describe_removed(&self) -> String {
        format!(
            "Room '{}' removed (was {}, {:.2} SF)",
            self.name, self.dimensions, self.area
        )
    }
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification> {
        if from.area == to.area && from.dimensions == to.dimensions {
            return vec![];
        }
        vec![Modification {
            description: format!(
                "Room '{}' dimensions changed from {} ({:.2} SF) to {} ({:.2} SF)",
                to.name, from.dimensions, from.area, to.dimensions, to.area
            ),
            old_value: from.clone().into(),
            new_value: to.clone().into(),
            impact: policy.score(from.area, to.area, policy.room.modified),
        }]
    }
}

impl Record for Opening {
    type Key = (String, String);
    const CATEGORY: Category = Category::Opening;

    fn key(&self) -> Self::Key {
        (self.opening_type.clone(), self.size.clone())
    }
    fn impacts(policy: &ImpactPolicy) -> KindImpacts {
        policy.opening
    }
    fn describe_added(&self) -> String {
        format!(
            "{} ({}) added, count: {}",
            self.opening_type, self.size, self.count
        )
    }
    fn describe_removed(&self) -> String {
        format!(
            "{} ({}) removed, was count: {}",
            self.opening_type, self.size, self.count
        )
    }
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification> {
        if from.count == to.count {
            return vec![];
        }
        vec![Modification {
            description: format!(
                "{} ({}) count changed from {} to {}",
                to.opening_type, to.size, from.count, to.count
            ),
            old_value: from.clone().into(),
            new_value: to.clone().into(),
            impact: policy.score(
                f64::from(from.count),
                f64::from(to.count),
                policy.opening.modified,
            ),
        }]
    }
}

impl Record for Fixture {
    type Key = (String, String);
    const CATEGORY: Category = Category::Fixture;

    fn key(&self) -> Self::Key {
        (self.category.clone(), self.fixture_type.clone())
    }
    fn impacts(policy: &ImpactPolicy) -> KindImpacts {
        policy.fixture
    }
    fn describe_added(&self) -> String {
        format!(
            "{} {} added, count: {}",
            self.category, self.fixture_type, self.count
        )
    }
    fn describe_removed(&self) -> String {
        format!(
            "{} {} removed, was count: {}",
            self.category, self.fixture_type, self.count
        )
    }
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification> {
        if from.count == to.count {
            return vec![];
        }
        vec![Modification {
            description: format!(
                "{} {} count changed from {} to {}",
                to.category, to.fixture_type, from.count, to.count
            ),
            old_value: from.clone().into(),
            new_value: to.clone().into(),
            impact: policy.score(
                f64::from(from.count),
                f64::from(to.count),
                policy.fixture.modified,
            ),
        }]
    }
}

impl Record for Measurement {
    // location only joins the key when present
    type Key = (String, Option<String>);
    const CATEGORY: Category = Category::Measurement;

    fn key(&self) -> Self::Key {
        (self.measurement_type.clone(), self.location.clone())
    }
    fn impacts(policy: &ImpactPolicy) -> KindImpacts {
        policy.measurement
    }
    fn describe_added(&self) -> String {
        format!(
            "{} added: {:.2} {}",
            self.measurement_type, self.value, self.unit
        )
    }
    fn describe_removed(&self) -> String {
        format!(
            "{} removed, was: {:.2} {}",
            self.measurement_type, self.value, self.unit
        )
    }
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification> {
        if from.value == to.value {
            return vec![];
        }
        vec![Modification {
            description: format!(
                "{} changed from {:.2} {} to {:.2} {}",
                to.measurement_type, from.value, from.unit, to.value, to.unit
            ),
            old_value: from.clone().into(),
            new_value: to.clone().into(),
            impact: policy.score(from.value, to.value, policy.measurement.modified),
        }]
    }
}

impl Record for Material {
    type Key = String;
    const CATEGORY: Category = Category::Material;

    fn key(&self) -> String {
        self.material_name.clone()
    }
    fn impacts(policy: &ImpactPolicy) -> KindImpacts {
        policy.material
    }
    fn describe_added(&self) -> String {
        format!(
            "{} added: {:.2} {}",
            self.material_name, self.quantity, self.unit
        )
    }
    fn describe_removed(&self) -> String {
        format!(
            "{} removed, was: {:.2} {}",
            self.material_name, self.quantity, self.unit
        )
    }
    fn modifications(from: &Self, to: &Self, policy: &ImpactPolicy) -> Vec<Modification> {
        if from.quantity == to.quantity {
            return vec![];
        }
        vec![Modification {
            description: format!(
                "{} quantity changed from {:.2} {} to {:.2} {}",
                to.material_name, from.quantity, from.unit, to.quantity, to.unit
            ),
            old_value: from.clone().into(),
            new_value: to.clone().into(),
            impact: policy.score(from.quantity, to.quantity, policy.material.modified),
        }]
    }
}

impl Payload for AnalysisResult {
    const FAMILY: Family = Family::Blueprint;

    fn diff(
        from: &Revision<Self>,
        to: &Revision<Self>,
        policy: &ImpactPolicy,
        changes: &mut Vec<Change>,
    ) {
        let empty = AnalysisResult::default();
        let from = from.payload.as_ref().unwrap_or(&empty);
        let to = to.payload.as_ref().unwrap_or(&empty);

        diff_records(&from.rooms, &to.rooms, policy, changes);
        diff_records(&from.openings, &to.openings, policy, changes);
        diff_records(&from.fixtures, &to.fixtures, policy, changes);
        diff_records(&from.measurements, &to.measurements, policy, changes);
        diff_records(&from.materials, &to.materials, policy, changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{ChangeType, compare};
    use crate::impact::Impact;
    use crate::record::{Fingerprint, TimeStamp};

    fn revision(version: u32, payload: Option<AnalysisResult>) -> Revision<AnalysisResult> {
        Revision {
            id: format!("rev_{version}"),
            parent_id: "bp_test".into(),
            version,
            label: format!("blueprint_v{version}.pdf"),
            fingerprint: Fingerprint::File {
                size: None,
                mime_type: None,
            },
            payload,
            payload_digest: None,
            changes_summary: None,
            created_at: TimeStamp::new(),
        }
    }

    #[test]
    fn opening_and_fixture_additions_are_low() {
        let from = revision(1, None);
        let to = revision(
            2,
            Some(AnalysisResult {
                openings: vec![Opening::new("door", "36x80", 4)],
                fixtures: vec![Fixture::new("plumbing", "sink", 2)],
                ..AnalysisResult::default()
            }),
        );

        let result = compare(&from, &to, &ImpactPolicy::default());
        assert_eq!(result.summary.added_count, 2);
        assert!(result.changes.iter().all(|c| c.impact == Impact::Low));
    }

    #[test]
    fn removals_follow_kind_defaults() {
        let from = revision(
            1,
            Some(AnalysisResult {
                rooms: vec![Room::new("Den", "10x10", 100.0)],
                measurements: vec![Measurement::new("perimeter", 40.0, "LF")],
                materials: vec![Material::new("Drywall", 10.0, "sheet")],
                ..AnalysisResult::default()
            }),
        );
        let to = revision(2, Some(AnalysisResult::default()));

        let result = compare(&from, &to, &ImpactPolicy::default());
        let impact_of = |category| {
            result
                .changes_in(category)
                .map(|c| (c.change_type, c.impact))
                .next()
        };
        assert_eq!(
            impact_of(Category::Room),
            Some((ChangeType::Removed, Impact::High))
        );
        assert_eq!(
            impact_of(Category::Measurement),
            Some((ChangeType::Removed, Impact::Medium))
        );
        assert_eq!(
            impact_of(Category::Material),
            Some((ChangeType::Removed, Impact::Medium))
        );
    }

    #[test]
    fn measurement_key_includes_location() {
        let from = revision(
            1,
            Some(AnalysisResult {
                measurements: vec![Measurement::new("ceiling_height", 9.0, "FT").at("Kitchen")],
                ..AnalysisResult::default()
            }),
        );
        let to = revision(
            2,
            Some(AnalysisResult {
                measurements: vec![
                    Measurement::new("ceiling_height", 9.0, "FT").at("Kitchen"),
                    Measurement::new("ceiling_height", 8.0, "FT"),
                ],
                ..AnalysisResult::default()
            }),
        );

        let result = compare(&from, &to, &ImpactPolicy::default());
        assert_eq!(result.summary.total_changes, 1);
        assert_eq!(result.changes[0].change_type, ChangeType::Added);
        assert_eq!(result.changes[0].impact, Impact::Medium);
    }

    #[test]
    fn dimension_relabel_without_area_change_is_medium() {
        let from = revision(
            1,
            Some(AnalysisResult {
                rooms: vec![Room::new("Office", "10x12", 120.0)],
                ..AnalysisResult::default()
            }),
        );
        let to = revision(
            2,
            Some(AnalysisResult {
                rooms: vec![Room::new("Office", "12x10", 120.0)],
                ..AnalysisResult::default()
            }),
        );

        let result = compare(&from, &to, &ImpactPolicy::default());
        assert_eq!(result.summary.modified_count, 1);
        assert_eq!(result.changes[0].impact, Impact::Medium);
    }

    #[test]
    fn fixture_count_jump_is_high() {
        let from = revision(
            1,
            Some(AnalysisResult {
                fixtures: vec![Fixture::new("electrical", "outlet", 10)],
                ..AnalysisResult::default()
            }),
        );
        let to = revision(
            2,
            Some(AnalysisResult {
                fixtures: vec![Fixture::new("electrical", "outlet", 11)],
                ..AnalysisResult::default()
            }),
        );
        let bigger = revision(
            3,
            Some(AnalysisResult {
                fixtures: vec![Fixture::new("electrical", "outlet", 20)],
                ..AnalysisResult::default()
            }),
        );

        let policy = ImpactPolicy::default();
        assert_eq!(compare(&from, &to, &policy).changes[0].impact, Impact::Low);
        assert_eq!(compare(&from, &bigger, &policy).changes[0].impact, Impact::High);
    }

    #[test]
    fn openings_are_keyed_by_type_and_size() {
        let from = revision(
            1,
            Some(AnalysisResult {
                openings: vec![Opening::new("door", "36x80", 2)],
                ..AnalysisResult::default()
            }),
        );
        let to = revision(
            2,
            Some(AnalysisResult {
                openings: vec![Opening::new("door", "32x80", 2)],
                ..AnalysisResult::default()
            }),
        );

        let result = compare(&from, &to, &ImpactPolicy::default());
        assert_eq!(result.summary.added_count, 1);
        assert_eq!(result.summary.removed_count, 1);
        assert_eq!(result.summary.modified_count, 0);
        assert_eq!(result.changes[0].description, "door (32x80) added, count: 2");
        assert_eq!(result.changes[1].description, "door (36x80) removed, was count: 2");
        assert!(result.changes.iter().all(|c| c.impact == Impact::Low));
    }

    #[test]
    fn small_count_changes_stay_low() {
        let from = revision(
            1,
            Some(AnalysisResult {
                openings: vec![Opening::new("window", "3x4", 10)],
                fixtures: vec![Fixture::new("plumbing", "toilet", 5)],
                ..AnalysisResult::default()
            }),
        );
        let to = revision(
            2,
            Some(AnalysisResult {
                openings: vec![Opening::new("window", "3x4", 11)],
                fixtures: vec![Fixture::new("plumbing", "toilet", 6)],
                ..AnalysisResult::default()
            }),
        );

        let result = compare(&from, &to, &ImpactPolicy::default());
        assert_eq!(result.summary.modified_count, 2);
        assert_eq!(result.summary.high_impact_count, 0);
        assert!(result.changes.iter().all(|c| c.impact == Impact::Low));
    }

    #[test]
    fn reversed_comparison_reads_from_then_to() {
        let older = revision(
            1,
            Some(AnalysisResult {
                rooms: vec![Room::new("Living Room", "20x15", 300.0)],
                ..AnalysisResult::default()
            }),
        );
        let newer = revision(
            2,
            Some(AnalysisResult {
                rooms: vec![
                    Room::new("Living Room", "25x15", 375.0),
                    Room::new("Kitchen", "15x12", 180.0),
                ],
                ..AnalysisResult::default()
            }),
        );

        let result = compare(&newer, &older, &ImpactPolicy::default());
        assert_eq!((result.from_version, result.to_version), (2, 1));

        let living = result
            .changes
            .iter()
            .find(|c| c.change_type == ChangeType::Modified)
            .unwrap();
        assert_eq!(
            living.description,
            "Room 'Living Room' dimensions changed from 25x15 (375.00 SF) to 20x15 (300.00 SF)"
        );
        // 75 of 375 is exactly the threshold
        assert_eq!(living.impact, Impact::Medium);

        let kitchen = result
            .changes
            .iter()
            .find(|c| c.change_type == ChangeType::Removed)
            .unwrap();
        assert_eq!(kitchen.description, "Room 'Kitchen' removed (was 15x12, 180.00 SF)");
        assert_eq!(kitchen.impact, Impact::High);
    }

    #[test]
    fn missing_sections_decode_as_empty() {
        let parsed: AnalysisResult =
            serde_json::from_str(r#"{"rooms":[{"name":"Den","dimensions":"10x10","area":100}]}"#)
                .unwrap();
        assert_eq!(parsed.rooms.len(), 1);
        assert!(parsed.materials.is_empty());
    }
}
