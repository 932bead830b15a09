//! Versioned record shapes shared by both entity families
use super::bid::{BidCosts, BidStatus};
use super::comparison::{Change, Summary};
use super::error::{Result, RevisionError};
use super::impact::ImpactPolicy;
use super::utils;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer, de::DeserializeOwned};
use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// chrono's `Utc` is not `PartialOrd`, so the derive would never apply
impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl Serialize for TimeStamp<Utc> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    #[n(0)]
    Blueprint,
    #[n(1)]
    Bid,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Blueprint => "blueprint",
            Family::Bid => "bid",
        }
    }
    pub(crate) fn id_prefix(&self) -> &'static str {
        match self {
            Family::Blueprint => utils::BLUEPRINT_HRP,
            Family::Bid => utils::BID_HRP,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The metadata a revision carries besides its payload: file facts for
/// blueprints, cost scalars for bids.
#[derive(minicbor::Encode, minicbor::Decode, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fingerprint {
    #[n(0)]
    File {
        #[n(0)]
        size: Option<u64>,
        #[n(1)]
        mime_type: Option<String>,
    },
    #[n(1)]
    Costs {
        #[n(0)]
        costs: BidCosts,
        #[n(1)]
        status: BidStatus,
    },
}

/// The mutable "current" record that owns a lineage of revisions.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Parent {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub family: Family,
    #[n(2)]
    pub label: String, // filename for blueprints, bid name for bids
    #[n(3)]
    pub fingerprint: Fingerprint,
    #[n(4)]
    pub payload: Option<String>, // JSON as produced upstream
    /// Newest stored revision. Written only by the store, from its own
    /// per-parent head, never taken from a caller's copy.
    #[n(5)]
    pub latest_revision: Option<u32>,
    #[n(6)]
    pub parent_id: Option<String>, // lineage only, never used for comparison
    #[n(7)]
    pub updated_at: TimeStamp<Utc>,
}

impl Parent {
    pub fn new(family: Family, label: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self::new_with(utils::new_id(family.id_prefix()), family, label, fingerprint)
    }
    pub fn new_with(
        id: String,
        family: Family,
        label: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            id,
            family,
            label: label.into(),
            fingerprint,
            payload: None,
            latest_revision: None,
            parent_id: None,
            updated_at: TimeStamp::new(),
        }
    }
    pub fn blueprint(
        filename: impl Into<String>,
        size: Option<u64>,
        mime_type: Option<String>,
    ) -> Self {
        Self::new(Family::Blueprint, filename, Fingerprint::File { size, mime_type })
    }
    pub fn bid(name: impl Into<String>, costs: BidCosts, status: BidStatus) -> Self {
        Self::new(Family::Bid, name, Fingerprint::Costs { costs, status })
    }
    pub fn with_payload<P: Payload>(mut self, payload: &P) -> Result<Self> {
        self.payload = Some(encode_payload(payload)?);
        Ok(self)
    }
    /// Current version, 0 before the first revision.
    pub fn version(&self) -> u32 {
        self.latest_revision.unwrap_or(0)
    }
    /// Whether `version` is the one this parent currently points at. Exactly
    /// one version per lineage answers true once a revision exists.
    pub fn is_latest(&self, version: u32) -> bool {
        self.latest_revision == Some(version)
    }
    /// Moves the current pointer onto a freshly written revision.
    pub fn advance(&mut self, version: u32, at: TimeStamp<Utc>) {
        self.latest_revision = Some(version);
        self.updated_at = at;
    }
}

/// Immutable, stored form of a revision. The payload stays the opaque JSON
/// blob until decoded through [`Revision::decode`].
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct RevisionRow {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub family: Family,
    #[n(2)]
    pub parent_id: String,
    #[n(3)]
    pub version: u32,
    #[n(4)]
    pub label: String,
    #[n(5)]
    pub fingerprint: Fingerprint,
    #[n(6)]
    pub payload: Option<String>,
    #[n(7)]
    pub payload_digest: Option<String>,
    #[n(8)]
    pub changes_summary: Option<Summary>, // against the previous version
    #[n(9)]
    pub created_at: TimeStamp<Utc>,
}

impl RevisionRow {
    /// Snapshot of the parent's current state as revision `version`.
    pub fn snapshot(parent: &Parent, version: u32) -> Self {
        Self {
            id: utils::new_id(utils::REVISION_HRP),
            family: parent.family,
            parent_id: parent.id.clone(),
            version,
            label: parent.label.clone(),
            fingerprint: parent.fingerprint.clone(),
            payload: parent.payload.clone(),
            payload_digest: parent
                .payload
                .as_deref()
                .map(|p| utils::payload_digest(p.as_bytes())),
            changes_summary: None,
            created_at: TimeStamp::new(),
        }
    }
    pub fn with_summary(mut self, summary: Option<Summary>) -> Self {
        self.changes_summary = summary;
        self
    }
}

/// A payload family: the typed shape a revision's JSON blob decodes into,
/// together with the comparison pipeline for that shape.
pub trait Payload: Serialize + DeserializeOwned + Default + fmt::Debug {
    const FAMILY: Family;

    /// Appends every difference between `from` and `to` to `changes`.
    fn diff(
        from: &Revision<Self>,
        to: &Revision<Self>,
        policy: &ImpactPolicy,
        changes: &mut Vec<Change>,
    );
}

pub(crate) fn encode_payload<P: Payload>(payload: &P) -> Result<String> {
    serde_json::to_string(payload).map_err(|e| RevisionError::Encode(e.to_string()))
}

/// A decoded revision snapshot.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Revision<P> {
    pub id: String,
    pub parent_id: String,
    pub version: u32,
    pub label: String,
    pub fingerprint: Fingerprint,
    pub payload: Option<P>,
    pub payload_digest: Option<String>,
    pub changes_summary: Option<Summary>,
    pub created_at: TimeStamp<Utc>,
}

impl<P: Payload> Revision<P> {
    pub fn decode(row: RevisionRow) -> Result<Self> {
        if row.family != P::FAMILY {
            return Err(RevisionError::FamilyMismatch {
                expected: P::FAMILY,
                found: row.family,
            });
        }
        let payload = match row.payload.as_deref() {
            Some(json) => Some(serde_json::from_str::<P>(json).map_err(|source| {
                RevisionError::MalformedPayload {
                    family: row.family,
                    parent_id: row.parent_id.clone(),
                    version: row.version,
                    source,
                }
            })?),
            None => None,
        };

        Ok(Self {
            id: row.id,
            parent_id: row.parent_id,
            version: row.version,
            label: row.label,
            fingerprint: row.fingerprint,
            payload,
            payload_digest: row.payload_digest,
            changes_summary: row.changes_summary,
            created_at: row.created_at,
        })
    }
}

/// Listing view of a revision, no payload decoding involved.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RevisionSummary {
    pub version: u32,
    pub label: String,
    pub created_at: TimeStamp<Utc>,
    pub fingerprint: Fingerprint,
    pub payload_digest: Option<String>,
    pub has_changes: Option<bool>,
}

impl From<&RevisionRow> for RevisionSummary {
    fn from(row: &RevisionRow) -> Self {
        Self {
            version: row.version,
            label: row.label.clone(),
            created_at: row.created_at.clone(),
            fingerprint: row.fingerprint.clone(),
            payload_digest: row.payload_digest.clone(),
            has_changes: row.changes_summary.as_ref().map(|s| s.total_changes > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn pointer_fields_agree() {
        let mut parent = Parent::blueprint("plan.pdf", Some(1024), None);
        assert_eq!(parent.version(), 0);
        assert!(!parent.is_latest(1));

        parent.advance(1, TimeStamp::new());
        assert_eq!(parent.version(), 1);
        assert!(parent.is_latest(1));

        parent.advance(2, TimeStamp::new());
        assert!(parent.is_latest(2));
        assert!(!parent.is_latest(1));
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2024, 1, 1, 9, 0, 0).unwrap();
        let later = TimeStamp::new_with(2024, 1, 1, 9, 0, 1).unwrap();

        assert!(earlier < later);
        assert_eq!(earlier.clone().max(later.clone()), later);
    }

    #[test]
    fn absent_payload_decodes_to_none() {
        let parent = Parent::blueprint("plan.pdf", None, None);
        let row = RevisionRow::snapshot(&parent, 1);
        assert!(row.payload_digest.is_none());

        let revision = Revision::<AnalysisResult>::decode(row).unwrap();
        assert!(revision.payload.is_none());
    }

    #[test]
    fn garbage_payload_is_malformed() {
        let mut parent = Parent::blueprint("plan.pdf", None, None);
        parent.payload = Some("{\"rooms\": 12}".into());
        let row = RevisionRow::snapshot(&parent, 3);

        let err = Revision::<AnalysisResult>::decode(row).unwrap_err();
        assert!(matches!(
            err,
            RevisionError::MalformedPayload { version: 3, .. }
        ));
    }

    #[test]
    fn bid_row_is_not_a_blueprint() {
        let parent = Parent::bid("Office", BidCosts::default(), BidStatus::Draft);
        let row = RevisionRow::snapshot(&parent, 1);

        let err = Revision::<AnalysisResult>::decode(row).unwrap_err();
        assert!(matches!(err, RevisionError::FamilyMismatch { .. }));
    }
}
