//! Service layer API for the revision lifecycle
use super::analysis::AnalysisResult;
use super::bid::{BidCosts, BidData, BidStatus};
use super::comparison::{ComparisonResult, Summary, compare, compare_checked};
use super::config::Config;
use super::error::Result;
use super::impact::ImpactPolicy;
use super::record::{
    Family, Fingerprint, Parent, Payload, Revision, RevisionRow, RevisionSummary, encode_payload,
};
use super::store::{RevisionStore, SledStore};
use tracing::{debug, info, warn};

pub struct RevisionService<S> {
    store: S,
    policy: ImpactPolicy,
}

impl RevisionService<SledStore> {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_policy(
            SledStore::open_with(config)?,
            config.impact.clone(),
        ))
    }
}

impl<S: RevisionStore> RevisionService<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ImpactPolicy::default())
    }
    pub fn with_policy(store: S, policy: ImpactPolicy) -> Self {
        Self { store, policy }
    }
    pub fn store(&self) -> &S {
        &self.store
    }
    pub fn policy(&self) -> &ImpactPolicy {
        &self.policy
    }

    /// Stores a parent. A new one owns no revisions until the first
    /// [`create_revision`](Self::create_revision); re-registering keeps the
    /// stored revision pointer.
    pub fn register(&self, parent: Parent) -> Result<Parent> {
        self.store.put_parent(&parent)?;
        info!(family = %parent.family, parent_id = %parent.id, label = %parent.label, "registered parent");
        Ok(parent)
    }

    pub fn register_blueprint(
        &self,
        filename: &str,
        size: Option<u64>,
        mime_type: Option<String>,
    ) -> Result<Parent> {
        self.register(Parent::blueprint(filename, size, mime_type))
    }

    pub fn register_bid(&self, name: &str, costs: BidCosts, status: BidStatus) -> Result<Parent> {
        self.register(Parent::bid(name, costs, status))
    }

    /// Snapshots the parent's current state as a new revision.
    ///
    /// Every call mints a new version, unchanged payload or not. The only
    /// failure a caller should expect is an unknown parent.
    pub fn create_revision(&self, family: Family, parent_id: &str) -> Result<RevisionRow> {
        self.mint(family, parent_id, &|_| {})
    }

    /// Replaces a blueprint's analysis and snapshots it.
    pub fn record_analysis(
        &self,
        blueprint_id: &str,
        analysis: &AnalysisResult,
    ) -> Result<Revision<AnalysisResult>> {
        let json = encode_payload(analysis)?;
        let row = self.mint(Family::Blueprint, blueprint_id, &|parent| {
            parent.payload = Some(json.clone());
        })?;

        Revision::decode(row)
    }

    /// Replaces a bid's pricing and cost scalars and snapshots them. The bid
    /// status is kept.
    pub fn record_pricing(
        &self,
        bid_id: &str,
        costs: BidCosts,
        bid: &BidData,
    ) -> Result<Revision<BidData>> {
        let json = encode_payload(bid)?;
        let row = self.mint(Family::Bid, bid_id, &|parent| {
            let status = match &parent.fingerprint {
                Fingerprint::Costs { status, .. } => *status,
                Fingerprint::File { .. } => BidStatus::default(),
            };
            parent.fingerprint = Fingerprint::Costs {
                costs: costs.clone(),
                status,
            };
            parent.payload = Some(json.clone());
        })?;

        Revision::decode(row)
    }

    /// Moves a bid to `status` without minting a revision; the next revision
    /// picks it up.
    pub fn set_bid_status(&self, bid_id: &str, status: BidStatus) -> Result<Parent> {
        let parent = self.store.update_parent(Family::Bid, bid_id, &|parent| {
            let costs = match &parent.fingerprint {
                Fingerprint::Costs { costs, .. } => costs.clone(),
                Fingerprint::File { .. } => BidCosts::default(),
            };
            parent.fingerprint = Fingerprint::Costs { costs, status };
        })?;

        debug!(parent_id = %bid_id, ?status, "bid status updated");
        Ok(parent)
    }

    pub fn parent(&self, family: Family, parent_id: &str) -> Result<Parent> {
        self.store.parent(family, parent_id)
    }

    /// Every revision of a parent, newest first.
    pub fn revisions<P: Payload>(&self, parent_id: &str) -> Result<Vec<Revision<P>>> {
        self.store
            .rows(P::FAMILY, parent_id)?
            .into_iter()
            .map(Revision::decode)
            .collect()
    }

    pub fn revision<P: Payload>(&self, parent_id: &str, version: u32) -> Result<Revision<P>> {
        Revision::decode(self.store.row(P::FAMILY, parent_id, version)?)
    }

    /// The revision the parent currently points at, `None` before the first.
    pub fn latest<P: Payload>(&self, parent_id: &str) -> Result<Option<Revision<P>>> {
        let parent = self.store.parent(P::FAMILY, parent_id)?;
        match parent.latest_revision {
            Some(version) => Ok(Some(self.revision(parent_id, version)?)),
            None => Ok(None),
        }
    }

    /// Listing view, newest first, without decoding payloads.
    pub fn summaries(&self, family: Family, parent_id: &str) -> Result<Vec<RevisionSummary>> {
        Ok(self
            .store
            .rows(family, parent_id)?
            .iter()
            .map(RevisionSummary::from)
            .collect())
    }

    /// Compares two versions of one parent. Either payload failing to decode
    /// aborts the comparison.
    pub fn compare<P: Payload>(
        &self,
        parent_id: &str,
        from_version: u32,
        to_version: u32,
    ) -> Result<ComparisonResult> {
        let from = self.revision::<P>(parent_id, from_version)?;
        let to = self.revision::<P>(parent_id, to_version)?;

        let result = compare(&from, &to, &self.policy);
        let family = P::FAMILY;
        debug!(
            %family,
            parent_id,
            from_version,
            to_version,
            changes = result.summary.total_changes,
            high_impact = result.summary.high_impact_count,
            "compared revisions"
        );

        Ok(result)
    }

    fn mint(
        &self,
        family: Family,
        parent_id: &str,
        update: &dyn Fn(&mut Parent),
    ) -> Result<RevisionRow> {
        let policy = &self.policy;
        let row = self
            .store
            .append(family, parent_id, &|parent, version, previous| {
                update(parent);
                let row = RevisionRow::snapshot(parent, version);
                let summary = previous.and_then(|previous| {
                    match change_summary(family, previous, &row, policy) {
                        Ok(summary) => Some(summary),
                        Err(err) => {
                            warn!(%family, parent_id, version, error = %err, "change summary unavailable");
                            None
                        }
                    }
                });
                row.with_summary(summary)
            })?;

        info!(%family, parent_id, version = row.version, "created revision");
        Ok(row)
    }
}

fn change_summary(
    family: Family,
    previous: &RevisionRow,
    row: &RevisionRow,
    policy: &ImpactPolicy,
) -> Result<Summary> {
    match family {
        Family::Blueprint => summarize::<AnalysisResult>(previous, row, policy),
        Family::Bid => summarize::<BidData>(previous, row, policy),
    }
}

fn summarize<P: Payload>(
    previous: &RevisionRow,
    row: &RevisionRow,
    policy: &ImpactPolicy,
) -> Result<Summary> {
    let from = Revision::<P>::decode(previous.clone())?;
    let to = Revision::<P>::decode(row.clone())?;

    Ok(compare_checked(&from, &to, policy)?.summary)
}
