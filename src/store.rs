//! Revision persistence: the store contract and its sled implementation
use super::config::Config;
use super::error::{Result, RevisionError};
use super::record::{Family, Parent, RevisionRow, TimeStamp};
use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use std::path::Path;
use std::sync::Arc;

/// Builds the row for a new revision. Receives the parent (which it may
/// update, e.g. with a fresh payload), the version being minted, and the
/// latest existing row if there is one.
pub type Mint<'a> = dyn Fn(&mut Parent, u32, Option<&RevisionRow>) -> RevisionRow + 'a;

pub trait RevisionStore: Send + Sync {
    fn parent(&self, family: Family, parent_id: &str) -> Result<Parent>;
    /// Stores a parent as given, except `latest_revision`, which always
    /// reflects the revisions actually stored.
    fn put_parent(&self, parent: &Parent) -> Result<()>;
    /// Atomic read-modify-write of a stored parent. The pointer fields follow
    /// the same rule as [`put_parent`](Self::put_parent).
    fn update_parent(
        &self,
        family: Family,
        parent_id: &str,
        update: &dyn Fn(&mut Parent),
    ) -> Result<Parent>;
    /// All revisions of a parent, newest first.
    fn rows(&self, family: Family, parent_id: &str) -> Result<Vec<RevisionRow>>;
    fn row(&self, family: Family, parent_id: &str, version: u32) -> Result<RevisionRow>;
    /// Writes revision `max stored version + 1` and moves the parent's pointer
    /// to it as one atomic unit. Concurrent appends for one parent never share
    /// a version.
    fn append(&self, family: Family, parent_id: &str, mint: &Mint<'_>) -> Result<RevisionRow>;
}

// parent id, a NUL separator, then the version big-endian so a prefix scan
// walks versions in ascending order
pub(crate) fn revision_key(parent_id: &str, version: u32) -> Vec<u8> {
    let mut key = revision_prefix(parent_id);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

pub(crate) fn revision_prefix(parent_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(parent_id.len() + 5);
    key.extend_from_slice(parent_id.as_bytes());
    key.push(0);
    key
}

pub struct SledStore {
    instance: Arc<sled::Db>,
    blueprints: sled::Tree,
    bids: sled::Tree,
    blueprint_revisions: sled::Tree,
    bid_revisions: sled::Tree,
    // parent id -> highest stored version, written only by `append`
    blueprint_heads: sled::Tree,
    bid_heads: sled::Tree,
}

struct Trees<'a> {
    parents: &'a sled::Tree,
    revisions: &'a sled::Tree,
    heads: &'a sled::Tree,
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        Ok(Self {
            blueprints: instance.open_tree("blueprints")?,
            bids: instance.open_tree("bids")?,
            blueprint_revisions: instance.open_tree("blueprint_revisions")?,
            bid_revisions: instance.open_tree("bid_revisions")?,
            blueprint_heads: instance.open_tree("blueprint_heads")?,
            bid_heads: instance.open_tree("bid_heads")?,
            instance,
        })
    }
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Arc::new(sled::open(path)?))
    }
    pub fn open_with(config: &Config) -> Result<Self> {
        Self::open(&config.db_path)
    }
    pub fn flush(&self) -> Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    fn trees(&self, family: Family) -> Trees<'_> {
        match family {
            Family::Blueprint => Trees {
                parents: &self.blueprints,
                revisions: &self.blueprint_revisions,
                heads: &self.blueprint_heads,
            },
            Family::Bid => Trees {
                parents: &self.bids,
                revisions: &self.bid_revisions,
                heads: &self.bid_heads,
            },
        }
    }
}

type TxResult<T> = ConflictableTransactionResult<T, RevisionError>;

fn abort(err: impl Into<RevisionError>) -> ConflictableTransactionError<RevisionError> {
    ConflictableTransactionError::Abort(err.into())
}

fn unwrap_tx(err: TransactionError<RevisionError>) -> RevisionError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => RevisionError::Storage(err),
    }
}

fn read_head(heads: &TransactionalTree, parent_id: &str) -> TxResult<Option<u32>> {
    Ok(heads
        .get(parent_id.as_bytes())?
        .and_then(|raw| <[u8; 4]>::try_from(raw.as_ref()).ok())
        .map(u32::from_be_bytes))
}

fn read_parent(parents: &TransactionalTree, family: Family, parent_id: &str) -> TxResult<Parent> {
    let raw = parents.get(parent_id.as_bytes())?.ok_or_else(|| {
        abort(RevisionError::ParentNotFound {
            family,
            parent_id: parent_id.to_owned(),
        })
    })?;
    minicbor::decode(&raw).map_err(abort)
}

fn write_parent(parents: &TransactionalTree, parent_id: &str, parent: &Parent) -> TxResult<()> {
    parents.insert(parent_id.as_bytes(), minicbor::to_vec(parent).map_err(abort)?)?;
    Ok(())
}

fn append_in(
    parents: &TransactionalTree,
    revisions: &TransactionalTree,
    heads: &TransactionalTree,
    family: Family,
    parent_id: &str,
    mint: &Mint<'_>,
) -> TxResult<RevisionRow> {
    let mut parent = read_parent(parents, family, parent_id)?;

    let head = read_head(heads, parent_id)?;
    let previous = match head {
        Some(latest) => {
            let raw = revisions
                .get(revision_key(parent_id, latest))?
                .ok_or_else(|| {
                    abort(RevisionError::RevisionNotFound {
                        family,
                        parent_id: parent_id.to_owned(),
                        version: latest,
                    })
                })?;
            Some(minicbor::decode::<RevisionRow>(&raw).map_err(abort)?)
        }
        None => None,
    };

    let version = head.map_or(1, |v| v + 1);
    let key = revision_key(parent_id, version);
    if revisions.get(&key)?.is_some() {
        return Err(abort(RevisionError::VersionConflict {
            family,
            parent_id: parent_id.to_owned(),
            version,
        }));
    }

    let row = mint(&mut parent, version, previous.as_ref());
    parent.advance(version, row.created_at.clone());

    revisions.insert(key, minicbor::to_vec(&row).map_err(abort)?)?;
    heads.insert(parent_id.as_bytes(), &version.to_be_bytes()[..])?;
    write_parent(parents, parent_id, &parent)?;

    Ok(row)
}

impl RevisionStore for SledStore {
    fn parent(&self, family: Family, parent_id: &str) -> Result<Parent> {
        let raw = self
            .trees(family)
            .parents
            .get(parent_id.as_bytes())?
            .ok_or_else(|| RevisionError::ParentNotFound {
                family,
                parent_id: parent_id.to_owned(),
            })?;

        Ok(minicbor::decode(&raw)?)
    }

    fn put_parent(&self, parent: &Parent) -> Result<()> {
        let trees = self.trees(parent.family);
        (trees.parents, trees.heads)
            .transaction(|(parents, heads)| -> TxResult<()> {
                let mut stored = parent.clone();
                stored.latest_revision = read_head(heads, &parent.id)?;
                write_parent(parents, &parent.id, &stored)
            })
            .map_err(unwrap_tx)
    }

    fn update_parent(
        &self,
        family: Family,
        parent_id: &str,
        update: &dyn Fn(&mut Parent),
    ) -> Result<Parent> {
        let trees = self.trees(family);
        (trees.parents, trees.heads)
            .transaction(|(parents, heads)| -> TxResult<Parent> {
                let mut parent = read_parent(parents, family, parent_id)?;
                update(&mut parent);
                parent.latest_revision = read_head(heads, parent_id)?;
                parent.updated_at = TimeStamp::new();
                write_parent(parents, parent_id, &parent)?;
                Ok(parent)
            })
            .map_err(unwrap_tx)
    }

    fn rows(&self, family: Family, parent_id: &str) -> Result<Vec<RevisionRow>> {
        // an unknown parent is not the same as one without revisions
        self.parent(family, parent_id)?;

        self.trees(family)
            .revisions
            .scan_prefix(revision_prefix(parent_id))
            .rev()
            .map(|entry| -> Result<RevisionRow> {
                let (_, raw) = entry?;
                Ok(minicbor::decode(&raw)?)
            })
            .collect()
    }

    fn row(&self, family: Family, parent_id: &str, version: u32) -> Result<RevisionRow> {
        let raw = self
            .trees(family)
            .revisions
            .get(revision_key(parent_id, version))?
            .ok_or_else(|| RevisionError::RevisionNotFound {
                family,
                parent_id: parent_id.to_owned(),
                version,
            })?;

        Ok(minicbor::decode(&raw)?)
    }

    fn append(&self, family: Family, parent_id: &str, mint: &Mint<'_>) -> Result<RevisionRow> {
        let trees = self.trees(family);

        // sled retries the closure on conflict, so it only reads and writes
        // through the transactional trees
        (trees.parents, trees.revisions, trees.heads)
            .transaction(|(parents, revisions, heads)| {
                append_in(parents, revisions, heads, family, parent_id, mint)
            })
            .map_err(unwrap_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_version() {
        let low = revision_key("bp1abc", 2);
        let high = revision_key("bp1abc", 10);
        assert!(low < high);
        assert!(low.starts_with(&revision_prefix("bp1abc")));
        // a parent whose id extends another's never shares its prefix
        assert!(!revision_key("bp1abcd", 1).starts_with(&revision_prefix("bp1abc")));
    }
}
