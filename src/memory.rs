//! In-process [`RevisionStore`] with the same append semantics as the sled
//! store. Used by tests and by callers that do not need durability.
use super::error::{Result, RevisionError};
use super::record::{Family, Parent, RevisionRow, TimeStamp};
use super::store::{Mint, RevisionStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    parents: HashMap<(Family, String), Parent>,
    rows: BTreeMap<(Family, String, u32), RevisionRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a row as is, without touching the parent. Later appends number
    /// after it.
    pub fn insert_row(&self, row: RevisionRow) -> Result<()> {
        let mut tables = self.lock()?;
        tables
            .rows
            .insert((row.family, row.parent_id.clone(), row.version), row);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner.lock().map_err(|_| RevisionError::Poisoned)
    }
}

impl Tables {
    fn parent(&self, family: Family, parent_id: &str) -> Result<&Parent> {
        self.parents
            .get(&(family, parent_id.to_owned()))
            .ok_or_else(|| RevisionError::ParentNotFound {
                family,
                parent_id: parent_id.to_owned(),
            })
    }

    fn row(&self, family: Family, parent_id: &str, version: u32) -> Result<&RevisionRow> {
        self.rows
            .get(&(family, parent_id.to_owned(), version))
            .ok_or_else(|| RevisionError::RevisionNotFound {
                family,
                parent_id: parent_id.to_owned(),
                version,
            })
    }

    fn lineage(
        &self,
        family: Family,
        parent_id: &str,
    ) -> impl DoubleEndedIterator<Item = &RevisionRow> {
        let start = (family, parent_id.to_owned(), 0);
        let end = (family, parent_id.to_owned(), u32::MAX);
        self.rows.range(start..=end).map(|(_, row)| row)
    }

    fn newest(&self, family: Family, parent_id: &str) -> Option<&RevisionRow> {
        self.lineage(family, parent_id).next_back()
    }

    fn store_parent(&mut self, mut parent: Parent) {
        parent.latest_revision = self
            .newest(parent.family, &parent.id)
            .map(|row| row.version);
        self.parents.insert((parent.family, parent.id.clone()), parent);
    }
}

impl RevisionStore for MemoryStore {
    fn parent(&self, family: Family, parent_id: &str) -> Result<Parent> {
        self.lock()?.parent(family, parent_id).cloned()
    }

    fn put_parent(&self, parent: &Parent) -> Result<()> {
        self.lock()?.store_parent(parent.clone());
        Ok(())
    }

    fn update_parent(
        &self,
        family: Family,
        parent_id: &str,
        update: &dyn Fn(&mut Parent),
    ) -> Result<Parent> {
        let mut tables = self.lock()?;
        let mut parent = tables.parent(family, parent_id)?.clone();
        update(&mut parent);
        parent.updated_at = TimeStamp::new();
        tables.store_parent(parent);

        tables.parent(family, parent_id).cloned()
    }

    fn rows(&self, family: Family, parent_id: &str) -> Result<Vec<RevisionRow>> {
        let tables = self.lock()?;
        tables.parent(family, parent_id)?;

        Ok(tables.lineage(family, parent_id).rev().cloned().collect())
    }

    fn row(&self, family: Family, parent_id: &str, version: u32) -> Result<RevisionRow> {
        self.lock()?.row(family, parent_id, version).cloned()
    }

    fn append(&self, family: Family, parent_id: &str, mint: &Mint<'_>) -> Result<RevisionRow> {
        // the guard is held for the whole read-compute-write
        let mut tables = self.lock()?;

        let mut parent = tables.parent(family, parent_id)?.clone();
        let previous = tables.newest(family, parent_id).cloned();
        let version = previous.as_ref().map_or(1, |row| row.version + 1);

        let row = mint(&mut parent, version, previous.as_ref());
        parent.advance(version, row.created_at.clone());

        tables
            .rows
            .insert((family, parent_id.to_owned(), version), row.clone());
        tables.parents.insert((family, parent_id.to_owned()), parent);

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(parent: &mut Parent, version: u32, _: Option<&RevisionRow>) -> RevisionRow {
        RevisionRow::snapshot(parent, version)
    }

    #[test]
    fn append_numbers_from_one() {
        let store = MemoryStore::new();
        let parent = Parent::blueprint("plan.pdf", None, None);
        store.put_parent(&parent).unwrap();

        for _ in 0..3 {
            store.append(Family::Blueprint, &parent.id, &snapshot).unwrap();
        }

        let versions: Vec<u32> = store
            .rows(Family::Blueprint, &parent.id)
            .unwrap()
            .iter()
            .map(|row| row.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);

        let current = store.parent(Family::Blueprint, &parent.id).unwrap();
        assert_eq!(current.latest_revision, Some(3));
        assert_eq!(current.version(), 3);
    }

    #[test]
    fn next_version_follows_stored_rows() {
        let store = MemoryStore::new();
        let parent = Parent::blueprint("plan.pdf", None, None);
        store.put_parent(&parent).unwrap();
        store.insert_row(RevisionRow::snapshot(&parent, 4)).unwrap();

        let row = store.append(Family::Blueprint, &parent.id, &snapshot).unwrap();
        assert_eq!(row.version, 5);
    }

    #[test]
    fn stale_parent_cannot_rewind_the_pointer() {
        let store = MemoryStore::new();
        let stale = Parent::blueprint("plan.pdf", None, None);
        store.put_parent(&stale).unwrap();
        store.append(Family::Blueprint, &stale.id, &snapshot).unwrap();

        store.put_parent(&stale).unwrap();
        assert_eq!(
            store.parent(Family::Blueprint, &stale.id).unwrap().latest_revision,
            Some(1)
        );
        let row = store.append(Family::Blueprint, &stale.id, &snapshot).unwrap();
        assert_eq!(row.version, 2);

        let renamed = store
            .update_parent(Family::Blueprint, &stale.id, &|parent| {
                parent.label = "plan_v2.pdf".into();
                parent.latest_revision = None;
            })
            .unwrap();
        assert_eq!(renamed.label, "plan_v2.pdf");
        assert_eq!(renamed.latest_revision, Some(2));
    }

    #[test]
    fn families_do_not_share_lineages() {
        let store = MemoryStore::new();
        let parent = Parent::blueprint("plan.pdf", None, None);
        store.put_parent(&parent).unwrap();

        let err = store.rows(Family::Bid, &parent.id).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.rows(Family::Blueprint, &parent.id).unwrap().is_empty());
        let err = store
            .update_parent(Family::Bid, &parent.id, &|_| {})
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
