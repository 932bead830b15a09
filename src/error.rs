use crate::record::Family;

#[derive(thiserror::Error, Debug)]
pub enum RevisionError {
    #[error("{family} {parent_id} does not exist")]
    ParentNotFound { family: Family, parent_id: String },
    #[error("{family} {parent_id} has no revision {version}")]
    RevisionNotFound {
        family: Family,
        parent_id: String,
        version: u32,
    },
    #[error("payload of {family} {parent_id} v{version} is malformed: {source}")]
    MalformedPayload {
        family: Family,
        parent_id: String,
        version: u32,
        #[source]
        source: serde_json::Error,
    },
    #[error("{family} {parent_id} already has a revision {version}")]
    VersionConflict {
        family: Family,
        parent_id: String,
        version: u32,
    },
    #[error("expected a {expected} record, found {found}")]
    FamilyMismatch { expected: Family, found: Family },
    #[error("cannot compare revisions of different parents ({from} and {to})")]
    ParentMismatch { from: String, to: String },
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("in-memory store lock poisoned")]
    Poisoned,
}

impl RevisionError {
    /// True for the errors a caller should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ParentNotFound { .. } | Self::RevisionNotFound { .. }
        )
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for RevisionError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        Self::Encode(value.to_string())
    }
}

pub type Result<T, E = RevisionError> = std::result::Result<T, E>;
