pub mod analysis;
pub mod bid;
pub mod comparison;
pub mod config;
pub mod diff;
pub mod error;
pub mod impact;
pub mod memory;
pub mod record;
pub mod service;
pub mod store;
pub mod utils;

pub use comparison::{Change, ChangeType, ComparisonResult, Summary, compare, compare_checked};
pub use error::{Result, RevisionError};
pub use record::{Family, Parent, Revision, RevisionRow, RevisionSummary};
pub use service::RevisionService;
