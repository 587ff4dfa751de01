//! Deployment history per target.
//!
//! Records live in the state directory, one JSON file per target, so the
//! runner can tell whether a commit already went out.

pub mod store;
pub mod types;

pub use store::HistoryStore;
pub use types::{DeploymentHistory, DeploymentOutcome, DeploymentRecord};
