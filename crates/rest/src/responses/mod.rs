//! Response building utilities.
//!
//! Helpers for constructing FHIR response payloads: searchset Bundles for
//! federated search results and OperationOutcomes for errors.

pub mod bundle;
pub mod operation_outcome;

pub use bundle::{BundleBuilder, BundleEntry, BundleLink, SearchMode};
pub use operation_outcome::{IssueSeverity, IssueType, OperationOutcomeBuilder, error_outcome};
