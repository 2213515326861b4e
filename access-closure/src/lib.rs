//! Effective permission closures over a relationship-based access graph
//!
//! Given raw relationship facts (org admins and members, nested groups,
//! manager/viewer grants on resources) this crate derives, per user, how
//! many resources they can manage or view, and picks representative inputs
//! for read-path permission benchmarks:
//! - (resource, user) sample pairs per access path
//! - a heavy manager and a regular viewer for list-style queries
//!
//! This is an offline batch approximation, not a live permission check.
//!
//! # Pipeline
//!
//! 1. [`RelationStore`] holds the raw edges of one snapshot, by [`EdgeKind`]
//! 2. [`closure`] resolves transitive group members/managers, cycle-safe
//! 3. [`PermissionAggregator`] turns edges and closures into per-user counts
//! 4. [`SamplePairSelector`] and [`ExtremalUsers`] pick benchmark inputs
//!
//! # Example
//!
//! ```rust
//! use access_closure::{DatasetBuilder, DatasetConfig, RawRelationship, RelationStore};
//!
//! # fn main() -> Result<(), access_closure::ClosureError> {
//! let mut store = RelationStore::new();
//! store.ingest_raw(&RawRelationship::new("organization", "acme", "org", "resource", "doc1"))?;
//! store.ingest_raw(&RawRelationship::new("user", "alice", "admin", "organization", "acme"))?;
//!
//! let dataset = DatasetBuilder::new(DatasetConfig::default()).build_from_store(&store);
//! assert_eq!(dataset.heavy_manage_user.as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod closure;
pub mod config;
pub mod engine;
pub mod error;
pub mod extremal;
pub mod models;
pub mod sample;
pub mod source;
pub mod store;

pub use aggregate::PermissionAggregator;
pub use closure::{resolve_members, ClosureResolver, GroupClosure, GroupClosures, MembershipFamily, VisitState};
pub use config::*;
pub use engine::*;
pub use error::*;
pub use extremal::ExtremalUsers;
pub use models::*;
pub use sample::{RotatingSelector, SamplePairSelector, SamplePairs};
pub use source::{EdgePage, EdgeSource, InMemoryEdgeSource, JsonDumpSource};
pub use store::RelationStore;
