use crate::{
    aggregate::PermissionAggregator,
    closure::GroupClosures,
    config::DatasetConfig,
    error::Result,
    extremal::ExtremalUsers,
    models::*,
    sample::SamplePairSelector,
    source::EdgeSource,
    store::RelationStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Size of the graph a dataset was derived from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub edges: usize,
    pub skipped_relationships: usize,
    pub resources: usize,
    pub member_groups: usize,
    pub manager_groups: usize,
    pub users: usize,
}

/// Benchmark inputs derived from one relationship snapshot.
///
/// An empty pair list means the matching benchmark should be skipped; an
/// absent user means the same for the user-driven benchmarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub direct_manager_pairs: Vec<SamplePair>,
    pub org_admin_pairs: Vec<SamplePair>,
    pub group_view_pairs: Vec<SamplePair>,
    pub heavy_manage_user: Option<String>,
    pub regular_view_user: Option<String>,
    pub stats: DatasetStats,
    pub generated_at: DateTime<Utc>,
}

impl Dataset {
    pub fn pairs(&self, path: AccessPath) -> &[SamplePair] {
        match path {
            AccessPath::DirectManager => &self.direct_manager_pairs,
            AccessPath::OrgAdmin => &self.org_admin_pairs,
            AccessPath::GroupView => &self.group_view_pairs,
        }
    }

    pub fn is_empty_path(&self, path: AccessPath) -> bool {
        self.pairs(path).is_empty()
    }
}

/// Runs a full pass: ingest, resolve group closures, aggregate, sample,
/// pick extremal users and apply overrides.
pub struct DatasetBuilder {
    config: DatasetConfig,
}

impl DatasetBuilder {
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Load every edge from `source` and build the dataset.
    ///
    /// Fails if ingestion fails; no partial dataset is produced.
    pub async fn build(&self, source: Arc<dyn EdgeSource>) -> Result<Dataset> {
        let store = RelationStore::load(source, &self.config).await?;
        Ok(self.build_from_store(&store))
    }

    /// Build the dataset from an already loaded store
    pub fn build_from_store(&self, store: &RelationStore) -> Dataset {
        let closures = GroupClosures::resolve(store);
        let aggregator = PermissionAggregator::aggregate(store, &closures);

        let pairs = SamplePairSelector::new(self.config.max_pairs_per_path)
            .select(store, &aggregator, &closures);
        let users = ExtremalUsers::select(&aggregator).with_overrides(&self.config.overrides);

        let stats = DatasetStats {
            edges: store.len(),
            skipped_relationships: store.skipped(),
            resources: aggregator.resources().len(),
            member_groups: closures.members.len(),
            manager_groups: closures.managers.len(),
            users: aggregator.user_count(),
        };

        info!(
            "Built dataset: {} direct-manager, {} org-admin, {} group-view pairs from {} edges",
            pairs.direct_manager.len(),
            pairs.org_admin.len(),
            pairs.group_view.len(),
            stats.edges
        );

        Dataset {
            direct_manager_pairs: pairs.direct_manager,
            org_admin_pairs: pairs.org_admin,
            group_view_pairs: pairs.group_view,
            heavy_manage_user: users.heavy_manage_user,
            regular_view_user: users.regular_view_user,
            stats,
            generated_at: Utc::now(),
        }
    }
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new(DatasetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryEdgeSource;

    #[tokio::test]
    async fn test_build_from_source() {
        let source = InMemoryEdgeSource::new();
        source.insert(EdgeKind::ResourceOrg, Edge::new("o1", "r1"));
        source.insert(EdgeKind::OrgAdmin, Edge::new("u1", "o1"));
        source.insert(EdgeKind::ResourceManagerUser, Edge::new("u2", "r1"));

        let dataset = DatasetBuilder::default().build(Arc::new(source)).await.unwrap();

        assert_eq!(dataset.org_admin_pairs, vec![SamplePair::new("r1", "u1")]);
        assert_eq!(dataset.direct_manager_pairs, vec![SamplePair::new("r1", "u2")]);
        assert!(dataset.is_empty_path(AccessPath::GroupView));
        assert_eq!(dataset.stats.edges, 3);
    }
}
