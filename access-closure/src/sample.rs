use crate::{
    aggregate::PermissionAggregator,
    closure::GroupClosures,
    models::*,
    store::RelationStore,
};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Round-robin index per key.
///
/// Each key has its own counter; successive picks for the same key walk the
/// candidate list in order and wrap around.
#[derive(Debug, Clone, Default)]
pub struct RotatingSelector {
    counters: AHashMap<String, usize>,
}

impl RotatingSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next index into a list of `len` candidates for `key`.
    /// `None` for an empty list, in which case the counter does not move.
    pub fn next_index(&mut self, key: &str, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let counter = self.counters.entry(key.to_string()).or_insert(0);
        let index = *counter % len;
        *counter = counter.wrapping_add(1);
        Some(index)
    }

    pub fn pick<'a, T>(&mut self, key: &str, items: &'a [T]) -> Option<&'a T> {
        let index = self.next_index(key, items.len())?;
        items.get(index)
    }

    /// Same as [`RotatingSelector::pick`] for sized iterators such as ordered sets
    pub fn pick_from<I>(&mut self, key: &str, items: I) -> Option<I::Item>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
    {
        let mut items = items.into_iter();
        let index = self.next_index(key, items.len())?;
        items.nth(index)
    }
}

/// Representative pairs for every access path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePairs {
    pub direct_manager: Vec<SamplePair>,
    pub org_admin: Vec<SamplePair>,
    pub group_view: Vec<SamplePair>,
}

impl SamplePairs {
    pub fn for_path(&self, path: AccessPath) -> &[SamplePair] {
        match path {
            AccessPath::DirectManager => &self.direct_manager,
            AccessPath::OrgAdmin => &self.org_admin,
            AccessPath::GroupView => &self.group_view,
        }
    }
}

/// Picks bounded, deterministic (resource, user) pairs per access path.
///
/// Rotation state lives in the selector; a fresh selector over the same
/// input produces the same pairs.
#[derive(Debug, Clone, Default)]
pub struct SamplePairSelector {
    by_org: RotatingSelector,
    by_group: RotatingSelector,
    max_pairs: Option<usize>,
}

impl SamplePairSelector {
    pub fn new(max_pairs: Option<usize>) -> Self {
        Self {
            max_pairs,
            ..Self::default()
        }
    }

    pub fn select(
        &mut self,
        store: &RelationStore,
        aggregator: &PermissionAggregator,
        closures: &GroupClosures,
    ) -> SamplePairs {
        let mut pairs = SamplePairs {
            direct_manager: self.direct_manager_pairs(store),
            org_admin: self.org_admin_pairs(aggregator),
            group_view: self.group_view_pairs(store, closures),
        };

        if let Some(max) = self.max_pairs {
            pairs.direct_manager.truncate(max);
            pairs.org_admin.truncate(max);
            pairs.group_view.truncate(max);
        }

        debug!(
            "Selected {} direct-manager, {} org-admin, {} group-view pairs",
            pairs.direct_manager.len(),
            pairs.org_admin.len(),
            pairs.group_view.len()
        );
        pairs
    }

    /// Every `resource-manager-user` edge, as ingested
    pub fn direct_manager_pairs(&self, store: &RelationStore) -> Vec<SamplePair> {
        store
            .edges_of(EdgeKind::ResourceManagerUser)
            .map(|edge| SamplePair::new(&edge.object, &edge.subject))
            .collect()
    }

    /// One admin of the owning org per resource, rotating through the org's admins
    pub fn org_admin_pairs(&mut self, aggregator: &PermissionAggregator) -> Vec<SamplePair> {
        let mut pairs = Vec::new();
        for resource in aggregator.resources() {
            let Some(org) = aggregator.resource_org(resource) else {
                continue;
            };
            if let Some(admin) = self.by_org.pick(org, aggregator.org_admins(org)) {
                pairs.push(SamplePair::new(resource, admin));
            }
        }
        pairs
    }

    /// One effective member per distinct `resource-viewer-group` edge, rotating per group
    pub fn group_view_pairs(
        &mut self,
        store: &RelationStore,
        closures: &GroupClosures,
    ) -> Vec<SamplePair> {
        let mut pairs = Vec::new();
        for edge in store.distinct_edges_of(EdgeKind::ResourceViewerGroup) {
            let (group, resource) = (&edge.subject, &edge.object);
            let Some(members) = closures.members_of(group) else {
                continue;
            };
            if let Some(user) = self.by_group.pick_from(group, members) {
                pairs.push(SamplePair::new(resource, user));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_wraps_in_order() {
        let admins = ["a1", "a2", "a3"];
        let mut selector = RotatingSelector::new();
        let picked: Vec<_> = (0..5).map(|_| *selector.pick("o1", &admins).unwrap()).collect();
        assert_eq!(picked, vec!["a1", "a2", "a3", "a1", "a2"]);
    }

    #[test]
    fn test_keys_rotate_independently() {
        let mut selector = RotatingSelector::new();
        assert_eq!(selector.next_index("x", 2), Some(0));
        assert_eq!(selector.next_index("y", 2), Some(0));
        assert_eq!(selector.next_index("x", 2), Some(1));
        assert_eq!(selector.next_index("z", 0), None);
        assert_eq!(selector.next_index("z", 3), Some(0));
    }

    #[test]
    fn test_org_admin_pairs_rotate_per_org() {
        let mut store = RelationStore::new();
        for i in 1..=5 {
            store.ingest(EdgeKind::ResourceOrg, Edge::new("o1", &format!("r{}", i)));
        }
        store.ingest(EdgeKind::ResourceOrg, Edge::new("o2", "lonely"));
        for admin in ["a1", "a2", "a3"] {
            store.ingest(EdgeKind::OrgAdmin, Edge::new(admin, "o1"));
        }

        let closures = GroupClosures::resolve(&store);
        let aggregator = PermissionAggregator::aggregate(&store, &closures);
        let pairs = SamplePairSelector::new(None).org_admin_pairs(&aggregator);

        let users: Vec<_> = pairs.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(users, vec!["a1", "a2", "a3", "a1", "a2"]);
        // o2 has no admins
        assert!(pairs.iter().all(|p| p.resource_id != "lonely"));
    }

    #[test]
    fn test_group_view_pairs_rotate_through_members() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::GroupMember, Edge::new("u2", "eng"));
        store.ingest(EdgeKind::GroupMember, Edge::new("u1", "eng"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r1"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r2"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r3"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("ghost", "r4"));

        let closures = GroupClosures::resolve(&store);
        let pairs = SamplePairSelector::new(None).group_view_pairs(&store, &closures);

        assert_eq!(
            pairs,
            vec![
                SamplePair::new("r1", "u1"),
                SamplePair::new("r2", "u2"),
                SamplePair::new("r3", "u1"),
            ]
        );
    }

    #[test]
    fn test_duplicate_viewer_group_edge_does_not_advance_rotation() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::GroupMember, Edge::new("u1", "eng"));
        store.ingest(EdgeKind::GroupMember, Edge::new("u2", "eng"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r1"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r1"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r2"));

        let closures = GroupClosures::resolve(&store);
        let pairs = SamplePairSelector::new(None).group_view_pairs(&store, &closures);
        assert_eq!(pairs, vec![SamplePair::new("r1", "u1"), SamplePair::new("r2", "u2")]);

        let aggregator = PermissionAggregator::aggregate(&store, &closures);
        assert_eq!(aggregator.view_count("u1"), 2);
    }

    #[test]
    fn test_fresh_selector_is_deterministic_and_capped() {
        let mut store = RelationStore::new();
        for i in 0..4 {
            store.ingest(EdgeKind::ResourceManagerUser, Edge::new("u1", &format!("r{}", i)));
        }
        let closures = GroupClosures::resolve(&store);
        let aggregator = PermissionAggregator::aggregate(&store, &closures);

        let first = SamplePairSelector::new(Some(2)).select(&store, &aggregator, &closures);
        let second = SamplePairSelector::new(Some(2)).select(&store, &aggregator, &closures);
        assert_eq!(first, second);
        assert_eq!(first.for_path(AccessPath::DirectManager).len(), 2);
        assert!(first.for_path(AccessPath::OrgAdmin).is_empty());
    }
}
