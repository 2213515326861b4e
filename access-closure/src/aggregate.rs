use crate::{closure::GroupClosures, models::*, store::RelationStore};
use ahash::AHashMap;
use tracing::{debug, info, warn};

/// Per-user manage/view counts and per-resource ownership for one store.
///
/// Counts are sums over access paths, not sizes of deduplicated resource
/// sets: a user reaching the same resource through two paths is counted
/// twice. That is good enough to rank users for benchmark input selection
/// and keeps the pass linear in the number of edges.
#[derive(Debug, Clone, Default)]
pub struct PermissionAggregator {
    manage_count: AHashMap<String, u64>,
    view_count: AHashMap<String, u64>,
    resource_org: AHashMap<String, String>,
    org_resource_count: AHashMap<String, u64>,
    /// Admins per org in first-seen order
    org_admins: AHashMap<String, Vec<String>>,
    /// Resources in first-seen order
    resources: Vec<String>,
}

impl PermissionAggregator {
    pub fn aggregate(store: &RelationStore, closures: &GroupClosures) -> Self {
        let mut aggregator = Self::default();

        aggregator.index_resources(store);
        aggregator.apply_org_admins(store);
        aggregator.apply_org_members(store);
        aggregator.apply_org_groups(store, closures);
        aggregator.apply_direct_managers(store);
        aggregator.apply_direct_viewers(store);
        aggregator.apply_group_managers(store, closures);
        aggregator.apply_group_viewers(store, closures);
        aggregator.apply_manage_implies_view();

        info!(
            "Aggregated permissions: {} resources in {} orgs, {} managing users, {} viewing users",
            aggregator.resources.len(),
            aggregator.org_resource_count.len(),
            aggregator.manage_count.len(),
            aggregator.view_count.len()
        );

        aggregator
    }

    /// `resource-org`: owning org per resource and resource count per org
    fn index_resources(&mut self, store: &RelationStore) {
        for edge in store.distinct_edges_of(EdgeKind::ResourceOrg) {
            let (org, resource) = (&edge.subject, &edge.object);

            if let Some(existing) = self.resource_org.get(resource) {
                warn!(
                    "Resource {} already belongs to {}, ignoring org {}",
                    resource, existing, org
                );
                continue;
            }

            self.resource_org.insert(resource.clone(), org.clone());
            *self.org_resource_count.entry(org.clone()).or_insert(0) += 1;
            self.resources.push(resource.clone());
        }
    }

    /// Admins manage every resource of their org. Their view credit comes
    /// from the final manage-implies-view pass.
    fn apply_org_admins(&mut self, store: &RelationStore) {
        for edge in store.distinct_edges_of(EdgeKind::OrgAdmin) {
            let (user, org) = (&edge.subject, &edge.object);

            let admins = self.org_admins.entry(org.clone()).or_default();
            if !admins.contains(user) {
                admins.push(user.clone());
            }

            let count = self.org_resources(org);
            add(&mut self.manage_count, user, count);
        }
    }

    /// Members, admins included, view every resource of their org
    fn apply_org_members(&mut self, store: &RelationStore) {
        for edge in store.distinct_edges_of(EdgeKind::OrgMember) {
            let count = self.org_resources(&edge.object);
            add(&mut self.view_count, &edge.subject, count);
        }
    }

    /// Effective members of a group attached to an org view the org's resources
    fn apply_org_groups(&mut self, store: &RelationStore, closures: &GroupClosures) {
        for edge in store.distinct_edges_of(EdgeKind::OrgGroupMember) {
            let (group, org) = (&edge.subject, &edge.object);
            let count = self.org_resources(org);

            let Some(members) = closures.members_of(group) else {
                debug!("Group {} attached to org {} has no members", group, org);
                continue;
            };
            for user in members {
                add(&mut self.view_count, user, count);
            }
        }
    }

    fn apply_direct_managers(&mut self, store: &RelationStore) {
        for edge in store.distinct_edges_of(EdgeKind::ResourceManagerUser) {
            add(&mut self.manage_count, &edge.subject, 1);
        }
    }

    fn apply_direct_viewers(&mut self, store: &RelationStore) {
        for edge in store.distinct_edges_of(EdgeKind::ResourceViewerUser) {
            add(&mut self.view_count, &edge.subject, 1);
        }
    }

    fn apply_group_managers(&mut self, store: &RelationStore, closures: &GroupClosures) {
        for edge in store.distinct_edges_of(EdgeKind::ResourceManagerGroup) {
            for user in closures.managers_of(&edge.subject).into_iter().flatten() {
                add(&mut self.manage_count, user, 1);
            }
        }
    }

    fn apply_group_viewers(&mut self, store: &RelationStore, closures: &GroupClosures) {
        for edge in store.distinct_edges_of(EdgeKind::ResourceViewerGroup) {
            for user in closures.members_of(&edge.subject).into_iter().flatten() {
                add(&mut self.view_count, user, 1);
            }
        }
    }

    fn apply_manage_implies_view(&mut self) {
        for (user, manage) in &self.manage_count {
            add(&mut self.view_count, user, *manage);
        }
    }

    fn org_resources(&self, org: &str) -> u64 {
        self.org_resource_count.get(org).copied().unwrap_or(0)
    }

    pub fn manage_count(&self, user: &str) -> u64 {
        self.manage_count.get(user).copied().unwrap_or(0)
    }

    pub fn view_count(&self, user: &str) -> u64 {
        self.view_count.get(user).copied().unwrap_or(0)
    }

    pub fn manage_counts(&self) -> &AHashMap<String, u64> {
        &self.manage_count
    }

    pub fn view_counts(&self) -> &AHashMap<String, u64> {
        &self.view_count
    }

    pub fn resource_org(&self, resource: &str) -> Option<&str> {
        self.resource_org.get(resource).map(String::as_str)
    }

    pub fn org_resource_count(&self, org: &str) -> u64 {
        self.org_resources(org)
    }

    pub fn org_admins(&self, org: &str) -> &[String] {
        self.org_admins.get(org).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resources with an owning org, in first-seen order
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Users with any manage or view count
    pub fn user_count(&self) -> usize {
        self.view_count.len()
    }
}

fn add(counts: &mut AHashMap<String, u64>, user: &str, amount: u64) {
    if amount == 0 {
        return;
    }
    let entry = counts.entry(user.to_string()).or_insert(0);
    *entry = entry.saturating_add(amount);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(store: &RelationStore) -> PermissionAggregator {
        let closures = GroupClosures::resolve(store);
        PermissionAggregator::aggregate(store, &closures)
    }

    fn org_with_resources(store: &mut RelationStore, org: &str, resources: &[&str]) {
        for resource in resources {
            store.ingest(EdgeKind::ResourceOrg, Edge::new(org, resource));
        }
    }

    #[test]
    fn test_org_admin_manages_and_views_org_resources() {
        let mut store = RelationStore::new();
        org_with_resources(&mut store, "o1", &["r1", "r2"]);
        store.ingest(EdgeKind::OrgAdmin, Edge::new("u1", "o1"));

        let agg = aggregate(&store);
        assert_eq!(agg.manage_count("u1"), 2);
        assert_eq!(agg.view_count("u1"), 2);

        store.ingest(EdgeKind::ResourceViewerUser, Edge::new("u2", "r1"));
        let agg = aggregate(&store);
        assert_eq!(agg.view_count("u2"), 1);
        assert_eq!(agg.manage_count("u2"), 0);
    }

    #[test]
    fn test_org_member_and_org_group_views() {
        let mut store = RelationStore::new();
        org_with_resources(&mut store, "o1", &["r1", "r2", "r3"]);
        store.ingest(EdgeKind::OrgMember, Edge::new("u1", "o1"));
        store.ingest(EdgeKind::OrgGroupMember, Edge::new("g1", "o1"));
        store.ingest(EdgeKind::GroupMember, Edge::new("u2", "g2"));
        store.ingest(EdgeKind::GroupSubgroupMember, Edge::new("g2", "g1"));

        let agg = aggregate(&store);
        assert_eq!(agg.view_count("u1"), 3);
        assert_eq!(agg.view_count("u2"), 3);
        assert_eq!(agg.manage_count("u2"), 0);
    }

    #[test]
    fn test_group_grants_use_closures() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::GroupManager, Edge::new("boss", "leads"));
        store.ingest(EdgeKind::GroupMember, Edge::new("dev", "eng"));
        store.ingest(EdgeKind::GroupMember, Edge::new("lead", "leads"));
        store.ingest(EdgeKind::ResourceManagerGroup, Edge::new("leads", "r1"));
        store.ingest(EdgeKind::ResourceManagerGroup, Edge::new("eng", "r2"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r3"));

        let agg = aggregate(&store);
        assert_eq!(agg.manage_count("boss"), 1);
        // leads has a manager, so its plain members are not credited
        assert_eq!(agg.manage_count("lead"), 0);
        // eng has no managers: direct members stand in
        assert_eq!(agg.manage_count("dev"), 1);
        assert_eq!(agg.view_count("dev"), 2);
    }

    #[test]
    fn test_subgroup_managers_reach_parent_grants() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::GroupManager, Edge::new("boss", "child"));
        store.ingest(EdgeKind::GroupSubgroupManager, Edge::new("child", "parent"));
        store.ingest(EdgeKind::ResourceManagerGroup, Edge::new("parent", "r1"));

        let agg = aggregate(&store);
        assert_eq!(agg.manage_count("boss"), 1);
        assert_eq!(agg.view_count("boss"), 1);
    }

    #[test]
    fn test_duplicate_edges_are_harmless() {
        let mut store = RelationStore::new();
        org_with_resources(&mut store, "o1", &["r1", "r1"]);
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("u1", "r1"));
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("u1", "r1"));

        let agg = aggregate(&store);
        assert_eq!(agg.org_resource_count("o1"), 1);
        assert_eq!(agg.manage_count("u1"), 1);
        assert_eq!(agg.view_count("u1"), 1);
    }

    #[test]
    fn test_overlapping_paths_are_not_deduplicated() {
        let mut store = RelationStore::new();
        org_with_resources(&mut store, "o1", &["r1"]);
        store.ingest(EdgeKind::OrgMember, Edge::new("u1", "o1"));
        store.ingest(EdgeKind::ResourceViewerUser, Edge::new("u1", "r1"));

        assert_eq!(aggregate(&store).view_count("u1"), 2);
    }

    #[test]
    fn test_resource_keeps_first_org() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::ResourceOrg, Edge::new("o1", "r1"));
        store.ingest(EdgeKind::ResourceOrg, Edge::new("o2", "r1"));
        store.ingest(EdgeKind::OrgAdmin, Edge::new("a1", "o1"));
        store.ingest(EdgeKind::OrgAdmin, Edge::new("a2", "o1"));
        store.ingest(EdgeKind::OrgAdmin, Edge::new("a1", "o1"));

        let agg = aggregate(&store);
        assert_eq!(agg.resource_org("r1"), Some("o1"));
        assert_eq!(agg.org_resource_count("o2"), 0);
        assert_eq!(agg.org_admins("o1"), ["a1".to_string(), "a2".to_string()]);
        assert!(agg.org_admins("o2").is_empty());
    }
}
