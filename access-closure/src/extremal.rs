use crate::{aggregate::PermissionAggregator, config::UserOverrides};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Subjects used to stress list-style permission queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtremalUsers {
    /// User with the highest manage count
    pub heavy_manage_user: Option<String>,
    /// User other than the heavy manager with the highest view count
    pub regular_view_user: Option<String>,
}

impl ExtremalUsers {
    /// Select from aggregated counts.
    ///
    /// Ties go to the smallest user id. Users with a zero count are never
    /// picked; when nobody qualifies the slot stays empty.
    pub fn select(aggregator: &PermissionAggregator) -> Self {
        let heavy_manage_user = argmax(aggregator.manage_counts(), None);
        let regular_view_user = argmax(aggregator.view_counts(), heavy_manage_user.as_deref())
            .or_else(|| heavy_manage_user.clone());

        debug!(
            heavy_manage_user = ?heavy_manage_user,
            regular_view_user = ?regular_view_user,
            "Selected extremal users"
        );

        Self {
            heavy_manage_user,
            regular_view_user,
        }
    }

    /// Replace computed users with caller-supplied ones, unconditionally
    pub fn with_overrides(mut self, overrides: &UserOverrides) -> Self {
        if let Some(ref user) = overrides.heavy_manage_user {
            info!("Overriding heavy manage user with {}", user);
            self.heavy_manage_user = Some(user.clone());
        }
        if let Some(ref user) = overrides.regular_view_user {
            info!("Overriding regular view user with {}", user);
            self.regular_view_user = Some(user.clone());
        }
        self
    }
}

fn argmax(counts: &AHashMap<String, u64>, exclude: Option<&str>) -> Option<String> {
    counts
        .iter()
        .filter(|(user, count)| **count > 0 && Some(user.as_str()) != exclude)
        .max_by(|(a_user, a_count), (b_user, b_count)| {
            a_count.cmp(b_count).then_with(|| b_user.cmp(a_user))
        })
        .map(|(user, _)| user.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{closure::GroupClosures, models::*, store::RelationStore};

    fn select(store: &RelationStore) -> ExtremalUsers {
        let closures = GroupClosures::resolve(store);
        ExtremalUsers::select(&PermissionAggregator::aggregate(store, &closures))
    }

    #[test]
    fn test_heavy_and_regular_are_distinct() {
        let mut store = RelationStore::new();
        for i in 0..3 {
            let resource = format!("r{}", i);
            store.ingest(EdgeKind::ResourceOrg, Edge::new("o1", &resource));
            store.ingest(EdgeKind::ResourceViewerUser, Edge::new("viewer", &resource));
        }
        store.ingest(EdgeKind::OrgAdmin, Edge::new("admin", "o1"));
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("helper", "r0"));

        let users = select(&store);
        assert_eq!(users.heavy_manage_user.as_deref(), Some("admin"));
        assert_eq!(users.regular_view_user.as_deref(), Some("viewer"));
    }

    #[test]
    fn test_ties_break_on_smallest_id() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("zed", "r1"));
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("amy", "r2"));
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("bob", "r3"));

        let users = select(&store);
        assert_eq!(users.heavy_manage_user.as_deref(), Some("amy"));
        assert_eq!(users.regular_view_user.as_deref(), Some("bob"));
    }

    #[test]
    fn test_falls_back_to_heavy_user() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("solo", "r1"));

        let users = select(&store);
        assert_eq!(users.heavy_manage_user.as_deref(), Some("solo"));
        assert_eq!(users.regular_view_user.as_deref(), Some("solo"));
    }

    #[test]
    fn test_empty_counts_select_nobody() {
        let users = select(&RelationStore::new());
        assert_eq!(users, ExtremalUsers::default());
    }

    #[test]
    fn test_overrides_win() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::ResourceManagerUser, Edge::new("solo", "r1"));

        let overrides = UserOverrides::new(Some("forced".to_string()), None);
        let users = select(&store).with_overrides(&overrides);
        assert_eq!(users.heavy_manage_user.as_deref(), Some("forced"));
        assert_eq!(users.regular_view_user.as_deref(), Some("solo"));
    }
}
