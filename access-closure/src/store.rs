use crate::{
    config::DatasetConfig,
    error::{ClosureError, Result},
    models::*,
    source::EdgeSource,
};
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Raw edges of one dataset-load pass, grouped by kind.
///
/// Read-only once loaded; rebuilt from scratch on every pass.
#[derive(Debug, Clone, Default)]
pub struct RelationStore {
    edges: AHashMap<EdgeKind, Vec<Edge>>,
    skipped: usize,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edge to its kind. Duplicates are kept.
    pub fn ingest(&mut self, kind: EdgeKind, edge: Edge) {
        self.edges.entry(kind).or_default().push(edge);
    }

    /// Classify and append a raw relationship.
    ///
    /// Returns `Ok(false)` when the relationship is outside the vocabulary
    /// and was skipped.
    pub fn ingest_raw(&mut self, raw: &RawRelationship) -> Result<bool> {
        match EdgeKind::classify(raw)? {
            Some(kind) => {
                self.ingest(kind, raw.to_edge());
                Ok(true)
            }
            None => {
                warn!("Skipping unrecognised relationship: {}", raw);
                self.skipped += 1;
                Ok(false)
            }
        }
    }

    /// All edges of a kind, in ingestion order. Each call restarts the sequence.
    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.get(&kind).into_iter().flatten()
    }

    /// Edges of a kind with identical edges collapsed, in first-seen order
    pub fn distinct_edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        let mut seen = AHashSet::new();
        self.edges_of(kind)
            .filter(move |edge| seen.insert((edge.subject.as_str(), edge.object.as_str())))
    }

    pub fn count(&self, kind: EdgeKind) -> usize {
        self.edges.get(&kind).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of raw relationships skipped by [`RelationStore::ingest_raw`]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn record_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Append every edge of `other`, kind by kind
    pub fn merge(&mut self, other: RelationStore) {
        for (kind, edges) in other.edges {
            self.edges.entry(kind).or_default().extend(edges);
        }
        self.skipped += other.skipped;
    }

    /// Load every edge kind from a source.
    ///
    /// Any failure aborts the whole load; a partially filled store is never
    /// returned.
    pub async fn load(source: Arc<dyn EdgeSource>, config: &DatasetConfig) -> Result<Self> {
        config.validate()?;

        let mut store = if config.parallel_ingest {
            Self::load_parallel(source.clone(), config.page_size).await?
        } else {
            let mut store = Self::new();
            for kind in EdgeKind::ALL {
                let edges = read_kind(source.as_ref(), kind, config.page_size).await?;
                store.edges.insert(kind, edges);
            }
            store
        };
        store.record_skipped(source.skipped());

        info!(
            "Loaded {} edges across {} kinds ({} relationships skipped)",
            store.len(),
            store.edges.values().filter(|edges| !edges.is_empty()).count(),
            store.skipped
        );

        Ok(store)
    }

    async fn load_parallel(source: Arc<dyn EdgeSource>, page_size: usize) -> Result<Self> {
        let mut tasks = JoinSet::new();
        for kind in EdgeKind::ALL {
            let source = source.clone();
            tasks.spawn(async move {
                let edges = read_kind(source.as_ref(), kind, page_size).await?;
                Ok::<_, ClosureError>((kind, edges))
            });
        }

        let mut store = Self::new();
        while let Some(joined) = tasks.join_next().await {
            let (kind, edges) = joined
                .map_err(|e| ClosureError::Ingestion(format!("Ingestion task failed: {}", e)))??;
            store.edges.insert(kind, edges);
        }

        Ok(store)
    }
}

async fn read_kind(source: &dyn EdgeSource, kind: EdgeKind, page_size: usize) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    let mut cursor = None;
    let mut pages = 0usize;

    loop {
        let page = source.read_page(kind, cursor.take(), page_size).await?;
        pages += 1;
        edges.extend(page.edges);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!("Read {} {} edges in {} pages", edges.len(), kind, pages);
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryEdgeSource;

    #[test]
    fn test_ingest_and_edges_of() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::OrgAdmin, Edge::new("u1", "o1"));
        store.ingest(EdgeKind::OrgAdmin, Edge::new("u1", "o1"));
        store.ingest(EdgeKind::OrgMember, Edge::new("u2", "o1"));

        assert_eq!(store.count(EdgeKind::OrgAdmin), 2);
        assert_eq!(store.len(), 3);
        assert_eq!(store.edges_of(EdgeKind::ResourceOrg).count(), 0);

        // restartable
        let first: Vec<_> = store.edges_of(EdgeKind::OrgAdmin).collect();
        let second: Vec<_> = store.edges_of(EdgeKind::OrgAdmin).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ingest_raw_skips_unknown() {
        let mut store = RelationStore::new();
        let known = RawRelationship::new("user", "u1", "viewer", "resource", "r1");
        let unknown = RawRelationship::new("user", "u1", "owner", "resource", "r1");

        assert!(store.ingest_raw(&known).unwrap());
        assert!(!store.ingest_raw(&unknown).unwrap());
        assert_eq!(store.count(EdgeKind::ResourceViewerUser), 1);
        assert_eq!(store.skipped(), 1);
    }

    #[test]
    fn test_distinct_edges_keep_first_seen_order() {
        let mut store = RelationStore::new();
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r2"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r1"));
        store.ingest(EdgeKind::ResourceViewerGroup, Edge::new("eng", "r2"));

        let distinct: Vec<_> = store
            .distinct_edges_of(EdgeKind::ResourceViewerGroup)
            .map(|e| e.object.as_str())
            .collect();
        assert_eq!(distinct, vec!["r2", "r1"]);
        assert_eq!(store.count(EdgeKind::ResourceViewerGroup), 3);
    }

    #[test]
    fn test_merge_appends() {
        let mut a = RelationStore::new();
        a.ingest(EdgeKind::GroupMember, Edge::new("u1", "g1"));
        let mut b = RelationStore::new();
        b.ingest(EdgeKind::GroupMember, Edge::new("u2", "g1"));
        b.ingest(EdgeKind::GroupManager, Edge::new("u3", "g1"));

        a.merge(b);
        let members: Vec<_> = a.edges_of(EdgeKind::GroupMember).map(|e| e.subject.as_str()).collect();
        assert_eq!(members, vec!["u1", "u2"]);
        assert_eq!(a.count(EdgeKind::GroupManager), 1);
    }

    #[tokio::test]
    async fn test_load_pages_through_source() {
        let source = InMemoryEdgeSource::new();
        for i in 0..7 {
            source.insert(EdgeKind::ResourceOrg, Edge::new("o1", &format!("r{}", i)));
        }

        let config = DatasetConfig::default().with_page_size(3).with_parallel_ingest(false);
        let store = RelationStore::load(Arc::new(source), &config).await.unwrap();

        let resources: Vec<_> = store.edges_of(EdgeKind::ResourceOrg).map(|e| e.object.clone()).collect();
        assert_eq!(resources, (0..7).map(|i| format!("r{}", i)).collect::<Vec<_>>());
    }
}
