use crate::{
    error::{ClosureError, Result},
    models::*,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// One page of edges of a single kind
#[derive(Debug, Clone, Default)]
pub struct EdgePage {
    pub edges: Vec<Edge>,
    /// Cursor for the next page; `None` once the kind is exhausted
    pub next_cursor: Option<String>,
}

/// Upstream supplier of relationship edges (e.g. a relationship-dump API)
#[async_trait]
pub trait EdgeSource: Send + Sync {
    /// Read one page of edges of `kind`, starting at `cursor`
    async fn read_page(
        &self,
        kind: EdgeKind,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EdgePage>;

    /// Relationships the source dropped because they were outside the vocabulary
    fn skipped(&self) -> usize {
        0
    }
}

/// In-memory edge source for testing and development
pub struct InMemoryEdgeSource {
    edges: Arc<DashMap<EdgeKind, Vec<Edge>>>,
    failures: Arc<DashMap<EdgeKind, String>>,
}

impl InMemoryEdgeSource {
    pub fn new() -> Self {
        Self {
            edges: Arc::new(DashMap::new()),
            failures: Arc::new(DashMap::new()),
        }
    }

    pub fn insert(&self, kind: EdgeKind, edge: Edge) {
        self.edges.entry(kind).or_default().push(edge);
    }

    /// Make every read of `kind` fail with `message`
    pub fn with_failure(self, kind: EdgeKind, message: &str) -> Self {
        self.failures.insert(kind, message.to_string());
        self
    }

    fn page(&self, kind: EdgeKind, cursor: Option<String>, page_size: usize) -> Result<EdgePage> {
        let offset = match cursor {
            Some(ref c) => c
                .parse::<usize>()
                .map_err(|_| ClosureError::Ingestion(format!("Malformed cursor for {}: {}", kind, c)))?,
            None => 0,
        };

        let Some(edges) = self.edges.get(&kind) else {
            return Ok(EdgePage::default());
        };

        let end = offset.saturating_add(page_size).min(edges.len());
        let page = edges.get(offset..end).map(<[Edge]>::to_vec).unwrap_or_default();
        let next_cursor = (end < edges.len()).then(|| end.to_string());

        Ok(EdgePage {
            edges: page,
            next_cursor,
        })
    }
}

impl Default for InMemoryEdgeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EdgeSource for InMemoryEdgeSource {
    async fn read_page(
        &self,
        kind: EdgeKind,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EdgePage> {
        if let Some(message) = self.failures.get(&kind) {
            return Err(ClosureError::Ingestion(format!("{}: {}", kind, message.value())));
        }
        self.page(kind, cursor, page_size)
    }
}

/// Edge source backed by a relationship dump.
///
/// The dump is either a JSON array of [`RawRelationship`] or one
/// relationship per line (JSON lines). It is parsed and classified once;
/// pages are then served per kind.
pub struct JsonDumpSource {
    inner: InMemoryEdgeSource,
    total: usize,
    skipped: usize,
}

impl JsonDumpSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ClosureError::Ingestion(format!("Cannot open dump {}: {}", path.display(), e))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let relationships = if text.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<RawRelationship>>(text)?
        } else {
            parse_lines(text.as_bytes())?
        };
        Self::from_relationships(relationships)
    }

    pub fn from_relationships(relationships: Vec<RawRelationship>) -> Result<Self> {
        let inner = InMemoryEdgeSource::new();
        let total = relationships.len();
        let mut skipped = 0usize;

        for raw in &relationships {
            match EdgeKind::classify(raw)? {
                Some(kind) => inner.insert(kind, raw.to_edge()),
                None => {
                    warn!("Skipping unrecognised relationship: {}", raw);
                    skipped += 1;
                }
            }
        }

        debug!("Parsed {} relationships from dump ({} skipped)", total, skipped);
        Ok(Self { inner, total, skipped })
    }

    /// Relationships in the dump, recognised or not
    pub fn total(&self) -> usize {
        self.total
    }
}

fn parse_lines<R: BufRead>(reader: R) -> Result<Vec<RawRelationship>> {
    let mut relationships = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw = serde_json::from_str::<RawRelationship>(line).map_err(|e| {
            ClosureError::Ingestion(format!("Malformed relationship on line {}: {}", index + 1, e))
        })?;
        relationships.push(raw);
    }
    Ok(relationships)
}

#[async_trait]
impl EdgeSource for JsonDumpSource {
    async fn read_page(
        &self,
        kind: EdgeKind,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<EdgePage> {
        self.inner.read_page(kind, cursor, page_size).await
    }

    fn skipped(&self) -> usize {
        self.skipped
    }
}
