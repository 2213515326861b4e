use crate::error::{ClosureError, Result};
use serde::{Deserialize, Serialize};

/// Caller-supplied replacements for the extremal users.
///
/// When present these win over whatever the counts select.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverrides {
    pub heavy_manage_user: Option<String>,
    pub regular_view_user: Option<String>,
}

impl UserOverrides {
    pub fn new(heavy_manage_user: Option<String>, regular_view_user: Option<String>) -> Self {
        Self {
            heavy_manage_user: non_empty(heavy_manage_user),
            regular_view_user: non_empty(regular_view_user),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("HEAVY_MANAGE_USER").ok(),
            std::env::var("REGULAR_VIEW_USER").ok(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.heavy_manage_user.is_none() && self.regular_view_user.is_none()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Edges requested per page from the edge source
    pub page_size: usize,
    /// Ingest edge kinds concurrently, one task per kind
    pub parallel_ingest: bool,
    /// Upper bound on each sample-pair list; `None` keeps every pair
    pub max_pairs_per_path: Option<usize>,
    pub overrides: UserOverrides,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            parallel_ingest: true,
            max_pairs_per_path: None,
            overrides: UserOverrides::default(),
        }
    }
}

impl DatasetConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let page_size = match std::env::var("ACCESS_PAGE_SIZE") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                ClosureError::Configuration(format!("ACCESS_PAGE_SIZE is not a number: {}", raw))
            })?,
            Err(_) => defaults.page_size,
        };

        let parallel_ingest = std::env::var("ACCESS_PARALLEL_INGEST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.parallel_ingest);

        let max_pairs_per_path = std::env::var("ACCESS_MAX_PAIRS")
            .ok()
            .and_then(|s| s.parse().ok());

        let config = Self {
            page_size,
            parallel_ingest,
            max_pairs_per_path,
            overrides: UserOverrides::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ClosureError::Configuration(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_parallel_ingest(mut self, enabled: bool) -> Self {
        self.parallel_ingest = enabled;
        self
    }

    pub fn with_max_pairs(mut self, max_pairs: Option<usize>) -> Self {
        self.max_pairs_per_path = max_pairs;
        self
    }

    pub fn with_overrides(mut self, overrides: UserOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}
