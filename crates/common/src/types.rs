// Per-cycle scan output shared by the daemon and the CLI.

use serde::{Deserialize, Serialize};

use crate::notify::status_url;
use crate::query::Query;

/// Newly discovered identifiers for one query, in discovery order.
///
/// Created fresh each cycle and dropped once formatted. Only the store's
/// known-set is durable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub query: Query,
    pub new_ids: Vec<String>,
}

impl ScanResult {
    pub fn new(query: Query, new_ids: Vec<String>) -> Self {
        Self { query, new_ids }
    }

    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty()
    }

    pub fn status_urls(&self) -> Vec<String> {
        self.new_ids.iter().map(|id| status_url(id)).collect()
    }
}
