//! Corpus store backends.
//!
//! [`CorpusStore`] is the backend-agnostic contract; the in-memory and
//! sqlite implementations are behaviorally identical. Point lookups return
//! `Ok(None)` for missing ids; absence is not an error. Mutations against
//! a missing dataset are [`crate::Error::NotFound`].

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::models::{Dataset, Example};
use crate::Result;
use async_trait::async_trait;

/// Filters for listing datasets.
///
/// `limit == 0` means no limit.
#[derive(Debug, Clone, Default)]
pub struct ListDatasetsQuery {
    /// Exact match on the linked prompt id.
    pub prompt_id: Option<String>,
    /// Matches datasets whose tag set intersects this set (any overlap).
    pub tags: Vec<String>,
    /// Case-insensitive substring search over name and description.
    pub search: Option<String>,
    /// Page size, 0 for unlimited.
    pub limit: usize,
    /// Rows to skip before the page.
    pub offset: usize,
}

/// Filters for fetching examples from one dataset.
#[derive(Debug, Clone, Default)]
pub struct GetExamplesQuery {
    /// The owning dataset.
    pub dataset_id: String,
    /// Page size, 0 for unlimited.
    pub limit: usize,
    /// Rows to skip before the page.
    pub offset: usize,
    /// Return the page in random order. Stored order is not affected.
    pub shuffle: bool,
}

/// Backend-agnostic dataset storage operations.
///
/// List/get operations return both the page and the total count matching
/// the filter before pagination, so callers can page without a second
/// query.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Creates a new dataset. Fails if the id already exists.
    async fn create_dataset(&self, dataset: &Dataset) -> Result<()>;

    /// Retrieves a dataset by id.
    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>>;

    /// Replaces a dataset's mutable fields.
    async fn update_dataset(&self, dataset: &Dataset) -> Result<()>;

    /// Deletes a dataset, cascading to all owned examples.
    async fn delete_dataset(&self, id: &str) -> Result<()>;

    /// Returns datasets matching the query and the total match count.
    async fn list_datasets(&self, query: &ListDatasetsQuery) -> Result<(Vec<Dataset>, usize)>;

    /// Atomically appends a batch of examples and increments the owning
    /// dataset's `example_count` by the batch size.
    async fn add_examples(&self, dataset_id: &str, examples: &[Example]) -> Result<()>;

    /// Retrieves examples from a dataset with the total match count.
    async fn get_examples(&self, query: &GetExamplesQuery) -> Result<(Vec<Example>, usize)>;

    /// Removes the examples matching both dataset ownership and id
    /// membership. Decrements `example_count` by the number actually
    /// removed and returns that count.
    async fn remove_examples(&self, dataset_id: &str, example_ids: &[String]) -> Result<usize>;

    /// Retrieves a single example by id.
    async fn get_example(&self, id: &str) -> Result<Option<Example>>;
}
