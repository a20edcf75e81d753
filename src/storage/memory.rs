//! In-memory corpus store.

use crate::models::{Dataset, Example};
use crate::storage::{CorpusStore, GetExamplesQuery, ListDatasetsQuery};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of [`CorpusStore`].
///
/// One lock domain covers both maps, so dataset creation, example batch
/// mutation, and listing are mutually atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    datasets: HashMap<String, Dataset>,
    /// dataset id -> owned examples, in insertion order.
    examples: HashMap<String, Vec<Example>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_query(dataset: &Dataset, query: &ListDatasetsQuery) -> bool {
    if let Some(prompt_id) = &query.prompt_id {
        if dataset.prompt_id.as_deref() != Some(prompt_id.as_str()) {
            return false;
        }
    }

    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        if !dataset.name.to_lowercase().contains(&needle)
            && !dataset.description.to_lowercase().contains(&needle)
        {
            return false;
        }
    }

    if !query.tags.is_empty() {
        let any_overlap = dataset
            .tags
            .iter()
            .any(|tag| query.tags.iter().any(|wanted| wanted == tag));
        if !any_overlap {
            return false;
        }
    }

    true
}

fn paginate<T>(mut items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    if offset > 0 {
        if offset >= items.len() {
            return Vec::new();
        }
        items.drain(..offset);
    }
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
    }
    items
}

#[async_trait]
impl CorpusStore for MemoryStore {
    async fn create_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.datasets.contains_key(&dataset.id) {
            return Err(Error::AlreadyExists {
                entity: "dataset",
                id: dataset.id.clone(),
            });
        }

        inner.datasets.insert(dataset.id.clone(), dataset.clone());
        inner.examples.insert(dataset.id.clone(), Vec::new());
        Ok(())
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        let inner = self.inner.read().await;
        Ok(inner.datasets.get(id).cloned())
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut inner = self.inner.write().await;

        if !inner.datasets.contains_key(&dataset.id) {
            return Err(Error::NotFound {
                entity: "dataset",
                id: dataset.id.clone(),
            });
        }

        inner.datasets.insert(dataset.id.clone(), dataset.clone());
        Ok(())
    }

    async fn delete_dataset(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.datasets.remove(id).is_none() {
            return Err(Error::NotFound {
                entity: "dataset",
                id: id.to_string(),
            });
        }
        inner.examples.remove(id);
        Ok(())
    }

    async fn list_datasets(&self, query: &ListDatasetsQuery) -> Result<(Vec<Dataset>, usize)> {
        let inner = self.inner.read().await;

        let mut results: Vec<Dataset> = inner
            .datasets
            .values()
            .filter(|d| matches_query(d, query))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = results.len();
        Ok((paginate(results, query.limit, query.offset), total))
    }

    async fn add_examples(&self, dataset_id: &str, examples: &[Example]) -> Result<()> {
        let mut inner = self.inner.write().await;

        let dataset = inner
            .datasets
            .get_mut(dataset_id)
            .ok_or_else(|| Error::NotFound {
                entity: "dataset",
                id: dataset_id.to_string(),
            })?;
        dataset.example_count += examples.len();
        dataset.last_updated = Utc::now();

        inner
            .examples
            .entry(dataset_id.to_string())
            .or_default()
            .extend(examples.iter().cloned());
        Ok(())
    }

    async fn get_examples(&self, query: &GetExamplesQuery) -> Result<(Vec<Example>, usize)> {
        let inner = self.inner.read().await;

        let Some(examples) = inner.examples.get(&query.dataset_id) else {
            return Ok((Vec::new(), 0));
        };

        // Work on a copy so shuffling never perturbs stored order.
        let mut results = examples.clone();
        if query.shuffle {
            results.shuffle(&mut rand::rng());
        }

        let total = results.len();
        Ok((paginate(results, query.limit, query.offset), total))
    }

    async fn remove_examples(&self, dataset_id: &str, example_ids: &[String]) -> Result<usize> {
        let mut inner = self.inner.write().await;

        if !inner.datasets.contains_key(dataset_id) {
            return Err(Error::NotFound {
                entity: "dataset",
                id: dataset_id.to_string(),
            });
        }

        let examples = inner.examples.entry(dataset_id.to_string()).or_default();
        let before = examples.len();
        examples.retain(|e| !example_ids.contains(&e.id));
        let removed = before - examples.len();

        if let Some(dataset) = inner.datasets.get_mut(dataset_id) {
            dataset.example_count = dataset.example_count.saturating_sub(removed);
            dataset.last_updated = Utc::now();
        }

        Ok(removed)
    }

    async fn get_example(&self, id: &str) -> Result<Option<Example>> {
        let inner = self.inner.read().await;

        for examples in inner.examples.values() {
            if let Some(example) = examples.iter().find(|e| e.id == id) {
                return Ok(Some(example.clone()));
            }
        }
        Ok(None)
    }
}
