//! Dataset CRUD service.
//!
//! Owns id generation, version counters, and timestamp maintenance; the
//! store underneath only persists what it is given.

use crate::models::{CreateDataset, Dataset, Example, ExampleDraft, UpdateDataset};
use crate::storage::{CorpusStore, GetExamplesQuery, ListDatasetsQuery};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Input for the (stubbed) LLM example generator.
#[derive(Debug, Clone, Default)]
pub struct GenerateExamples {
    /// Target dataset.
    pub dataset_id: String,
    /// How many examples to generate.
    pub count: usize,
    /// Free-form generation prompt.
    pub generation_prompt: String,
    /// Seed examples to steer generation.
    pub seed_examples: Vec<Example>,
}

/// Dataset business logic over a [`CorpusStore`] backend.
pub struct DatasetService {
    store: Arc<dyn CorpusStore>,
}

impl DatasetService {
    /// Creates a new dataset service.
    #[must_use]
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self { store }
    }

    /// Creates a dataset with a fresh id at version 1.
    pub async fn create_dataset(&self, input: CreateDataset) -> Result<Dataset> {
        let now = Utc::now();
        let dataset = Dataset {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            prompt_id: input.prompt_id,
            schema: input.schema,
            example_count: 0,
            version: 1,
            tags: input.tags,
            metadata: input.metadata,
            created_by: input.created_by,
            created_at: now,
            last_updated: now,
        };

        self.store.create_dataset(&dataset).await?;
        Ok(dataset)
    }

    /// Retrieves a dataset by id. Absence is not an error.
    pub async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        self.store.get_dataset(id).await
    }

    /// Replaces a dataset's mutable metadata and bumps its version.
    pub async fn update_dataset(&self, input: UpdateDataset) -> Result<Dataset> {
        let mut dataset =
            self.store
                .get_dataset(&input.id)
                .await?
                .ok_or_else(|| Error::NotFound {
                    entity: "dataset",
                    id: input.id.clone(),
                })?;

        dataset.name = input.name;
        dataset.description = input.description;
        dataset.tags = input.tags;
        dataset.metadata = input.metadata;
        dataset.last_updated = Utc::now();
        dataset.version += 1;

        self.store.update_dataset(&dataset).await?;
        Ok(dataset)
    }

    /// Deletes a dataset and all owned examples.
    pub async fn delete_dataset(&self, id: &str) -> Result<()> {
        self.store.delete_dataset(id).await
    }

    /// Lists datasets with the total match count.
    pub async fn list_datasets(
        &self,
        query: &ListDatasetsQuery,
    ) -> Result<(Vec<Dataset>, usize)> {
        self.store.list_datasets(query).await
    }

    /// Adds a batch of examples, assigning ids and timestamps.
    pub async fn add_examples(
        &self,
        dataset_id: &str,
        drafts: Vec<ExampleDraft>,
    ) -> Result<Vec<Example>> {
        if self.store.get_dataset(dataset_id).await?.is_none() {
            return Err(Error::NotFound {
                entity: "dataset",
                id: dataset_id.to_string(),
            });
        }

        let now = Utc::now();
        let examples: Vec<Example> = drafts
            .into_iter()
            .map(|draft| Example {
                id: Uuid::new_v4().to_string(),
                dataset_id: dataset_id.to_string(),
                input: draft.input,
                expected_output: draft.expected_output,
                metadata: draft.metadata,
                source: draft.source,
                created_at: now,
            })
            .collect();

        self.store.add_examples(dataset_id, &examples).await?;
        Ok(examples)
    }

    /// Retrieves examples with the total match count.
    pub async fn get_examples(
        &self,
        query: &GetExamplesQuery,
    ) -> Result<(Vec<Example>, usize)> {
        self.store.get_examples(query).await
    }

    /// Removes examples by id, returning the number actually removed.
    pub async fn remove_examples(
        &self,
        dataset_id: &str,
        example_ids: &[String],
    ) -> Result<usize> {
        self.store.remove_examples(dataset_id, example_ids).await
    }

    /// Retrieves a single example by id. Absence is not an error.
    pub async fn get_example(&self, id: &str) -> Result<Option<Example>> {
        self.store.get_example(id).await
    }

    /// Generates examples with an LLM.
    ///
    /// Stub: returns zero examples by design until the generator lands.
    pub async fn generate_examples(&self, input: GenerateExamples) -> Result<Vec<Example>> {
        tracing::info!(
            dataset_id = %input.dataset_id,
            count = input.count,
            "example generation requested (not yet implemented)"
        );
        Ok(Vec::new())
    }
}
