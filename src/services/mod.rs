//! Business-logic services over the corpus store.

mod dataset;

pub use dataset::{DatasetService, GenerateExamples};
