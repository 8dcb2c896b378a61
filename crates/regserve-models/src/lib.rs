//! regserve-models: the model registry behind the regserve HTTP service.
//!
//! This crate provides validated model configuration, thin wrappers around
//! linfa's linear and logistic regression, dataset checks, a directory-backed
//! model store and the synchronised in-memory registry that ties them
//! together. It has no knowledge of HTTP; `regserve-cli` exposes it.
pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod registry;
pub mod store;

pub use config::{ModelConfig, ModelSpec, ModelType};
pub use error::{ConfigError, ModelError, RegistryError, StoreError};
pub use registry::{LoadOutcome, ModelRegistry};
pub use store::ModelStore;
