use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failures raised while validating data, fitting or predicting.
#[derive(Debug)]
pub enum ModelError {
    /// Training or inference input is malformed (ragged, empty, non-finite...)
    InvalidInput(String),
    /// The inference matrix does not have the column count seen at fit time
    FeatureMismatch { expected: usize, got: usize },
    /// The wrapped library rejected the fit
    FitFailed(String),
    NotFitted,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ModelError::FeatureMismatch { expected, got } => write!(
                f,
                "Model was fitted on {} features but input rows have {}",
                expected, got
            ),
            ModelError::FitFailed(msg) => write!(f, "Model fitting failed: {}", msg),
            ModelError::NotFitted => write!(f, "Model has not been fitted"),
        }
    }
}

impl Error for ModelError {}

/// Failures turning a wire-level model spec into a `ModelConfig`.
#[derive(Debug)]
pub enum ConfigError {
    UnsupportedModelType(String),
    InvalidHyperparameters { model_type: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::UnsupportedModelType(kind) => {
                write!(f, "Model type not supported: {}", kind)
            }
            ConfigError::InvalidHyperparameters { model_type, reason } => write!(
                f,
                "Invalid hyperparameters for {} model: {}",
                model_type, reason
            ),
        }
    }
}

impl Error for ConfigError {}

/// Persistence failures, always tagged with the file involved.
#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
    Codec { path: PathBuf, source: serde_json::Error },
    Corrupt { path: PathBuf, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            StoreError::Codec { path, source } => {
                write!(f, "Failed to encode or decode {}: {}", path.display(), source)
            }
            StoreError::Corrupt { path, reason } => {
                write!(f, "Corrupt model file {}: {}", path.display(), reason)
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Codec { source, .. } => Some(source),
            StoreError::Corrupt { .. } => None,
        }
    }
}

/// Everything the registry can report back to a caller.
#[derive(Debug)]
pub enum RegistryError {
    DuplicateId(String),
    InvalidModelId { id: String, reason: &'static str },
    ModelNotFound(String),
    ModelNotLoaded(String),
    Config(ConfigError),
    Model(ModelError),
    Store(StoreError),
}

impl RegistryError {
    /// True when the failure was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RegistryError::Store(_))
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegistryError::DuplicateId(id) => write!(f, "Model ID already exists: {}", id),
            RegistryError::InvalidModelId { id, reason } => {
                write!(f, "Invalid model ID {:?}: {}", id, reason)
            }
            RegistryError::ModelNotFound(id) => write!(f, "Model not found: {}", id),
            RegistryError::ModelNotLoaded(id) => write!(f, "Model not loaded: {}", id),
            RegistryError::Config(e) => e.fmt(f),
            RegistryError::Model(e) => e.fmt(f),
            RegistryError::Store(e) => e.fmt(f),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryError::Config(e) => Some(e),
            RegistryError::Model(e) => Some(e),
            RegistryError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RegistryError {
    fn from(e: ConfigError) -> Self {
        RegistryError::Config(e)
    }
}

impl From<ModelError> for RegistryError {
    fn from(e: ModelError) -> Self {
        RegistryError::Model(e)
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        RegistryError::Store(e)
    }
}
