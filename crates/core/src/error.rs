#[allow(clippy::single_component_path_imports)]
use serde_yaml;

#[derive(Debug, thiserror::Error)]
pub enum CorepError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown template: {0}")]
    TemplateNotFound(String),

    #[error("reasoning backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("reasoning backend timed out after {0} seconds")]
    BackendTimeout(u64),
    #[error("reasoning backend returned malformed output: {0}")]
    MalformedResponse(String),
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

pub type CorepResult<T> = std::result::Result<T, CorepError>;
