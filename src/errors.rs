//! Error types for entity and scene loading.
//!
//! Every failure that can happen while turning descriptors into render-ready
//! entities is a [`LoadError`]. Once an entity exists it can no longer fail:
//! `tick`, `draw` and `dispose` are infallible.

use std::fmt;

use thiserror::Error;

/// Boxed cause carried by a [`FetchError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The two programmable stages of a shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A text or image resource could not be fetched or decoded.
#[derive(Debug, Error)]
#[error("cannot fetch `{path}`: {cause}")]
pub struct FetchError {
    pub path: String,
    #[source]
    pub cause: BoxError,
}

impl FetchError {
    pub fn new(path: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            path: path.into(),
            cause: cause.into(),
        }
    }
}

/// Everything that can abort the construction of an entity or a scene.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot compile {stage} shader: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("cannot link program: {log}")]
    ProgramLink { log: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unknown entity kind `{0}`")]
    UnknownKind(String),

    #[error("invalid entity descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("cannot parse entity descriptor `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = LoadError> = std::result::Result<T, E>;
