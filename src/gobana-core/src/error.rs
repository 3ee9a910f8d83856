use std::path::PathBuf;

/// Coarse failure classes, used by the binaries to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Config,
    Io,
    Template,
    Decode,
    Transport,
}

#[derive(Debug, thiserror::Error)]
pub enum GobanaError {
    #[error("can't use exclusive parameters query and queryfile at the same time")]
    ConflictingQuerySource,

    #[error("malformed template datum '{0}', expected key=value")]
    MalformedTemplateDatum(String),

    #[error("failed to read query file {path:?}: {source}")]
    QueryFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write result to {path:?}: {source}")]
    ResultWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("template error: {0}")]
    TemplateRender(String),

    #[error("invalid response body: {0}")]
    InvalidResponseBody(#[source] serde_json::Error),

    #[error("request failed: {0}")]
    Transport(String),
}

impl GobanaError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GobanaError::ConflictingQuerySource | GobanaError::MalformedTemplateDatum(_) => {
                ErrorClass::Config
            }
            GobanaError::QueryFileRead { .. }
            | GobanaError::ResultWrite { .. }
            | GobanaError::Output(_) => ErrorClass::Io,
            GobanaError::TemplateRender(_) => ErrorClass::Template,
            GobanaError::InvalidResponseBody(_) => ErrorClass::Decode,
            GobanaError::Transport(_) => ErrorClass::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, GobanaError>;
