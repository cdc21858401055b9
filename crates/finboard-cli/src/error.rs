use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
///
/// Per-symbol fetch failures are not errors at this level: they are reported in
/// the output and turn the exit code into 3.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] finboard_core::ValidationError),

    #[error("http client setup failed: {0}")]
    Http(#[from] finboard_core::HttpError),

    #[error(transparent)]
    Warehouse(#[from] finboard_core::WarehouseError),

    #[error(transparent)]
    Cache(#[from] finboard_core::CacheError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Http(_) => 6,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) | Self::Cache(_) => 5,
            Self::Io(_) => 10,
        }
    }
}
