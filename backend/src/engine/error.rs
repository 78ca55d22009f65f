use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::responses::Outcome;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GridError>;

/// Every failure the grid engine reports back to a caller.
#[derive(Debug, Error)]
pub enum GridError {
    /// Unknown module, undeclared table or an invalid definitions file.
    #[error("{0}")]
    Configuration(String),
    /// First schema constraint a submitted record violates.
    #[error("{0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("export failed: {0}")]
    Export(String),
    #[error("invalid or missing anti-forgery token")]
    Authorization,
    /// The blocking worker pool could not run the request.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the two-stage CSV import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Could not read import file: {0}")]
    Unreadable(String),
    #[error("Empty CSV")]
    NoHeader,
    #[error("No matching columns found. Check CSV headers.")]
    NoMatchingColumns,
    #[error("File expired. Please upload again.")]
    Expired,
}

impl GridError {
    pub fn unknown_module(module: &str) -> Self {
        GridError::Configuration(format!("Invalid module '{}'", module))
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Unreadable(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Unreadable(err.to_string())
    }
}

impl ResponseError for GridError {
    fn status_code(&self) -> StatusCode {
        match self {
            GridError::Configuration(_) => StatusCode::NOT_FOUND,
            GridError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GridError::Storage(_) | GridError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GridError::Import(_) => StatusCode::BAD_REQUEST,
            GridError::Authorization => StatusCode::FORBIDDEN,
            GridError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(Outcome::failed(self.to_string()))
    }
}
