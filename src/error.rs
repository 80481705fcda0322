// src/error.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

// ==================== LAYOUT ERRORS ====================

/// Failures of an in-memory lab operation. The lab is unchanged whenever
/// one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    Validation(String),
    Occupied { row: usize, col: usize },
    InsufficientStock { available: u32, requested: u32 },
    EntryInUse { placed: u32 },
    UnknownEntry(String),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LayoutError::Validation(msg) => write!(f, "{}", msg),
            LayoutError::Occupied { row, col } => {
                write!(f, "Cell ({}, {}) is already occupied", row, col)
            }
            LayoutError::InsufficientStock { available, requested } => write!(
                f,
                "Insufficient stock. Available: {}, Requested: {}",
                available, requested
            ),
            LayoutError::EntryInUse { placed } => write!(
                f,
                "Equipment is still placed on {} station(s); remove it from the grid first",
                placed
            ),
            LayoutError::UnknownEntry(what) => write!(f, "Equipment '{}' is not assigned to this lab", what),
        }
    }
}

impl std::error::Error for LayoutError {}

// ==================== API ERRORS ====================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InternalServerError(format!("Corrupt stored layout: {}", err))
    }
}

impl From<LayoutError> for ApiError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::Validation(_) => ApiError::ValidationError(err.to_string()),
            LayoutError::Occupied { .. } | LayoutError::EntryInUse { .. } => ApiError::Conflict(err.to_string()),
            LayoutError::InsufficientStock { .. } => ApiError::BadRequest(err.to_string()),
            LayoutError::UnknownEntry(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn lab_not_found(lab_number: &str) -> Self {
        ApiError::NotFound(format!("Lab '{}' not found", lab_number))
    }

    pub fn lab_not_open(lab_number: &str) -> Self {
        ApiError::NotFound(format!("Lab '{}' has no open session; open it first", lab_number))
    }

    pub fn lab_already_exists(lab_number: &str) -> Self {
        ApiError::Conflict(format!("Lab '{}' already exists", lab_number))
    }
}
