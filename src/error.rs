use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{message}")]
    Conflict {
        message: String,
        /// Settlement reference of the already-resolved payment, when the
        /// conflict is an idempotent verify replay.
        ref_id: Option<String>,
    },

    #[error("{}", stock_message(item.as_deref(), *available))]
    InsufficientStock { item: Option<String>, available: i64 },

    #[error("Payment gateway unavailable: {0}")]
    Gateway(String),

    #[error("Database error")]
    Db(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            ref_id: None,
        }
    }
}

fn stock_message(item: Option<&str>, available: i64) -> String {
    match item {
        Some(name) => format!("Only {available} items of {name} available in stock."),
        None => format!("Only {available} items available in stock."),
    }
}

#[derive(Serialize)]
struct ErrorData {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let message = self.to_string();
        let data = ErrorData {
            detail: message.clone(),
            available: match &self {
                AppError::InsufficientStock { available, .. } => Some(*available),
                _ => None,
            },
            ref_id: match self {
                AppError::Conflict { ref_id, .. } => ref_id,
                _ => None,
            },
        };

        let body = ApiResponse {
            message,
            data: Some(data),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
