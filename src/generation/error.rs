use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use super::gateway::GatewayError;

/// Fatal outcomes of a generation request. Unparsable model output is not
/// one of them; it degrades to a draft recipe.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Configuration(String),
    #[error("AI API failed after retries")]
    UpstreamExhausted { attempts: u32 },
    #[error("Failed to save recipe: {0}")]
    Persistence(String),
}

impl From<GatewayError> for GenerateError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::MissingApiKey => GenerateError::Configuration(e.to_string()),
            GatewayError::Exhausted { attempts } => GenerateError::UpstreamExhausted { attempts },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
