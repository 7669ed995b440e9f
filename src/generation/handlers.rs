use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::any,
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::{
    dto::{GenerateRecipeRequest, GenerateRecipeResponse},
    error::GenerateError,
    services::{generate_recipe, GenerationRequest},
};
use crate::state::AppState;

// inline data-URL images make these bodies large
const BODY_LIMIT: usize = 15 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/generate-recipe", any(generate))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

/// /generate-recipe { prompt, cuisine?, image_data? }
///
/// Every method is handled here; OPTIONS never arrives because the CORS
/// layer answers it. The body is read as JSON whatever the content type.
#[instrument(skip(state, headers, body))]
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerateRecipeResponse>, GenerateError> {
    let body = body.map_err(|e| {
        warn!(error = %e, "unreadable generate-recipe body");
        GenerateError::Validation(e.body_text())
    })?;
    let body: GenerateRecipeRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "rejected generate-recipe body");
        GenerateError::Validation(format!("Invalid JSON body: {e}"))
    })?;

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let req = GenerationRequest {
        prompt: body.prompt.unwrap_or_default(),
        cuisine: body.cuisine,
        image_data: body.image_data,
        authorization,
    };

    let out = generate_recipe(&state, req).await.map_err(|e| {
        error!(error = %e, "generate-recipe failed");
        e
    })?;

    Ok(Json(GenerateRecipeResponse {
        success: true,
        message: out.message().to_string(),
        recipe: out.recipe,
    }))
}
