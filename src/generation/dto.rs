use serde::{Deserialize, Serialize};

use crate::recipes::repo_types::Recipe;

/// Body of `POST /generate-recipe`.
#[derive(Debug, Deserialize)]
pub struct GenerateRecipeRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateRecipeResponse {
    pub success: bool,
    pub recipe: Recipe,
    pub message: String,
}
