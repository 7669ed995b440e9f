use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, ListQuery, RecipePage, UpdateRecipeRequest},
    repo,
    repo_types::Recipe,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
}

/// Owned recipes are only readable by their owner.
pub fn can_view(recipe: &Recipe, viewer: Option<&str>) -> bool {
    match recipe.user_id.as_deref() {
        None => true,
        Some(owner) => viewer == Some(owner),
    }
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<RecipePage>, (StatusCode, String)> {
    let (page, limit) = query.page_window();
    let offset = (page - 1) * limit;
    let filter = query
        .into_filter()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let viewer = viewer.as_deref();

    let recipes = repo::list_visible(&state.db, viewer, &filter, limit, offset)
        .await
        .map_err(internal)?;
    let total_count = repo::count_visible(&state.db, viewer, &filter)
        .await
        .map_err(internal)?;

    Ok(Json(RecipePage {
        recipes,
        total_count,
        has_more: total_count > page * limit,
    }))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Recipe>, (StatusCode, String)> {
    let recipe = state
        .recipes
        .get(id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".to_string()))?;

    if !can_view(&recipe, viewer.as_deref()) {
        warn!(%id, "recipe hidden from viewer");
        return Err((
            StatusCode::FORBIDDEN,
            "Not authorized to view this recipe".into(),
        ));
    }
    Ok(Json(recipe))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), (StatusCode, String)> {
    let new = body
        .into_new_recipe(&user_id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let recipe = state.recipes.insert(&new).await.map_err(internal)?;
    info!(recipe_id = %recipe.id, %user_id, "recipe created");
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRecipeRequest>,
) -> Result<Json<Recipe>, (StatusCode, String)> {
    let changes = body
        .into_changes()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let recipe = state
        .recipes
        .update_owned(id, &user_id, &changes)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".to_string()))?;
    info!(recipe_id = %recipe.id, %user_id, "recipe updated");
    Ok(Json(recipe))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state
        .recipes
        .delete_owned(id, &user_id)
        .await
        .map_err(internal)?
    {
        info!(%id, %user_id, "recipe deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Recipe not found".into()))
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "recipe query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
