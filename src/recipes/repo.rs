use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::dto::RecipeFilter;
use super::repo_types::{Difficulty, NewRecipe, Recipe, RecipeChanges};

const RECIPE_COLUMNS: &str = "id, title, description, cuisine, prep_time, cook_time, servings, \
     difficulty, ingredients, instructions, image_url, user_id, created_at, updated_at";

/// Single-record access used by generation and the catalog handlers.
/// The database owns ids and timestamps.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn insert(&self, recipe: &NewRecipe) -> anyhow::Result<Recipe>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn update_owned(
        &self,
        id: Uuid,
        owner: &str,
        changes: &RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>>;
    async fn delete_owned(&self, id: Uuid, owner: &str) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgRecipeStore {
    db: PgPool,
}

impl PgRecipeStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn insert(&self, recipe: &NewRecipe) -> anyhow::Result<Recipe> {
        insert(&self.db, recipe).await
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        get_by_id(&self.db, id).await
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner: &str,
        changes: &RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>> {
        update_owned(&self.db, id, owner, changes).await
    }

    async fn delete_owned(&self, id: Uuid, owner: &str) -> anyhow::Result<bool> {
        delete_owned(&self.db, id, owner).await
    }
}

pub async fn insert(db: &PgPool, recipe: &NewRecipe) -> anyhow::Result<Recipe> {
    let sql = format!(
        r#"
        INSERT INTO recipes (title, description, cuisine, prep_time, cook_time, servings,
                             difficulty, ingredients, instructions, image_url, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {RECIPE_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, Recipe>(&sql)
        .bind(&recipe.title)
        .bind(recipe.description.as_deref())
        .bind(recipe.cuisine.as_deref())
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.servings)
        .bind(recipe.difficulty.map(Difficulty::as_str))
        .bind(recipe.ingredients.as_slice())
        .bind(recipe.instructions.as_slice())
        .bind(recipe.image_url.as_deref())
        .bind(recipe.user_id.as_deref())
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub async fn get_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Recipe>> {
    let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1");
    let row = sqlx::query_as::<_, Recipe>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get recipe by id")?;
    Ok(row)
}

/// Page of recipes visible to `viewer` (public ones plus the viewer's own).
pub async fn list_visible(
    db: &PgPool,
    viewer: Option<&str>,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Recipe>> {
    let mut qb = visible_query(&format!("SELECT {RECIPE_COLUMNS} FROM recipes"), viewer, filter);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    let rows = qb
        .build_query_as::<Recipe>()
        .fetch_all(db)
        .await
        .context("list visible recipes")?;
    Ok(rows)
}

pub async fn count_visible(
    db: &PgPool,
    viewer: Option<&str>,
    filter: &RecipeFilter,
) -> anyhow::Result<i64> {
    let mut qb = visible_query("SELECT COUNT(*) FROM recipes", viewer, filter);
    let (count,) = qb
        .build_query_as::<(i64,)>()
        .fetch_one(db)
        .await
        .context("count visible recipes")?;
    Ok(count)
}

/// Applies `changes` to a recipe owned by `owner`. `None` if nothing matched.
pub async fn update_owned(
    db: &PgPool,
    id: Uuid,
    owner: &str,
    changes: &RecipeChanges,
) -> anyhow::Result<Option<Recipe>> {
    let sql = format!(
        r#"
        UPDATE recipes SET
            title        = COALESCE($3, title),
            description  = COALESCE($4, description),
            cuisine      = COALESCE($5, cuisine),
            prep_time    = COALESCE($6, prep_time),
            cook_time    = COALESCE($7, cook_time),
            servings     = COALESCE($8, servings),
            difficulty   = COALESCE($9, difficulty),
            ingredients  = COALESCE($10, ingredients),
            instructions = COALESCE($11, instructions),
            image_url    = COALESCE($12, image_url),
            updated_at   = now()
        WHERE id = $1 AND user_id = $2
        RETURNING {RECIPE_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, Recipe>(&sql)
        .bind(id)
        .bind(owner)
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.cuisine.as_deref())
        .bind(changes.prep_time)
        .bind(changes.cook_time)
        .bind(changes.servings)
        .bind(changes.difficulty.map(Difficulty::as_str))
        .bind(changes.ingredients.as_deref())
        .bind(changes.instructions.as_deref())
        .bind(changes.image_url.as_deref())
        .fetch_optional(db)
        .await
        .context("update recipe")?;
    Ok(row)
}

pub async fn delete_owned(db: &PgPool, id: Uuid, owner: &str) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(owner)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(res.rows_affected() > 0)
}

fn visible_query(
    select: &str,
    viewer: Option<&str>,
    filter: &RecipeFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    match viewer {
        Some(user_id) => {
            qb.push(" WHERE (user_id IS NULL OR user_id = ");
            qb.push_bind(user_id.to_string());
            qb.push(")");
        }
        None => {
            qb.push(" WHERE user_id IS NULL");
        }
    }

    if let Some(q) = &filter.search {
        let term = format!("%{q}%");
        qb.push(" AND (title ILIKE ");
        qb.push_bind(term.clone());
        qb.push(" OR cuisine ILIKE ");
        qb.push_bind(term);
        qb.push(")");
    }
    if let Some(cuisine) = &filter.cuisine {
        qb.push(" AND cuisine = ");
        qb.push_bind(cuisine.clone());
    }
    if let Some(difficulty) = filter.difficulty {
        qb.push(" AND difficulty = ");
        qb.push_bind(difficulty.as_str());
    }
    if let Some(bucket) = filter.prep_time {
        push_range(&mut qb, "prep_time", bucket.range());
    }
    if let Some(bucket) = filter.servings {
        push_range(&mut qb, "servings", bucket.range());
    }
    qb
}

fn push_range(qb: &mut QueryBuilder<'static, Postgres>, column: &str, (min, max): (Option<i32>, Option<i32>)) {
    if let Some(min) = min {
        qb.push(format!(" AND {column} >= "));
        qb.push_bind(min);
    }
    if let Some(max) = max {
        qb.push(format!(" AND {column} <= "));
        qb.push_bind(max);
    }
}
