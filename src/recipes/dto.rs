use serde::{Deserialize, Serialize};

use super::repo_types::{Difficulty, NewRecipe, Recipe, RecipeChanges};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepTimeBucket {
    Under15,
    From15To30,
    From30To60,
    Over60,
}

impl PrepTimeBucket {
    /// Accepts the API slugs and the catalog UI labels.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "under-15" | "under 15 min" => Some(Self::Under15),
            "15-30" | "15-30 min" => Some(Self::From15To30),
            "30-60" | "30-60 min" => Some(Self::From30To60),
            "over-60" | "over 1 hour" => Some(Self::Over60),
            _ => None,
        }
    }

    /// Inclusive minute bounds.
    pub fn range(self) -> (Option<i32>, Option<i32>) {
        match self {
            Self::Under15 => (None, Some(14)),
            Self::From15To30 => (Some(15), Some(30)),
            Self::From30To60 => (Some(30), Some(60)),
            Self::Over60 => (Some(61), None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingsBucket {
    OneToTwo,
    ThreeToFour,
    FiveToSix,
    SevenPlus,
}

impl ServingsBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1-2" | "1-2 people" => Some(Self::OneToTwo),
            "3-4" | "3-4 people" => Some(Self::ThreeToFour),
            "5-6" | "5-6 people" => Some(Self::FiveToSix),
            "7+" | "7+ people" => Some(Self::SevenPlus),
            _ => None,
        }
    }

    pub fn range(self) -> (Option<i32>, Option<i32>) {
        match self {
            Self::OneToTwo => (Some(1), Some(2)),
            Self::ThreeToFour => (Some(3), Some(4)),
            Self::FiveToSix => (Some(5), Some(6)),
            Self::SevenPlus => (Some(7), None),
        }
    }
}

/// Validated catalog filter. Empty query values are treated as "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub prep_time: Option<PrepTimeBucket>,
    pub servings: Option<ServingsBucket>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub cuisine: Option<String>,
    pub difficulty: Option<String>,
    pub prep_time: Option<String>,
    pub servings: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
const MAX_PAGE: i64 = i64::MAX / 100;

fn default_page() -> i64 { 1 }
fn default_limit() -> i64 { 12 }

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ListQuery {
    /// Page is 1-based and capped so `page * limit` stays in range;
    /// limit is clamped to 1..=100.
    pub fn page_window(&self) -> (i64, i64) {
        let page = self.page.clamp(1, MAX_PAGE);
        let limit = self.limit.clamp(1, 100);
        (page, limit)
    }

    pub fn into_filter(self) -> Result<RecipeFilter, String> {
        let difficulty = match non_blank(self.difficulty) {
            Some(d) => Some(Difficulty::parse_level(&d).ok_or_else(|| format!("unknown difficulty: {d}"))?),
            None => None,
        };
        let prep_time = match non_blank(self.prep_time) {
            Some(p) => Some(PrepTimeBucket::parse(&p).ok_or_else(|| format!("unknown prep_time range: {p}"))?),
            None => None,
        };
        let servings = match non_blank(self.servings) {
            Some(s) => Some(ServingsBucket::parse(&s).ok_or_else(|| format!("unknown servings range: {s}"))?),
            None => None,
        };
        Ok(RecipeFilter {
            search: non_blank(self.q),
            cuisine: non_blank(self.cuisine),
            difficulty,
            prep_time,
            servings,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RecipePage {
    pub recipes: Vec<Recipe>,
    pub total_count: i64,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
    pub image_url: Option<String>,
}

fn check_times(prep: Option<i32>, cook: Option<i32>, servings: Option<i32>) -> Result<(), String> {
    if prep.is_some_and(|v| v < 0) || cook.is_some_and(|v| v < 0) {
        return Err("times must be non-negative".into());
    }
    if servings.is_some_and(|v| v < 1) {
        return Err("servings must be positive".into());
    }
    Ok(())
}

fn check_difficulty(d: Option<String>) -> Result<Option<Difficulty>, String> {
    match d {
        Some(d) => Difficulty::parse_level(&d)
            .map(Some)
            .ok_or_else(|| format!("difficulty must be easy, medium or hard, got {d}")),
        None => Ok(None),
    }
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

impl CreateRecipeRequest {
    pub fn into_new_recipe(self, owner: &str) -> Result<NewRecipe, String> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("title is required".into());
        }
        check_times(self.prep_time, self.cook_time, self.servings)?;
        Ok(NewRecipe {
            title,
            description: non_blank(self.description),
            cuisine: non_blank(self.cuisine),
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            difficulty: check_difficulty(self.difficulty)?,
            ingredients: clean_lines(self.ingredients),
            instructions: clean_lines(self.instructions),
            image_url: non_blank(self.image_url),
            user_id: Some(owner.to_string()),
        })
    }
}

impl UpdateRecipeRequest {
    pub fn into_changes(self) -> Result<RecipeChanges, String> {
        let title = match self.title {
            Some(t) if t.trim().is_empty() => return Err("title cannot be empty".into()),
            Some(t) => Some(t.trim().to_string()),
            None => None,
        };
        check_times(self.prep_time, self.cook_time, self.servings)?;
        Ok(RecipeChanges {
            title,
            description: self.description,
            cuisine: self.cuisine,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            difficulty: check_difficulty(self.difficulty)?,
            ingredients: self.ingredients.map(clean_lines),
            instructions: self.instructions.map(clean_lines),
            image_url: self.image_url,
        })
    }
}
